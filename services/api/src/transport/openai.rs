//! Handles the realtime WebSocket connection to OpenAI.

use super::{TransportConnector, TransportHandle, is_audio_delta};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{Instrument, debug, error, info, warn};
use tutoria_core::{protocol::ClientEvent, session::Codec};

pub struct OpenAiConnector {
    realtime_url: String,
}

impl OpenAiConnector {
    pub fn new(realtime_url: impl Into<String>) -> Self {
        Self {
            realtime_url: realtime_url.into(),
        }
    }

    pub fn session_url(&self, model: &str) -> String {
        format!("{}?model={}", self.realtime_url, model)
    }
}

#[async_trait]
impl TransportConnector for OpenAiConnector {
    async fn connect(&self, secret: SecretString, model: &str, codec: Codec) -> Result<TransportHandle> {
        let mut request = self.session_url(model).into_client_request()?;
        request.headers_mut().insert(
            "Authorization",
            format!("Bearer {}", secret.expose_secret()).parse()?,
        );
        request
            .headers_mut()
            .insert("OpenAI-Beta", "realtime=v1".parse()?);

        let (ws_stream, _) = connect_async(request)
            .await
            .context("Failed to connect to OpenAI Realtime WebSocket")?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        info!(model, codec = codec.as_str(), "Connected to OpenAI Realtime API.");

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientEvent>();
        let (inbound_tx, inbound_rx) = mpsc::channel::<Value>(256);
        let output_muted = Arc::new(AtomicBool::new(false));

        // Writer: ends with a close frame once the handle drops its queue.
        tokio::spawn(
            async move {
                while let Some(event) = outbound_rx.recv().await {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!(kind = event.kind(), "Failed to serialize client event: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_tx.send(WsMessage::Text(text.into())).await {
                        warn!("Realtime socket rejected outbound event: {}", e);
                        break;
                    }
                }
                let _ = ws_tx.send(WsMessage::Close(None)).await;
                debug!("Realtime writer finished.");
            }
            .in_current_span(),
        );

        let muted = output_muted.clone();
        let reader = tokio::spawn(
            async move {
                while let Some(frame) = ws_rx.next().await {
                    let text = match frame {
                        Ok(WsMessage::Text(text)) => text,
                        Ok(WsMessage::Close(reason)) => {
                            info!(?reason, "Realtime socket closed by server.");
                            break;
                        }
                        Ok(_) => continue,
                        Err(e) => {
                            warn!("Realtime socket error: {}", e);
                            break;
                        }
                    };
                    let event: Value = match serde_json::from_str(text.as_str()) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!("Dropping non-JSON realtime frame: {}", e);
                            continue;
                        }
                    };
                    if muted.load(Ordering::Relaxed) && is_audio_delta(&event) {
                        continue;
                    }
                    if inbound_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
            .in_current_span(),
        );

        Ok(TransportHandle::new(outbound_tx, inbound_rx, output_muted).with_reader(reader))
    }
}
