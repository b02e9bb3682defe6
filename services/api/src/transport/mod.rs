//! Realtime transport
//!
//! A negotiated transport is a [`TransportHandle`]: an outbound event queue,
//! an inbound stream of raw JSON events and an output-mute switch. The
//! inbound channel ends when the remote side closes.

pub mod openai;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tutoria_core::{protocol::ClientEvent, session::Codec};

pub use openai::OpenAiConnector;

/// Negotiates a transport for one session.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, secret: SecretString, model: &str, codec: Codec) -> Result<TransportHandle>;
}

pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<ClientEvent>,
    inbound: mpsc::Receiver<Value>,
    output_muted: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl TransportHandle {
    pub fn new(
        outbound: mpsc::UnboundedSender<ClientEvent>,
        inbound: mpsc::Receiver<Value>,
        output_muted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            output_muted,
            reader: None,
        }
    }

    pub fn with_reader(mut self, reader: JoinHandle<()>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn send(&self, event: &ClientEvent) -> Result<()> {
        self.outbound
            .send(event.clone())
            .map_err(|_| anyhow!("transport writer is closed"))
    }

    /// While muted, assistant audio is dropped before it reaches the client.
    pub fn set_output_muted(&self, muted: bool) {
        self.output_muted.store(muted, Ordering::Relaxed);
    }

    pub fn output_muted(&self) -> bool {
        self.output_muted.load(Ordering::Relaxed)
    }

    pub async fn recv(&mut self) -> Option<Value> {
        self.inbound.recv().await
    }

    /// Dropping the outbound queue lets the writer send a close frame.
    pub fn close(self) {
        if let Some(reader) = self.reader {
            reader.abort();
        }
    }
}

/// Inbound event kinds carrying assistant audio.
pub fn is_audio_delta(event: &Value) -> bool {
    matches!(
        event.get("type").and_then(Value::as_str),
        Some("response.audio.delta") | Some("response.output_audio.delta")
    )
}
