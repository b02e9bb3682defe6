//! Manages the WebSocket connection lifecycle for one presentation client.

use super::{
    audio::UiAudioOutput,
    driver::{DriverInput, SessionDriver},
    protocol::{ClientMessage, ServerMessage},
};
use crate::{
    audio_utils,
    models::{AgentSummary, PreferencesResponse},
    state::AppState,
};
use anyhow::Result;
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, instrument, warn};
use tutoria_core::{orchestrator::Orchestrator, session::Codec};
use uuid::Uuid;

/// Query parameters of the WebSocket endpoint.
#[derive(Deserialize, Debug, Default)]
pub struct WsParams {
    /// Scenario key; unknown or missing keys use the default scenario.
    #[serde(rename = "agentConfig")]
    pub agent_config: Option<String>,
    pub codec: Option<String>,
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

/// Main handler for an individual WebSocket connection.
///
/// Sends `initialized`, then feeds client frames to a [`SessionDriver`] until
/// the client goes away. Server messages are written by a separate task.
#[instrument(name = "ws_session", skip_all, fields(connection_id, scenario, codec))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, params: WsParams) {
    let connection_id = Uuid::new_v4();
    let codec = Codec::from_query(params.codec.as_deref());
    let span = tracing::Span::current();
    span.record("connection_id", tracing::field::display(connection_id));
    span.record("codec", codec.as_str());

    let (mut socket_tx, mut socket_rx) = socket.split();

    let Some(scenario) = state.catalog.resolve(params.agent_config.as_deref()).cloned() else {
        error!("Scenario catalog is empty");
        let _ = send_msg(
            &mut socket_tx,
            ServerMessage::Error {
                message: "No scenario is available".to_string(),
            },
        )
        .await;
        return;
    };
    span.record("scenario", scenario.key.as_str());
    info!("New WebSocket connection.");

    let preferences = state.preferences.load().await;
    let orchestrator = Orchestrator::new(scenario, codec, preferences);

    let initialized = ServerMessage::Initialized {
        connection_id,
        scenario: orchestrator.scenario().key.clone(),
        codec,
        sample_rate: audio_utils::sample_rate(codec),
        agents: orchestrator.scenario().roster.iter().map(AgentSummary::from).collect(),
        selected_agent: orchestrator.selected_agent().map(str::to_string),
        preferences: PreferencesResponse::from(orchestrator.preferences()),
    };
    if send_msg(&mut socket_tx, initialized).await.is_err() {
        error!("Failed to send Initialized message to client.");
        return;
    }

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(
        async move {
            while let Some(msg) = ui_rx.recv().await {
                if let Err(e) = send_msg(&mut socket_tx, msg).await {
                    warn!("Failed to write to client WebSocket: {:#}", e);
                    break;
                }
            }
            let _ = socket_tx.close().await;
        }
        .in_current_span(),
    );

    let (inputs_tx, inputs_rx) = mpsc::channel(64);
    let driver = SessionDriver::new(
        orchestrator,
        UiAudioOutput::new(ui_tx.clone()),
        ui_tx.clone(),
        state.session_services(),
    );
    let driver = tokio::spawn(driver.run(inputs_rx).in_current_span());

    while let Some(frame) = socket_rx.next().await {
        let input = match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => DriverInput::Client(msg),
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed client message");
                    let _ = ui_tx.send(ServerMessage::Error {
                        message: format!("Malformed message: {}", e),
                    });
                    continue;
                }
            },
            Ok(Message::Binary(data)) => DriverInput::Audio(data),
            Ok(Message::Close(_)) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        };
        if inputs_tx.send(input).await.is_err() {
            warn!("Session driver is gone; closing connection.");
            break;
        }
    }

    drop(inputs_tx);
    if let Err(e) = driver.await {
        error!(error = ?e, "Session driver task failed.");
    }
    drop(ui_tx);
    let _ = writer.await;
    info!("WebSocket connection closed.");
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(socket_tx: &mut SplitSink<WebSocket, Message>, msg: ServerMessage) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
