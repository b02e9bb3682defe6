//! Defines the WebSocket message protocol between the browser client and the API server.

use crate::models::{AgentSummary, PreferencesResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tutoria_core::{
    board::BoardContent,
    playback::PlaybackAction,
    preferences::PreferenceUpdate,
    protocol::Role,
    router::TranscriptUpdate,
    session::{Codec, SessionStatus},
};
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The connect/disconnect button.
    ToggleConnection,
    /// Switches the conversation to another agent of the roster.
    SelectAgent { agent: String },
    SetPreference { preference: PreferenceUpdate },
    /// Push-to-talk button pressed.
    TalkDown,
    /// Push-to-talk button released.
    TalkUp,
    /// A typed user message.
    SendText { text: String },
    /// The browser refused to start audio output.
    PlaybackBlocked { reason: Option<String> },
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message of every connection.
    Initialized {
        connection_id: Uuid,
        scenario: String,
        codec: Codec,
        /// Capture and playback rate for raw audio frames.
        sample_rate: u32,
        agents: Vec<AgentSummary>,
        selected_agent: Option<String>,
        preferences: PreferencesResponse,
    },
    Status { status: SessionStatus },
    /// The agent now speaking.
    Agent { name: String },
    Board { content: BoardContent },
    /// Whether a push-to-talk turn is being recorded.
    PendingSpeech { active: bool },
    TranscriptMessage {
        id: String,
        role: Role,
        text: String,
        is_final: bool,
    },
    TranscriptDelta {
        item_id: String,
        role: Role,
        delta: String,
    },
    TranscriptDone {
        item_id: String,
        role: Role,
        text: String,
    },
    Breadcrumb { title: String, data: Value },
    /// A protocol event for the event log pane.
    Log {
        direction: LogDirection,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        event: Value,
    },
    /// A chunk of assistant audio (base64, in the session codec).
    AudioChunk { data: String },
    /// Drop any audio queued for playback.
    AudioFlush,
    Playback { action: PlaybackAction },
    Preferences { preferences: PreferencesResponse },
    Error { message: String },
}

impl From<TranscriptUpdate> for ServerMessage {
    fn from(update: TranscriptUpdate) -> Self {
        match update {
            TranscriptUpdate::Message {
                id,
                role,
                text,
                is_final,
            } => ServerMessage::TranscriptMessage {
                id,
                role,
                text,
                is_final,
            },
            TranscriptUpdate::Delta { item_id, role, delta } => {
                ServerMessage::TranscriptDelta { item_id, role, delta }
            }
            TranscriptUpdate::Done { item_id, role, text } => ServerMessage::TranscriptDone { item_id, role, text },
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogDirection {
    Client,
    Server,
}
