//! Defines the wire events sent to the realtime agent backend.
//!
//! Inbound events are kept as raw JSON and normalized by
//! [`EventRouter`](crate::router::EventRouter); only the outbound side has a
//! closed schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events sent from this client to the realtime transport.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Mutates transport-level session parameters.
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    /// Appends an item (a message or a tool output) to the conversation.
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
    /// Asks the agent to generate a response.
    #[serde(rename = "response.create")]
    ResponseCreate,
    /// Cancels the in-progress response.
    #[serde(rename = "response.cancel")]
    ResponseCancel,
    /// Drops any buffered input audio.
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear,
    /// Commits the buffered input audio as a finished user turn.
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,
    /// Appends a base64 chunk of microphone audio.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
}

impl ClientEvent {
    /// The wire `type` of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ResponseCreate => "response.create",
            ClientEvent::ResponseCancel => "response.cancel",
            ClientEvent::InputAudioBufferClear => "input_audio_buffer.clear",
            ClientEvent::InputAudioBufferCommit => "input_audio_buffer.commit",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
        }
    }
}

/// The `session` payload of a `session.update` event.
///
/// `turn_detection` is always serialized: `null` disables automatic turn
/// detection, while an absent field would leave the server's setting unchanged.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct SessionConfig {
    pub turn_detection: Option<TurnDetectionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<AudioFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<AudioFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,
}

/// Wire form of automatic turn detection.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetectionConfig {
    ServerVad {
        threshold: f64,
        prefix_padding_ms: u32,
        silence_duration_ms: u32,
        create_response: bool,
    },
}

/// A function tool advertised to the agent.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: "function",
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Pcm16,
    G711Ulaw,
    G711Alaw,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InputAudioTranscription {
    pub model: String,
}

/// Items that can be appended to the conversation.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    Message {
        id: String,
        role: Role,
        content: Vec<ContentPart>,
    },
    FunctionCallOutput { call_id: String, output: String },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
}

/// Author of a conversation item.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}
