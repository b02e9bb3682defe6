//! Session state: connection status, codec and the live session record.

use crate::{
    protocol::AudioFormat,
    scenario::{AgentRoster, OutputGuardrail},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Tags one connect negotiation so that late results of an abandoned
/// attempt can be recognized and dropped.
pub type AttemptId = u64;

/// Connection status of the conversation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Disconnected => write!(f, "DISCONNECTED"),
            SessionStatus::Connecting => write!(f, "CONNECTING"),
            SessionStatus::Connected => write!(f, "CONNECTED"),
        }
    }
}

/// Audio codec requested by the presentation layer at load time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Wide-band audio (48 kHz).
    #[default]
    Opus,
    /// Narrow-band G.711 mu-law (8 kHz).
    Pcmu,
    /// Narrow-band G.711 A-law (8 kHz).
    Pcma,
}

impl Codec {
    /// Parses the `codec` query parameter, falling back to Opus for
    /// anything unrecognized.
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("pcmu") => Codec::Pcmu,
            Some("pcma") => Codec::Pcma,
            _ => Codec::Opus,
        }
    }

    /// The realtime audio format this codec maps to on a WebSocket transport.
    pub fn audio_format(&self) -> AudioFormat {
        match self {
            Codec::Opus => AudioFormat::Pcm16,
            Codec::Pcmu => AudioFormat::G711Ulaw,
            Codec::Pcma => AudioFormat::G711Alaw,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Opus => "opus",
            Codec::Pcmu => "pcmu",
            Codec::Pcma => "pcma",
        }
    }
}

/// One logical conversation, alive between a successful connect and the
/// next disconnect. `model` and `codec` never change for its lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    pub attempt: AttemptId,
    pub model: String,
    pub codec: Codec,
    /// Roster reordered so that the agent selected at connect time is root.
    pub roster: AgentRoster,
    pub active_agent: String,
    pub guardrails: Vec<OutputGuardrail>,
    pub extra_context: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_from_query() {
        assert_eq!(Codec::from_query(Some("pcmu")), Codec::Pcmu);
        assert_eq!(Codec::from_query(Some("PCMA")), Codec::Pcma);
        assert_eq!(Codec::from_query(Some("opus")), Codec::Opus);
        assert_eq!(Codec::from_query(Some("g722")), Codec::Opus);
        assert_eq!(Codec::from_query(None), Codec::Opus);
    }

    #[test]
    fn test_codec_audio_format() {
        assert_eq!(Codec::Opus.audio_format(), AudioFormat::Pcm16);
        assert_eq!(Codec::Pcmu.audio_format(), AudioFormat::G711Ulaw);
        assert_eq!(Codec::Pcma.audio_format(), AudioFormat::G711Alaw);
    }

    #[test]
    fn test_session_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Connecting).unwrap(),
            "\"CONNECTING\""
        );
        assert_eq!(SessionStatus::default(), SessionStatus::Disconnected);
        assert_eq!(SessionStatus::Connected.to_string(), "CONNECTED");
    }
}
