//! Turn detection: automatic server VAD versus manual push-to-talk.

use crate::{
    Command,
    protocol::{ClientEvent, SessionConfig, TurnDetectionConfig},
    session::SessionStatus,
};

/// High threshold: favors precision over recall to avoid false interruptions.
pub const VAD_THRESHOLD: f64 = 0.9;
pub const VAD_PREFIX_PADDING_MS: u32 = 300;
pub const VAD_SILENCE_DURATION_MS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadParams {
    pub threshold: f64,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    pub auto_respond: bool,
}

impl Default for VadParams {
    fn default() -> Self {
        Self {
            threshold: VAD_THRESHOLD,
            prefix_padding_ms: VAD_PREFIX_PADDING_MS,
            silence_duration_ms: VAD_SILENCE_DURATION_MS,
            auto_respond: true,
        }
    }
}

/// The active turn-taking strategy. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnDetectionMode {
    ServerVad(VadParams),
    PushToTalk,
}

impl TurnDetectionMode {
    pub fn from_push_to_talk(enabled: bool) -> Self {
        if enabled {
            TurnDetectionMode::PushToTalk
        } else {
            TurnDetectionMode::ServerVad(VadParams::default())
        }
    }

    /// Push-to-talk maps to "no automatic turn detection".
    pub fn to_wire(&self) -> Option<TurnDetectionConfig> {
        match self {
            TurnDetectionMode::PushToTalk => None,
            TurnDetectionMode::ServerVad(p) => Some(TurnDetectionConfig::ServerVad {
                threshold: p.threshold,
                prefix_padding_ms: p.prefix_padding_ms,
                silence_duration_ms: p.silence_duration_ms,
                create_response: p.auto_respond,
            }),
        }
    }
}

/// Owns the turn detection mode and the push-to-talk speech turn.
#[derive(Debug)]
pub struct TurnDetectionController {
    mode: TurnDetectionMode,
    /// Set between talk-button-down and talk-button-up. Never set under VAD.
    pending_speech: bool,
}

impl TurnDetectionController {
    pub fn new(push_to_talk: bool) -> Self {
        Self {
            mode: TurnDetectionMode::from_push_to_talk(push_to_talk),
            pending_speech: false,
        }
    }

    pub fn mode(&self) -> TurnDetectionMode {
        self.mode
    }

    pub fn is_push_to_talk(&self) -> bool {
        self.mode == TurnDetectionMode::PushToTalk
    }

    pub fn pending_speech(&self) -> bool {
        self.pending_speech
    }

    /// A `session.update` carrying only the turn detection setting.
    pub fn session_update(&self) -> ClientEvent {
        ClientEvent::SessionUpdate {
            session: SessionConfig {
                turn_detection: self.mode.to_wire(),
                ..Default::default()
            },
        }
    }

    /// Switches modes. While connected the new mode is pushed to the
    /// transport right away; otherwise it applies on the next connect.
    pub fn set_push_to_talk(&mut self, enabled: bool, status: SessionStatus) -> Vec<Command> {
        self.mode = TurnDetectionMode::from_push_to_talk(enabled);
        let mut commands = Vec::new();
        if !enabled {
            commands.extend(self.clear_pending());
        }
        if status == SessionStatus::Connected {
            commands.push(Command::Send {
                event: self.session_update(),
                label: Some("turn detection"),
            });
        }
        commands
    }

    /// Talk button pressed: interrupt the agent, open a speech turn and drop
    /// audio buffered before the press.
    pub fn talk_down(&mut self, status: SessionStatus, agent_responding: bool) -> Vec<Command> {
        if status != SessionStatus::Connected || !self.is_push_to_talk() {
            return Vec::new();
        }
        self.pending_speech = true;
        vec![
            Command::Interrupt {
                cancel_response: agent_responding,
            },
            Command::PendingSpeech(true),
            Command::Send {
                event: ClientEvent::InputAudioBufferClear,
                label: Some("clear PTT buffer"),
            },
        ]
    }

    /// Talk button released: commit the turn and request a response.
    pub fn talk_up(&mut self, status: SessionStatus) -> Vec<Command> {
        if status != SessionStatus::Connected || !self.pending_speech {
            return Vec::new();
        }
        self.pending_speech = false;
        vec![
            Command::PendingSpeech(false),
            Command::Send {
                event: ClientEvent::InputAudioBufferCommit,
                label: Some("commit PTT"),
            },
            Command::Send {
                event: ClientEvent::ResponseCreate,
                label: Some("trigger response PTT"),
            },
        ]
    }

    /// Drops an open speech turn, e.g. on disconnect.
    pub fn clear_pending(&mut self) -> Option<Command> {
        if std::mem::take(&mut self.pending_speech) {
            Some(Command::PendingSpeech(false))
        } else {
            None
        }
    }
}
