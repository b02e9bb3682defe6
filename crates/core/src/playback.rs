//! Audio playback gate: keeps the local output and the transport-level mute
//! in line with the user's playback preference.

use crate::{Command, session::SessionStatus};
use serde::Serialize;

/// Actions on the single local audio output.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackAction {
    Mute,
    Unmute,
    Pause,
    Resume,
}

#[derive(Debug)]
pub struct AudioPlaybackGate {
    enabled: bool,
}

impl AudioPlaybackGate {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Local silence comes first so it holds even if the transport mute fails.
    pub fn set_playback_enabled(&mut self, enabled: bool, status: SessionStatus) -> Vec<Command> {
        if self.enabled == enabled {
            return Vec::new();
        }
        self.enabled = enabled;
        let mut commands = self.apply();
        if status == SessionStatus::Connected {
            commands.push(self.sync_transport());
        }
        commands
    }

    /// Local output actions matching the current intent.
    pub fn apply(&self) -> Vec<Command> {
        if self.enabled {
            vec![
                Command::Playback(PlaybackAction::Unmute),
                Command::Playback(PlaybackAction::Resume),
            ]
        } else {
            vec![
                Command::Playback(PlaybackAction::Mute),
                Command::Playback(PlaybackAction::Pause),
            ]
        }
    }

    /// Re-issued on every transition to CONNECTED.
    pub fn sync_transport(&self) -> Command {
        Command::TransportMute(!self.enabled)
    }
}
