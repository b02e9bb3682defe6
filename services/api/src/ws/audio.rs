//! Local audio output
//!
//! The single playback sink of a session. Assistant audio is relayed to the
//! browser, which plays it; this side tracks mute and pause so that chunks
//! arriving while either is set are never sent.

use super::protocol::ServerMessage;
use tokio::sync::mpsc;
use tutoria_core::{error::SessionError, playback::PlaybackAction};

pub trait AudioOutput: Send {
    fn set_muted(&mut self, muted: bool);
    fn pause(&mut self);
    /// Fails when the output can no longer play, e.g. the client is gone.
    fn resume(&mut self) -> Result<(), SessionError>;
    /// Drops audio queued for playback.
    fn flush(&mut self);
    fn write(&mut self, chunk: String);

    fn apply(&mut self, action: PlaybackAction) -> Result<(), SessionError> {
        match action {
            PlaybackAction::Mute => self.set_muted(true),
            PlaybackAction::Unmute => self.set_muted(false),
            PlaybackAction::Pause => self.pause(),
            PlaybackAction::Resume => return self.resume(),
        }
        Ok(())
    }
}

pub struct UiAudioOutput {
    tx: mpsc::UnboundedSender<ServerMessage>,
    muted: bool,
    paused: bool,
}

impl UiAudioOutput {
    pub fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            tx,
            muted: false,
            paused: false,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn notify(&self, action: PlaybackAction) {
        let _ = self.tx.send(ServerMessage::Playback { action });
    }
}

impl AudioOutput for UiAudioOutput {
    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.notify(if muted {
            PlaybackAction::Mute
        } else {
            PlaybackAction::Unmute
        });
    }

    fn pause(&mut self) {
        self.paused = true;
        self.notify(PlaybackAction::Pause);
    }

    fn resume(&mut self) -> Result<(), SessionError> {
        if self.tx.is_closed() {
            return Err(SessionError::PlaybackPolicyError(
                "audio output is not attached to a client".to_string(),
            ));
        }
        self.paused = false;
        self.notify(PlaybackAction::Resume);
        Ok(())
    }

    fn flush(&mut self) {
        let _ = self.tx.send(ServerMessage::AudioFlush);
    }

    fn write(&mut self, chunk: String) {
        if self.muted || self.paused {
            return;
        }
        let _ = self.tx.send(ServerMessage::AudioChunk { data: chunk });
    }
}
