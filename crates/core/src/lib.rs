//! Tutor-ia Session Core
//!
//! This crate holds the client-side orchestration of one voice conversation with
//! a realtime agent backend. Every component is a synchronous state machine:
//! it consumes an intent or an inbound event and returns the side effects the
//! host runtime must perform, as a list of [`Command`]s executed in order.

pub mod board;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod playback;
pub mod preferences;
pub mod protocol;
pub mod router;
pub mod scenario;
pub mod session;
pub mod supervisor;
pub mod turn;

use crate::{
    board::BoardContent,
    playback::PlaybackAction,
    preferences::Preferences,
    protocol::ClientEvent,
    router::TranscriptUpdate,
    session::{AttemptId, Codec, SessionStatus},
};
use secrecy::SecretString;
use serde_json::Value;

/// Represents commands that the core logic issues to an external runtime.
///
/// This enum is the primary API for decoupling the session's decision-making
/// from the runtime's execution of side effects (network I/O, local audio,
/// presentation updates and persistence).
#[derive(Debug)]
pub enum Command {
    /// The session status changed; presentation should reflect it.
    StatusChanged(SessionStatus),
    /// Ask the credential collaborator for a short-lived transport secret.
    FetchCredential { attempt: AttemptId, model: String },
    /// Negotiate a transport for the given attempt using the acquired secret.
    OpenTransport {
        attempt: AttemptId,
        secret: SecretString,
        model: String,
        codec: Codec,
    },
    /// The negotiated transport of this attempt becomes the live transport.
    AdoptTransport { attempt: AttemptId },
    /// The negotiated transport of this attempt is stale and must be closed.
    DiscardTransport { attempt: AttemptId },
    /// Tear down the live transport, if any.
    CloseTransport,
    /// Forward a protocol event to the live transport (best-effort).
    Send {
        event: ClientEvent,
        label: Option<&'static str>,
    },
    /// Ask the transport to stop (or resume) delivering assistant audio.
    TransportMute(bool),
    /// Mutate the local audio output.
    Playback(PlaybackAction),
    /// Interrupt the agent: flush queued local audio, optionally cancel the response.
    Interrupt { cancel_response: bool },
    /// A base64 chunk of assistant audio for the local output.
    AudioChunk(String),
    /// Feed the transcript collaborator.
    Transcript(TranscriptUpdate),
    /// A structured log entry marking a notable side effect.
    Breadcrumb { title: String, data: Value },
    /// Raw inbound event for the logging collaborator.
    LogServerEvent(Value),
    /// The visible board content changed.
    BoardChanged(BoardContent),
    /// The active agent identity changed.
    AgentChanged(String),
    /// The push-to-talk speech turn started or ended.
    PendingSpeech(bool),
    /// Persist the full preference snapshot.
    PersistPreferences(Preferences),
    /// Surface an error to the user.
    ReportError(String),
}
