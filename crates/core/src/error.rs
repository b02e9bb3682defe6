/// Errors surfaced by the session core.
///
/// None of these tear down a live session on their own; the component that
/// produces one decides whether the status reverts to `DISCONNECTED`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("The credential endpoint returned no usable secret")]
    NoCredential,
    #[error("Transport error: {0}")]
    TransportError(String),
    #[error("Invalid tool argument: {0}")]
    InvalidToolArgument(String),
    #[error("Audio playback blocked: {0}")]
    PlaybackPolicyError(String),
}
