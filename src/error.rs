/// Result alias that carries the crate's [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the control side of the engine.
///
/// Out-of-range numbers are never reported here: parameters are clamped to
/// their documented ranges instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An operation that needs the rendering context ran before `init`.
    #[error("audio context has not been initialized")]
    NotInitialized,
    #[error("audio context is already initialized")]
    AlreadyInitialized,
    /// The platform offers no audio output at all.
    #[error("no audio output device available")]
    NoOutputDevice,
    #[error("unsupported output sample format: {0}")]
    UnsupportedSampleFormat(String),
    #[error("audio backend error: {0}")]
    Backend(String),
    /// The control-to-render ring buffer had no free slot.
    #[error("render command queue is full")]
    QueueFull,
    /// The session limit was reached and the final fade is still running.
    #[error("session limit reached, shutting down")]
    ShuttingDown,
    #[error("invalid peal: {0}")]
    InvalidPeal(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Wav(#[from] hound::Error),
    #[cfg(feature = "serde")]
    #[error(transparent)]
    Config(#[from] toml::de::Error),
    #[cfg(feature = "serde")]
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<cpal::DefaultStreamConfigError> for EngineError {
    fn from(value: cpal::DefaultStreamConfigError) -> Self {
        Self::Backend(value.to_string())
    }
}

impl From<cpal::BuildStreamError> for EngineError {
    fn from(value: cpal::BuildStreamError) -> Self {
        Self::Backend(value.to_string())
    }
}

impl From<cpal::PlayStreamError> for EngineError {
    fn from(value: cpal::PlayStreamError) -> Self {
        Self::Backend(value.to_string())
    }
}
