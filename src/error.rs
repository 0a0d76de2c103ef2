//! Error types for the John assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed settings
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected user input (empty or whitespace-only)
    #[error("validation error: {0}")]
    Validation(String),

    /// Chat completion failure (auth, rate limit, network, bad response)
    #[error("chat error: {0}")]
    Chat(String),

    /// Operation not permitted in the session's current state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Speech synthesis or playback failure
    #[error("speech error: {0}")]
    Speech(String),

    /// Speech-to-text failure
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
