//! Error types for the checkpoint codec and storage layer

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur while encoding, decoding, or persisting checkpoints
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// A value could not be faithfully encoded (e.g. an identity cycle was
    /// found while identity-deduplication was disabled)
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A previously encoded envelope could not be reconstructed
    #[error("decoding error: {0}")]
    Decoding(String),

    /// `decode` was called with `strict = true` and hit a type tag that is
    /// not registered
    #[error("unknown type tag during strict decode: {0}")]
    UnknownTypeTag(String),

    /// Checkpoint not found
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary serialization error (opaque `__pickle__` fallback)
    #[error("binary serialization error: {0}")]
    BinarySerialization(#[from] bincode::Error),

    /// Storage backend error
    #[error("storage error: {0}")]
    Storage(String),

    /// Checkpoint failed its structural validation (e.g. malformed envelope)
    #[error("invalid checkpoint: {0}")]
    Invalid(String),

    /// I/O error from a filesystem-backed storage implementation
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
