//! Error types for Switchyard core operations.

use thiserror::Error;

/// Core error type for Switchyard operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload bytes are not valid UTF-8.
    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset where invalid UTF-8 was found.
        offset: usize,
    },

    /// The serializer rejected the message or payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The decoded envelope is structurally invalid.
    #[error("invalid message: {message}")]
    InvalidMessage {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Creates an invalid message error.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }
}

/// Result type alias for Switchyard core operations.
pub type Result<T> = std::result::Result<T, Error>;
