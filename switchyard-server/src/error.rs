//! Error types for server operations.

use thiserror::Error;

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] switchyard_transport::TransportError),

    /// A client identifier is already registered.
    #[error("client already registered: {client_id}")]
    DuplicateClient {
        /// Client identifier.
        client_id: String,
    },

    /// No stream is registered for a client identifier.
    #[error("unknown client: {client_id}")]
    UnknownClient {
        /// Client identifier.
        client_id: String,
    },

    /// No client is registered for a sender identifier.
    #[error("unknown sender: {sender_id}")]
    UnknownSender {
        /// Sender identifier.
        sender_id: String,
    },

    /// A worker loop panicked instead of exiting cleanly.
    #[error("{name} loop panicked")]
    LoopPanicked {
        /// Loop name.
        name: &'static str,
    },
}

/// Error returned by a handler capability.
///
/// Handler failures never leave the dispatch loop; they are logged and
/// counted.
#[derive(Debug, Clone, Error)]
#[error("handler error: {message}")]
pub struct HandlerError {
    /// Error message.
    pub message: String,
}

impl HandlerError {
    /// Creates a handler error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ServerError> for HandlerError {
    fn from(err: ServerError) -> Self {
        Self::new(err.to_string())
    }
}
