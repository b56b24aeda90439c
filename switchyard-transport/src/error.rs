//! Error types for transport operations.

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the stream on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// Stream ended inside the length prefix.
    #[error("incomplete frame header: {received} of 4 bytes")]
    IncompleteHeader {
        /// Prefix bytes read before end of stream.
        received: usize,
    },

    /// Stream ended inside the payload.
    #[error("incomplete frame: expected {expected} bytes, received {received}")]
    IncompleteFrame {
        /// Length announced by the prefix.
        expected: usize,
        /// Payload bytes read before end of stream.
        received: usize,
    },

    /// Frame too large.
    #[error("frame too large: {size} bytes exceeds maximum {max} bytes")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Payload did not decode to a message.
    #[error("codec error: {0}")]
    Codec(#[from] switchyard_core::Error),
}

impl TransportError {
    /// Creates a frame too large error.
    pub fn frame_too_large(size: usize, max: usize) -> Self {
        Self::FrameTooLarge { size, max }
    }

    /// Returns true if the stream is still frame-aligned after this error.
    ///
    /// Only codec errors qualify: the whole frame was consumed, just its
    /// payload was unusable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Codec(_))
    }

    /// Returns true if the peer closed the stream cleanly, between frames.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
