//! Serialization of messages to and from frame payloads.

use crate::error::{Error, Result};
use crate::message::Message;
use std::sync::Arc;

/// Converts messages to payload bytes and back.
///
/// The framing layer treats the payload as opaque; any codec that
/// round-trips a [`Message`] field-for-field can be plugged in.
pub trait MessageCodec: Send + Sync {
    /// Serializes a message into payload bytes.
    ///
    /// # Errors
    /// Returns error if the message cannot be serialized.
    fn encode(&self, message: &Message) -> Result<Vec<u8>>;

    /// Deserializes payload bytes into a message.
    ///
    /// # Errors
    /// Returns error if the payload is not a valid encoded message.
    fn decode(&self, payload: &[u8]) -> Result<Message>;
}

impl<C: MessageCodec + ?Sized> MessageCodec for Arc<C> {
    fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        (**self).encode(message)
    }

    fn decode(&self, payload: &[u8]) -> Result<Message> {
        (**self).decode(payload)
    }
}

/// JSON text codec.
///
/// Payloads are UTF-8 JSON objects:
/// `{"event_type":"Chat","data":"hello","sender_id":"alice"}`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        if message.is_termination() {
            return Err(Error::invalid_message(
                "termination signal cannot be serialized",
            ));
        }
        Ok(serde_json::to_vec(message)?)
    }

    fn decode(&self, payload: &[u8]) -> Result<Message> {
        let text = std::str::from_utf8(payload).map_err(|e| Error::InvalidUtf8 {
            offset: e.valid_up_to(),
        })?;
        let message: Message = serde_json::from_str(text)?;
        if message.event_type.as_str().is_empty() {
            return Err(Error::invalid_message("empty event type"));
        }
        Ok(message)
    }
}
