//! Message envelope types.
//!
//! Every frame on the wire decodes to exactly one [`Message`]. The envelope
//! carries:
//! - Event type: routing key into the handler registry and input to priority
//! - Data: the application payload
//! - Sender ID: application-level identity of the peer that produced it
//!
//! The termination flag is local to the process and never crosses the wire.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a connected client, the key of the stream registry.
pub type ClientId = String;

/// Wire value of the reserved client registration event.
const CLIENT_REGISTRATION: &str = "ClientRegister";

/// Routing key carried by every [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    /// Creates an event type from its wire name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The reserved event a peer sends to announce itself.
    #[must_use]
    pub fn client_registration() -> Self {
        Self(CLIENT_REGISTRATION.to_string())
    }

    /// Returns true for the reserved client registration event.
    #[must_use]
    pub fn is_client_registration(&self) -> bool {
        self.0 == CLIENT_REGISTRATION
    }

    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EventType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Typed envelope exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Event classification.
    pub event_type: EventType,
    /// Application payload.
    #[serde(default)]
    pub data: String,
    /// Application-level sender identifier, if the peer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(skip)]
    stop: bool,
}

impl Message {
    /// Creates a new message.
    ///
    /// # Arguments
    /// * `event_type` - Event classification
    /// * `data` - Application payload
    #[must_use]
    pub fn new(event_type: impl Into<EventType>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
            sender_id: None,
            stop: false,
        }
    }

    /// Sets the sender identifier.
    #[must_use]
    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    /// Creates the sentinel that unwinds the dispatch loop.
    ///
    /// A termination message is never handed to a handler.
    #[must_use]
    pub fn termination() -> Self {
        Self {
            event_type: EventType::new(""),
            data: String::new(),
            sender_id: None,
            stop: true,
        }
    }

    /// Returns true if this is the termination sentinel.
    #[must_use]
    pub fn is_termination(&self) -> bool {
        self.stop
    }

    /// Replaces the payload.
    ///
    /// The poller uses this to stamp registration messages with the
    /// identifier of the stream they arrived on.
    pub fn rewrite_payload(&mut self, data: impl Into<String>) {
        self.data = data.into();
    }
}
