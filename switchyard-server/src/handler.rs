//! Event handler capability tables.
//!
//! A handler exposes one capability per event type it cares about. The
//! table is built once, when the handler is registered; event types it has
//! no entry for are simply not delivered to it.

use crate::error::HandlerError;
use crate::registry::Routes;
use std::collections::HashMap;
use std::sync::Arc;
use switchyard_core::{EventType, Message};

/// Capability invoked with the message alone.
pub type Capability = Box<dyn Fn(&Message) -> Result<(), HandlerError> + Send + Sync>;

/// Capability for the client registration event, which also receives the
/// routing tables so it can record the new sender.
pub type RegistrationCapability =
    Box<dyn Fn(&Message, &Routes) -> Result<(), HandlerError> + Send + Sync>;

/// A resolved capability.
pub enum CapabilityRef<'a> {
    /// Ordinary event capability.
    Event(&'a Capability),
    /// Client registration capability.
    Registration(&'a RegistrationCapability),
}

/// Per-handler dispatch table keyed by event type.
#[derive(Default)]
pub struct HandlerTable {
    capabilities: HashMap<EventType, Capability>,
    registration: Option<RegistrationCapability>,
}

impl HandlerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capability for an event type, replacing any previous one.
    #[must_use]
    pub fn on<F>(mut self, event: impl Into<EventType>, capability: F) -> Self
    where
        F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.capabilities.insert(event.into(), Box::new(capability));
        self
    }

    /// Adds the client registration capability.
    #[must_use]
    pub fn on_client_registration<F>(mut self, capability: F) -> Self
    where
        F: Fn(&Message, &Routes) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.registration = Some(Box::new(capability));
        self
    }

    /// Resolves the capability for an event type.
    ///
    /// For the registration event a registration capability wins over a
    /// plain one added with [`Self::on`].
    #[must_use]
    pub fn capability_for(&self, event: &EventType) -> Option<CapabilityRef<'_>> {
        if event.is_client_registration()
            && let Some(registration) = &self.registration
        {
            return Some(CapabilityRef::Registration(registration));
        }
        self.capabilities.get(event).map(CapabilityRef::Event)
    }

    /// Returns true if the table has a capability for the event type.
    #[must_use]
    pub fn handles(&self, event: &EventType) -> bool {
        self.capability_for(event).is_some()
    }

    /// Returns the number of capabilities in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len() + usize::from(self.registration.is_some())
    }

    /// Returns true if the table has no capabilities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trait for application modules that consume events.
///
/// # Example
///
/// ```ignore
/// struct Chat;
///
/// impl EventHandler for Chat {
///     fn handler_table(self: Arc<Self>) -> HandlerTable {
///         HandlerTable::new().on("Chat", move |msg| self.on_chat(msg))
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync + 'static {
    /// Builds the handler's dispatch table. Called once at registration.
    fn handler_table(self: Arc<Self>) -> HandlerTable;
}
