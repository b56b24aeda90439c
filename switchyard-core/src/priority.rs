//! Mapping from event types to queue priorities.

use crate::message::EventType;
use std::collections::HashMap;

/// Assigns a queue priority to each event type.
///
/// Higher values are dequeued first. Event types without an explicit
/// entry get the default priority.
#[derive(Debug, Clone, Default)]
pub struct PriorityMap {
    priorities: HashMap<EventType, i32>,
    default_priority: i32,
}

impl PriorityMap {
    /// Priority reserved for the termination signal.
    pub const TERMINATION: i32 = i32::MAX;

    /// Creates an empty map where every event gets priority 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the priority of one event type.
    ///
    /// Values at [`Self::TERMINATION`] are clamped one below it.
    #[must_use]
    pub fn with(mut self, event: impl Into<EventType>, priority: i32) -> Self {
        self.priorities.insert(event.into(), clamp(priority));
        self
    }

    /// Sets the priority used for unmapped event types.
    #[must_use]
    pub fn with_default(mut self, priority: i32) -> Self {
        self.default_priority = clamp(priority);
        self
    }

    /// Returns the priority for an event type.
    #[must_use]
    pub fn priority_of(&self, event: &EventType) -> i32 {
        self.priorities
            .get(event)
            .copied()
            .unwrap_or(self.default_priority)
    }

    /// Returns the default priority.
    #[must_use]
    pub fn default_priority(&self) -> i32 {
        self.default_priority
    }
}

fn clamp(priority: i32) -> i32 {
    priority.min(PriorityMap::TERMINATION - 1)
}
