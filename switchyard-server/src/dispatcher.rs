//! Dispatch loop and handler registry.

use crate::handler::{CapabilityRef, EventHandler, HandlerTable};
use crate::registry::Routes;
use crate::state::{Counters, LoopState, StateCell};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use switchyard_core::{EventType, Message};
use switchyard_queue::PriorityQueue;

/// Default sleep when the queue is empty.
pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_millis(500);

/// Outcome of offering one message to every handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers whose capability ran to completion.
    pub delivered: usize,
    /// Handlers without a capability for the event type.
    pub skipped: usize,
    /// Handlers whose capability returned an error or panicked.
    pub failed: usize,
}

/// Ordered set of handler tables.
///
/// Every message is offered to every handler, in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<(String, HandlerTable)>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, building its table once.
    pub fn register<H: EventHandler>(&mut self, name: impl Into<String>, handler: Arc<H>) {
        self.register_table(name, handler.handler_table());
    }

    /// Registers a prebuilt table.
    pub fn register_table(&mut self, name: impl Into<String>, table: HandlerTable) {
        let name = name.into();
        tracing::debug!(handler = %name, capabilities = table.len(), "handler registered");
        self.handlers.push((name, table));
    }

    /// Returns true if any handler has a capability for the event type.
    #[must_use]
    pub fn has_handler(&self, event: &EventType) -> bool {
        self.handlers.iter().any(|(_, table)| table.handles(event))
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Offers a message to every handler.
    ///
    /// Errors and panics raised by one handler are logged and do not
    /// affect delivery to the others.
    pub fn dispatch(&self, message: &Message, routes: &Routes) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (name, table) in &self.handlers {
            let Some(capability) = table.capability_for(&message.event_type) else {
                tracing::trace!(
                    handler = %name,
                    event = %message.event_type,
                    "no capability for event"
                );
                report.skipped += 1;
                continue;
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match capability {
                CapabilityRef::Event(f) => f(message),
                CapabilityRef::Registration(f) => f(message, routes),
            }));

            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(
                        handler = %name,
                        event = %message.event_type,
                        error = %e,
                        "handler failed"
                    );
                    report.failed += 1;
                }
                Err(payload) => {
                    tracing::error!(
                        handler = %name,
                        event = %message.event_type,
                        panic = panic_message(&*payload),
                        "handler panicked"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Consumer side of the priority queue.
pub(crate) struct DispatchLoop {
    pub(crate) queue: Arc<PriorityQueue<Message>>,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) routes: Routes,
    pub(crate) interval: Duration,
    pub(crate) state: Arc<StateCell>,
    pub(crate) counters: Arc<Counters>,
}

impl DispatchLoop {
    /// Drains the queue until the termination sentinel is dequeued.
    pub(crate) fn run(self) {
        tracing::info!(handlers = self.handlers.len(), "dispatch loop started");

        loop {
            if !self.queue.can_dequeue() {
                thread::sleep(self.interval);
                continue;
            }

            let Ok(message) = self.queue.dequeue() else {
                continue;
            };

            if message.is_termination() {
                break;
            }

            let report = self.handlers.dispatch(&message, &self.routes);
            Counters::bump(&self.counters.dispatched);
            Counters::add(&self.counters.handler_failures, report.failed as u64);
            tracing::debug!(
                event = %message.event_type,
                delivered = report.delivered,
                skipped = report.skipped,
                failed = report.failed,
                "message dispatched"
            );
        }

        self.state.set(LoopState::Stopped);
        tracing::info!("dispatch loop stopped");
    }
}
