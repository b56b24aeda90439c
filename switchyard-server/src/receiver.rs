//! Stream poller: reads frames from every client stream into the queue.

use crate::registry::{Routes, StreamEntry};
use crate::state::{Counters, LoopState, StateCell};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use switchyard_core::{Message, PriorityMap};
use switchyard_queue::PriorityQueue;
use switchyard_transport::TransportError;

/// Default sleep after a pass in which no stream had data.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Producer side of the priority queue.
pub(crate) struct StreamPoller {
    pub(crate) routes: Routes,
    pub(crate) queue: Arc<PriorityQueue<Message>>,
    pub(crate) priorities: PriorityMap,
    pub(crate) interval: Duration,
    pub(crate) stop: Arc<AtomicBool>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) counters: Arc<Counters>,
}

impl StreamPoller {
    /// Polls until the stop flag is raised.
    pub(crate) fn run(self) {
        tracing::info!(streams = self.routes.streams().len(), "stream poller started");

        while !self.stop.load(Ordering::Acquire) {
            if !self.poll_pass() {
                thread::sleep(self.interval);
            }
        }

        self.state.set(LoopState::Stopped);
        tracing::info!("stream poller stopped");
    }

    /// Reads at most one frame from each healthy stream.
    ///
    /// Returns true if any stream had bytes available.
    pub(crate) fn poll_pass(&self) -> bool {
        let mut any_available = false;
        for (client_id, entry) in self.routes.streams().snapshot() {
            if entry.is_faulted() {
                continue;
            }
            if self.poll_stream(&client_id, &entry) {
                any_available = true;
            }
        }
        any_available
    }

    fn poll_stream(&self, client_id: &str, entry: &StreamEntry) -> bool {
        let mut stream = entry.reader();

        match stream.poll_available() {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                drop(stream);
                self.fault(client_id, entry, &e);
                return false;
            }
        }

        let result = self.routes.framer().read_message(&mut **stream);
        drop(stream);

        match result {
            Ok(mut message) => {
                if message.event_type.is_client_registration() {
                    message.rewrite_payload(client_id);
                }
                let priority = self.priorities.priority_of(&message.event_type);
                tracing::debug!(
                    client = %client_id,
                    event = %message.event_type,
                    priority,
                    "message received"
                );
                self.queue.enqueue(message, priority);
                Counters::bump(&self.counters.received);
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(client = %client_id, error = %e, "dropping undecodable frame");
                Counters::bump(&self.counters.dropped_frames);
            }
            Err(e) => self.fault(client_id, entry, &e),
        }

        true
    }

    fn fault(&self, client_id: &str, entry: &StreamEntry, error: &TransportError) {
        if !entry.mark_faulted() {
            return;
        }
        if error.is_disconnect() {
            tracing::info!(client = %client_id, "client disconnected, no longer polled");
            Counters::bump(&self.counters.closed_streams);
        } else {
            tracing::error!(client = %client_id, error = %error, "stream faulted, no longer polled");
            Counters::bump(&self.counters.faulted_streams);
        }
    }
}
