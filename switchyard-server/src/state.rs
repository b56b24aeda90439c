//! Worker loop lifecycle state and counters.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Lifecycle of a worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Polling or dispatching.
    Running,
    /// Stop requested, loop has not exited yet.
    Stopping,
    /// Loop thread has exited.
    Stopped,
}

/// Atomically shared [`LoopState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: LoopState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> LoopState {
        match self.0.load(Ordering::Acquire) {
            0 => LoopState::Running,
            1 => LoopState::Stopping,
            _ => LoopState::Stopped,
        }
    }

    pub(crate) fn set(&self, state: LoopState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Live counters shared by both loops.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) received: AtomicU64,
    pub(crate) dropped_frames: AtomicU64,
    pub(crate) faulted_streams: AtomicU64,
    pub(crate) closed_streams: AtomicU64,
    pub(crate) dispatched: AtomicU64,
    pub(crate) handler_failures: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ReceiverStats {
        ReceiverStats {
            received: self.received.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            faulted_streams: self.faulted_streams.load(Ordering::Relaxed),
            closed_streams: self.closed_streams.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time receiver statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Messages decoded and enqueued by the poller.
    pub received: u64,
    /// Frames read but discarded because the payload did not decode.
    pub dropped_frames: u64,
    /// Streams dropped after a framing or I/O failure.
    pub faulted_streams: u64,
    /// Streams whose peer disconnected between frames.
    pub closed_streams: u64,
    /// Messages taken off the queue and offered to handlers.
    pub dispatched: u64,
    /// Handler invocations that returned an error or panicked.
    pub handler_failures: u64,
}
