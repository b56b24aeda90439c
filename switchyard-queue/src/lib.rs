//! # Switchyard Queue
//!
//! Priority-ordered buffer between network ingestion and dispatch.
//!
//! This crate provides:
//! - [`PriorityQueue`] - unbounded, lock-protected, FIFO within a priority

pub mod priority;

pub use priority::PriorityQueue;

/// Error type for queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Dequeue was attempted on an empty queue.
    Empty,
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "queue empty"),
        }
    }
}

impl std::error::Error for QueueError {}
