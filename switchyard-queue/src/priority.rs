//! Priority queue with FIFO tie-break.
//!
//! Entries with a higher priority always dequeue first. Entries of equal
//! priority dequeue in the order they were enqueued, which keeps delivery
//! reproducible. The queue is unbounded and never applies backpressure.

use crate::QueueError;
use parking_lot::Mutex;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

struct Entry<T> {
    priority: i32,
    sequence: Reverse<u64>,
    item: T,
}

impl<T> Entry<T> {
    fn key(&self) -> (i32, Reverse<u64>) {
        (self.priority, self.sequence)
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

struct Inner<T> {
    heap: BinaryHeap<Entry<T>>,
    next_sequence: u64,
}

/// Thread-safe priority queue.
///
/// Every operation takes the same lock, so `enqueue`, `dequeue` and
/// `can_dequeue` are atomic with respect to each other. Share it between
/// threads behind an `Arc`.
pub struct PriorityQueue<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> PriorityQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_sequence: 0,
            }),
        }
    }

    /// Adds an item with the given priority. Never blocks on capacity.
    ///
    /// # Arguments
    /// * `item` - Item to enqueue
    /// * `priority` - Higher values dequeue first
    pub fn enqueue(&self, item: T, priority: i32) {
        let mut inner = self.inner.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.heap.push(Entry {
            priority,
            sequence: Reverse(sequence),
            item,
        });
    }

    /// Returns true if an item is available.
    #[inline]
    #[must_use]
    pub fn can_dequeue(&self) -> bool {
        !self.inner.lock().heap.is_empty()
    }

    /// Removes the highest-priority, earliest-enqueued item.
    ///
    /// # Errors
    /// Returns [`QueueError::Empty`] if the queue is empty. Callers are
    /// expected to check [`Self::can_dequeue`] first.
    pub fn dequeue(&self) -> Result<T, QueueError> {
        self.inner
            .lock()
            .heap
            .pop()
            .map(|entry| entry.item)
            .ok_or(QueueError::Empty)
    }

    /// Removes every queued item, in dequeue order.
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.inner.lock();
        let mut items = Vec::with_capacity(inner.heap.len());
        while let Some(entry) = inner.heap.pop() {
            items.push(entry.item);
        }
        items
    }

    /// Returns the number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Returns true if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
