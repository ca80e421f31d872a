//! Lock-free bounded queue between publishing tasks and the delivery worker.
//!
//! Wraps `crossbeam-queue::ArrayQueue`. A full queue hands the item back to
//! the producer instead of blocking, which is how buffer-full reaches the
//! sink's retry loop.
//!
//! # Sizing
//!
//! The queue absorbs bursts while the transport is slow. Fast-mode replay
//! of a large event source produces messages far quicker than any
//! transport drains them, so the queue mostly decides how often the sink
//! backs off, not whether data is lost.

use crossbeam_queue::ArrayQueue;

/// Result of [`BoundedQueue::try_push`].
#[derive(Debug)]
pub enum PushResult<T> {
    Ok,
    /// The queue is full. The item is returned untouched.
    Full(T),
}

#[derive(Debug)]
pub struct BoundedQueue<T> {
    inner: ArrayQueue<T>,
}

impl<T> BoundedQueue<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            inner: ArrayQueue::new(capacity),
        }
    }

    pub fn try_push(&self, item: T) -> PushResult<T> {
        match self.inner.push(item) {
            Ok(()) => PushResult::Ok,
            Err(item) => PushResult::Full(item),
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.inner.pop()
    }

    /// Pops up to `max` items in FIFO order.
    pub fn pop_batch(&self, max: usize) -> Vec<T> {
        let mut batch = Vec::with_capacity(max.min(self.inner.len()));
        while batch.len() < max {
            match self.inner.pop() {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}
