//! Bounded multi-producer submission queue
//!
//! Producers never block. A push that would exceed the capacity is rejected
//! whole with a backpressure error. The single consumer drains everything
//! pending in one call, blocking only while the queue is empty.
//!
//! Closing the queue and enqueueing its final item happen under one lock, so
//! no producer can slip a batch in behind that item.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use super::errors::{WalError, WalResult};

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct SubmissionQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    capacity: usize,
}

impl<T> SubmissionQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        // A producer cannot leave the deque half-updated, so a poisoned lock
        // still guards consistent data.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue a batch atomically: either all items are accepted in order or
    /// none are. A closed queue refuses everything.
    pub fn push_batch(&self, batch: Vec<T>) -> WalResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut state = self.lock();
        if state.closed {
            return Err(WalError::not_running());
        }
        if state.items.len() + batch.len() > self.capacity {
            return Err(WalError::backpressure(state.items.len(), self.capacity));
        }
        state.items.extend(batch);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Close the queue and enqueue `last` behind everything already
    /// accepted, ignoring the capacity. Used for the shutdown sentinel.
    pub fn close_with(&self, last: T) {
        let mut state = self.lock();
        state.closed = true;
        state.items.push_back(last);
        drop(state);
        self.available.notify_one();
    }

    /// Close the queue and hand back whatever was still pending.
    pub fn close(&self) -> Vec<T> {
        let mut state = self.lock();
        state.closed = true;
        state.items.drain(..).collect()
    }

    /// Accept batches again after a close.
    pub fn reopen(&self) {
        self.lock().closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Remove and return everything pending, waiting until at least one item
    /// is available.
    pub fn dequeue_bulk(&self) -> Vec<T> {
        let mut state = self.lock();
        while state.items.is_empty() {
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        state.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
