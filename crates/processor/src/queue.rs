//! Bounded multi-producer single-consumer request queue.
//!
//! Client I/O threads push; the processor thread pops. When the queue is
//! full, producers block on a condvar up to a timeout and then fail with
//! `QueueFull` — backpressure propagates to clients instead of buffering
//! unboundedly.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use rookery_types::RequestForSession;

use crate::error::ProcessorError;

/// Bounded FIFO queue of per-session requests.
pub struct RequestsQueue {
    items: Mutex<VecDeque<RequestForSession>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl RequestsQueue {
    /// Creates a queue holding at most `capacity` requests.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a request, waiting up to `timeout` for space.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::QueueFull`] if no slot frees up in time.
    pub fn push_timeout(
        &self,
        request: RequestForSession,
        timeout: Duration,
    ) -> Result<(), ProcessorError> {
        let mut items = self.items.lock();
        while items.len() >= self.capacity {
            if self.not_full.wait_for(&mut items, timeout).timed_out()
                && items.len() >= self.capacity
            {
                return Err(ProcessorError::QueueFull { capacity: self.capacity });
            }
        }
        items.push_back(request);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the head without waiting.
    pub fn try_pop(&self) -> Option<RequestForSession> {
        let request = self.items.lock().pop_front();
        if request.is_some() {
            self.not_full.notify_one();
        }
        request
    }

    /// Removes the head, waiting up to `timeout` for one to appear.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<RequestForSession> {
        let mut items = self.items.lock();
        if items.is_empty() {
            self.not_empty.wait_for(&mut items, timeout);
        }
        let request = items.pop_front();
        drop(items);
        if request.is_some() {
            self.not_full.notify_one();
        }
        request
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
