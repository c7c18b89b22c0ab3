//! Unbounded thread-safe FIFO queue.
//!
//! Used for the responses queue (store → client I/O) and the committed queue
//! (state machine → processor). Multi-producer, any-consumer; `pop_timeout`
//! parks on a condvar so consumers do not spin.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rookery_types::ResponseForSession;

/// Unbounded mutex+condvar FIFO queue.
#[derive(Debug, Default)]
pub struct ThreadSafeQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

impl<T> ThreadSafeQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self { items: Mutex::new(VecDeque::new()), not_empty: Condvar::new() }
    }

    /// Appends an item and wakes one waiting consumer.
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
        self.not_empty.notify_one();
    }

    /// Removes the head without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Removes the head, waiting up to `timeout` for one to appear.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut items = self.items.lock();
        if items.is_empty() {
            self.not_empty.wait_for(&mut items, timeout);
        }
        items.pop_front()
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Removes and returns everything currently queued.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }
}

/// Queue of replies on their way back to client connections.
pub type ResponsesQueue = ThreadSafeQueue<ResponseForSession>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = ThreadSafeQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_pop_timeout_returns_none_when_empty() {
        let queue: ThreadSafeQueue<u32> = ThreadSafeQueue::new();
        assert_eq!(queue.pop_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_pop_timeout_wakes_on_push() {
        let queue = Arc::new(ThreadSafeQueue::new());
        let producer = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push(7u32);
        });
        assert_eq!(queue.pop_timeout(Duration::from_secs(5)), Some(7));
        handle.join().unwrap();
    }

    #[test]
    fn test_drain_empties_queue() {
        let queue = ThreadSafeQueue::new();
        queue.push("a");
        queue.push("b");
        assert_eq!(queue.drain(), vec!["a", "b"]);
        assert!(queue.is_empty());
    }
}
