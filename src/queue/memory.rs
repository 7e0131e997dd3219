//! In-memory bounded FIFO queue
//!
//! The shard container behind [`QueueSet`](crate::queue::QueueSet). Items live in a
//! `VecDeque` behind a mutex; a condition variable lets a consumer sleep while the shard is
//! empty and be woken on insertion (or explicitly, so it can observe a stop request).

use crate::core::sync::{lock_or_error, lock_recover, wait_timeout_recover};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::traits::BoundedQueue;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Bounded FIFO queue held entirely in memory
///
/// # Example
///
/// ```rust
/// use queueset::queue::{BoundedQueue, MemoryQueue};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let queue = MemoryQueue::new(2)?;
/// queue.add("a")?;
/// queue.add("b")?;
/// assert!(queue.add("c").is_err());
///
/// assert_eq!(queue.poll_batch(5)?, vec!["a", "b"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
    capacity: usize,
}

impl<T> MemoryQueue<T> {
    /// Create an empty queue holding at most `capacity` items
    pub fn new(capacity: usize) -> QueueResult<Self> {
        if capacity == 0 {
            return Err(QueueError::invalid_argument(
                "queue capacity must be greater than zero",
            ));
        }

        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            available: Condvar::new(),
            capacity,
        })
    }

    /// Wake every consumer blocked in `poll_batch_timeout`
    pub fn wake_consumers(&self) {
        self.available.notify_all();
    }

    fn drain_front(items: &mut VecDeque<T>, max: usize) -> Vec<T> {
        let take = max.min(items.len());
        items.drain(..take).collect()
    }
}

impl<T: Send> BoundedQueue<T> for MemoryQueue<T> {
    fn add(&self, item: T) -> QueueResult<()> {
        {
            let mut items = lock_or_error(&self.items, "shard")?;
            if items.len() >= self.capacity {
                return Err(QueueError::CapacityExceeded {
                    capacity: self.capacity,
                });
            }
            items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    fn poll(&self) -> QueueResult<Option<T>> {
        let mut items = lock_or_error(&self.items, "shard")?;
        Ok(items.pop_front())
    }

    fn poll_batch(&self, max: usize) -> QueueResult<Vec<T>> {
        let mut items = lock_or_error(&self.items, "shard")?;
        Ok(Self::drain_front(&mut items, max))
    }

    fn poll_batch_timeout(&self, max: usize, timeout: Duration) -> QueueResult<Vec<T>> {
        let mut items = lock_or_error(&self.items, "shard")?;
        if items.is_empty() && !timeout.is_zero() {
            // A single wait: callers loop and re-check their own stop conditions.
            let (guard, _timed_out) = wait_timeout_recover(&self.available, items, timeout);
            items = guard;
        }
        Ok(Self::drain_front(&mut items, max))
    }

    fn size(&self) -> usize {
        lock_recover(&self.items).len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&self) -> usize {
        let mut items = lock_recover(&self.items);
        let dropped = items.len();
        items.clear();
        dropped
    }
}
