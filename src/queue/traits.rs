//! Traits for the queue system
//!
//! This module contains the trait definitions that form the extension points of the
//! sharded queue: the shard container contract implemented by
//! [`MemoryQueue`](crate::queue::MemoryQueue). The batch processing contract lives in
//! [`receiver`](crate::queue::receiver).

use crate::queue::error::QueueResult;
use std::time::Duration;

/// A fixed-capacity FIFO container used as one shard of a [`QueueSet`](crate::queue::QueueSet)
///
/// Implementations must be safe for any number of concurrent producers and at least one
/// consumer. Insertion never blocks and never silently drops: when the queue already holds
/// `capacity()` items, `add` fails with
/// [`QueueError::CapacityExceeded`](crate::queue::QueueError::CapacityExceeded).
pub trait BoundedQueue<T>: Send + Sync {
    /// Append one item at the tail
    fn add(&self, item: T) -> QueueResult<()>;

    /// Append items in order, one `add` at a time
    ///
    /// A failure stops the batch and is returned; items added before the failure stay
    /// queued. Returns the number of items added.
    fn add_all<I>(&self, items: I) -> QueueResult<usize>
    where
        I: IntoIterator<Item = T>,
        Self: Sized,
    {
        let mut added = 0;
        for item in items {
            self.add(item)?;
            added += 1;
        }
        Ok(added)
    }

    /// Remove and return the head item, if any, without blocking
    fn poll(&self) -> QueueResult<Option<T>>;

    /// Remove up to `max` head items without blocking
    fn poll_batch(&self, max: usize) -> QueueResult<Vec<T>>;

    /// Remove up to `max` head items, waiting at most `timeout` for the first one to arrive
    fn poll_batch_timeout(&self, max: usize, timeout: Duration) -> QueueResult<Vec<T>>;

    /// Number of queued items
    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Maximum number of items the queue will hold
    fn capacity(&self) -> usize;

    /// Discard every queued item, returning how many were dropped
    fn clear(&self) -> usize;
}
