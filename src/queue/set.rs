//! QueueSet - one logical queue sharded over several bounded queues
//!
//! Producers insert through [`QueueSet::put`] / [`QueueSet::put_batch`]; each batch is split
//! into consecutive runs that are handed to the shards in round-robin order, starting from
//! wherever the previous batch left the cursor. FIFO order holds within a shard, never across
//! shards.

use crate::core::sync::{lock_or_error, lock_recover};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::memory::MemoryQueue;
use crate::queue::traits::BoundedQueue;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

/// Constructor for a single shard, given its index and capacity
pub type ShardBuilder<T> = Box<dyn Fn(usize, usize) -> QueueResult<MemoryQueue<T>> + Send + Sync>;

/// Sharded queue with round-robin batch distribution
///
/// Shards are built on first access. A shard whose construction fails is logged and left
/// out, which lowers the parallelism a [`QueueSetListener`](crate::queue::QueueSetListener)
/// can reach but does not stop the set from working with the remaining shards.
///
/// `max_capacity` is a soft bound: every shard gets `max_capacity / shards` slots, so the
/// total can fall slightly short of it.
///
/// # Example
///
/// ```rust
/// use queueset::queue::QueueSet;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let set = QueueSet::new(4, 400)?;
/// set.put_batch((0..250).collect())?;
///
/// assert_eq!(set.shard_sizes(), vec![63, 63, 62, 62]);
/// assert_eq!(set.size(), 250);
/// # Ok(())
/// # }
/// ```
pub struct QueueSet<T> {
    configured_shards: usize,
    max_capacity: usize,
    shards: OnceLock<Vec<Arc<MemoryQueue<T>>>>,
    builder: ShardBuilder<T>,
    /// Next shard to receive items
    cursor: Mutex<usize>,
}

impl<T: Send + 'static> QueueSet<T> {
    /// Create a set of `shard_count` in-memory shards sharing `max_capacity` slots
    pub fn new(shard_count: usize, max_capacity: usize) -> QueueResult<Self> {
        Self::with_shard_builder(
            shard_count,
            max_capacity,
            Box::new(|_index, capacity| MemoryQueue::new(capacity)),
        )
    }

    /// Create a set whose shards are produced by `builder`
    pub fn with_shard_builder(
        shard_count: usize,
        max_capacity: usize,
        builder: ShardBuilder<T>,
    ) -> QueueResult<Self> {
        if shard_count == 0 {
            return Err(QueueError::invalid_argument(
                "queue set needs at least one shard",
            ));
        }

        Ok(Self {
            configured_shards: shard_count,
            max_capacity,
            shards: OnceLock::new(),
            builder,
            cursor: Mutex::new(0),
        })
    }

    /// Shards that were constructed successfully, building them on first use
    pub fn shards(&self) -> &[Arc<MemoryQueue<T>>] {
        self.shards.get_or_init(|| self.build_shards())
    }

    fn build_shards(&self) -> Vec<Arc<MemoryQueue<T>>> {
        let capacity = self.shard_capacity();
        let mut shards = Vec::with_capacity(self.configured_shards);

        for index in 0..self.configured_shards {
            match (self.builder)(index, capacity) {
                Ok(queue) => shards.push(Arc::new(queue)),
                Err(e) => {
                    log::error!(
                        "Failed to create shard {}/{} with capacity {}: {}",
                        index + 1,
                        self.configured_shards,
                        capacity,
                        e
                    );
                }
            }
        }

        if shards.len() < self.configured_shards {
            log::warn!(
                "Queue set degraded: {} of {} shards available",
                shards.len(),
                self.configured_shards
            );
        } else {
            log::debug!(
                "Created {} shards with capacity {} each",
                shards.len(),
                capacity
            );
        }

        shards
    }

    /// Shard at `index` in the constructed list
    pub fn shard(&self, index: usize) -> Option<Arc<MemoryQueue<T>>> {
        self.shards().get(index).cloned()
    }

    /// Number of shards actually available
    pub fn shard_count(&self) -> usize {
        self.shards().len()
    }

    /// Number of shards requested at construction
    pub fn configured_shards(&self) -> usize {
        self.configured_shards
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Capacity given to each shard
    pub fn shard_capacity(&self) -> usize {
        self.max_capacity / self.configured_shards
    }

    /// Index of the shard that will receive the next run of items
    pub fn cursor(&self) -> usize {
        *lock_recover(&self.cursor)
    }

    /// Insert one item
    pub fn put(&self, item: T) -> QueueResult<usize> {
        self.put_batch(vec![item])
    }

    /// Distribute `batch` over the shards in round-robin order
    ///
    /// Starting at the cursor, each shard takes `⌈remaining / shards_left⌉` items from the
    /// front of the batch and the cursor moves on by one. Distribution stops as soon as the
    /// batch is used up, so small batches rotate through the shards across calls.
    ///
    /// When a shard is full the error is returned straight away: items already placed stay
    /// queued, the rest of the batch is dropped, and the cursor moves past the full shard.
    pub fn put_batch(&self, batch: Vec<T>) -> QueueResult<usize> {
        let shards = self.shards();
        if shards.is_empty() {
            return Err(QueueError::configuration("queue set has no usable shards"));
        }
        if batch.is_empty() {
            return Ok(0);
        }

        let shard_count = shards.len();
        let total = batch.len();
        let mut remaining = total;
        let mut items = batch.into_iter();

        let mut cursor = lock_or_error(&self.cursor, "queue set cursor")?;
        for visited in 0..shard_count {
            if remaining == 0 {
                break;
            }

            let quota = remaining.div_ceil(shard_count - visited);
            let shard = &shards[*cursor];
            let index = *cursor;
            *cursor = (*cursor + 1) % shard_count;

            for item in items.by_ref().take(quota) {
                if let Err(e) = shard.add(item) {
                    log::debug!(
                        "Shard {} rejected item after {} of {} placed: {}",
                        index,
                        total - remaining,
                        total,
                        e
                    );
                    return Err(e);
                }
                remaining -= 1;
            }
        }

        log::trace!("Distributed {} items, next shard {}", total, *cursor);
        Ok(total)
    }

    /// Total queued items across all shards
    ///
    /// Shards are read one after another, so the result is approximate under concurrent
    /// producers or consumers.
    pub fn size(&self) -> usize {
        self.shards().iter().map(|shard| shard.size()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards().iter().all(|shard| shard.is_empty())
    }

    /// Size of every shard, in shard order
    pub fn shard_sizes(&self) -> Vec<usize> {
        self.shards().iter().map(|shard| shard.size()).collect()
    }

    /// Empty every shard, returning the number of discarded items
    pub fn clear(&self) -> usize {
        self.shards().iter().map(|shard| shard.clear()).sum()
    }
}

impl<T> QueueSet<T> {
    /// Wake every consumer waiting on an empty shard
    ///
    /// Shards that have not been built yet have no consumers, so they are skipped.
    pub fn wake_consumers(&self) {
        for shard in self.shards.get().into_iter().flatten() {
            shard.wake_consumers();
        }
    }
}

impl<T> fmt::Debug for QueueSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSet")
            .field("configured_shards", &self.configured_shards)
            .field("max_capacity", &self.max_capacity)
            .field("shards_built", &self.shards.get().map(Vec::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_shards_is_invalid() {
        match QueueSet::<u32>::new(0, 100) {
            Err(QueueError::InvalidArgument { .. }) => {}
            other => panic!("Expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_shards_are_built_lazily() {
        let set = QueueSet::<u32>::new(3, 30).unwrap();
        assert!(format!("{:?}", set).contains("shards_built: None"));

        assert_eq!(set.shard_count(), 3);
        assert!(format!("{:?}", set).contains("shards_built: Some(3)"));
        assert!(set.shards().iter().all(|s| s.capacity() == 10));
    }

    #[test]
    fn test_exact_split_of_250_over_four_shards() {
        let set = QueueSet::new(4, 400).unwrap();
        assert_eq!(set.cursor(), 0);

        set.put_batch((0..250).collect()).unwrap();

        assert_eq!(set.shard_sizes(), vec![63, 63, 62, 62]);
        assert_eq!(set.cursor(), 0);
    }

    #[test]
    fn test_single_puts_rotate_through_shards() {
        let set = QueueSet::new(3, 30).unwrap();

        for i in 0..7 {
            set.put(i).unwrap();
        }

        assert_eq!(set.shard_sizes(), vec![3, 2, 2]);
        assert_eq!(set.cursor(), 1);
        assert_eq!(set.shard(0).unwrap().poll_batch(10).unwrap(), vec![0, 3, 6]);
        assert_eq!(set.shard(1).unwrap().poll_batch(10).unwrap(), vec![1, 4]);
    }

    #[test]
    fn test_small_batch_continues_from_cursor() {
        let set = QueueSet::new(4, 400).unwrap();

        set.put_batch(vec![1, 2]).unwrap();
        assert_eq!(set.shard_sizes(), vec![1, 1, 0, 0]);
        assert_eq!(set.cursor(), 2);

        set.put_batch(vec![3, 4, 5]).unwrap();
        assert_eq!(set.shard_sizes(), vec![2, 1, 1, 1]);
        assert_eq!(set.cursor(), 1);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let set = QueueSet::<u8>::new(2, 10).unwrap();
        assert_eq!(set.put_batch(Vec::new()).unwrap(), 0);
        assert_eq!(set.cursor(), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn test_capacity_failure_keeps_placed_items() {
        let set = QueueSet::new(2, 4).unwrap();

        // quota 3 for the first shard exceeds its capacity of 2
        let result = set.put_batch(vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(result, Err(QueueError::CapacityExceeded { capacity: 2 }));

        assert_eq!(set.shard_sizes(), vec![2, 0]);
        assert_eq!(set.cursor(), 1);
    }

    #[test]
    fn test_degraded_shard_is_omitted() {
        let set = QueueSet::with_shard_builder(
            3,
            30,
            Box::new(|index, capacity| {
                if index == 1 {
                    Err(QueueError::configuration("simulated failure"))
                } else {
                    MemoryQueue::new(capacity)
                }
            }),
        )
        .unwrap();

        assert_eq!(set.configured_shards(), 3);
        assert_eq!(set.shard_count(), 2);

        set.put_batch((0..10).collect()).unwrap();
        assert_eq!(set.shard_sizes(), vec![5, 5]);
    }

    #[test]
    fn test_capacity_below_shard_count_leaves_no_shards() {
        let set = QueueSet::<u32>::new(4, 3).unwrap();

        assert_eq!(set.shard_count(), 0);
        match set.put(1) {
            Err(QueueError::Configuration { .. }) => {}
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_clear_empties_all_shards() {
        let set = QueueSet::new(3, 30).unwrap();
        set.put_batch((0..12).collect()).unwrap();

        assert_eq!(set.clear(), 12);
        assert_eq!(set.size(), 0);
        assert!(set.is_empty());
    }
}
