//! Sharded Work Queue Component
//!
//! A logical work queue split over several bounded shards, with one consumer thread per
//! shard. Producers distribute batches round-robin; each worker pulls groups of items from
//! its own shard and hands them to a user supplied [`Receiver`].
//!
//! # Architecture
//!
//! ```text
//!   put_batch(items)
//!         │  split into runs of ⌈remaining / shards_left⌉, starting at the cursor
//!         ▼
//! ┌───────────────────────────── QueueSet ─────────────────────────────┐
//! │  ┌─────────┐    ┌─────────┐    ┌─────────┐    ┌─────────┐          │
//! │  │ shard 0 │    │ shard 1 │    │ shard 2 │    │ shard 3 │          │
//! │  └────┬────┘    └────┬────┘    └────┬────┘    └────┬────┘          │
//! └───────┼──────────────┼──────────────┼──────────────┼───────────────┘
//!         │ poll group   │              │              │
//!   ┌─────┴─────┐  ┌─────┴─────┐  ┌─────┴─────┐  ┌─────┴─────┐
//!   │ worker 0  │  │ worker 1  │  │ worker 2  │  │ worker 3  │   QueueSetListener
//!   │ Receiver  │  │ Receiver  │  │ Receiver  │  │ Receiver  │
//!   └───────────┘  └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! Ordering is FIFO within a shard only. A failing receiver affects the counters of its own
//! shard and nothing else.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use queueset::queue::{QueueResult, QueueSet, QueueSetListener};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let set = Arc::new(QueueSet::new(4, 10_000)?);
//! set.put_batch((0..250u32).collect())?;
//!
//! let listener = QueueSetListener::builder()
//!     .queue_set(Arc::clone(&set))
//!     .receiver(|| |batch: Vec<u32>| -> QueueResult<usize> { Ok(batch.len()) })
//!     .group_size(10)
//!     .auto_close(true)
//!     .build()?;
//!
//! listener.start()?;
//! listener.wait_until_idle(Duration::from_secs(5));
//! assert_eq!(listener.stats().processed, 250);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod listener;
pub mod memory;
pub mod receiver;
pub mod set;
pub mod stats;
pub mod traits;
mod worker;

pub use error::{QueueError, QueueResult};
pub use listener::{ListenerState, QueueSetListener, QueueSetListenerBuilder};
pub use memory::MemoryQueue;
pub use receiver::{receiver_factory, Receiver, ReceiverFactory};
pub use set::{QueueSet, ShardBuilder};
pub use stats::{ListenerStats, ListenerSummary, ShardStats, WorkerPhase};
pub use traits::BoundedQueue;

#[cfg(test)]
mod tests;
