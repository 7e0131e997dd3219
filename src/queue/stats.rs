//! Throughput accounting for the queue set listener
//!
//! Counters are plain atomics shared by every worker of one listener run. A fresh
//! [`ThroughputCounters`] is created on each `start()`, which is how counts reset between
//! runs. Each worker also publishes its own [`WorkerPhase`] so progress summaries can report
//! how many workers are busy, waiting, or finished without inspecting the threads.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle phase reported by a worker thread
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Created, not yet running its loop
    New = 0,
    /// Checking for work
    Polling = 1,
    /// Blocked waiting for items to arrive
    Waiting = 2,
    /// Inside the receiver
    Processing = 3,
    /// Loop exited
    Terminated = 4,
}

impl WorkerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerPhase::New,
            1 => WorkerPhase::Polling,
            2 => WorkerPhase::Waiting,
            3 => WorkerPhase::Processing,
            _ => WorkerPhase::Terminated,
        }
    }

    pub fn is_runnable(self) -> bool {
        matches!(self, WorkerPhase::Polling | WorkerPhase::Processing)
    }
}

/// Per-shard counters owned by one worker
#[derive(Debug)]
pub(crate) struct ShardCounters {
    phase: AtomicU8,
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed_batches: AtomicU64,
}

impl ShardCounters {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(WorkerPhase::New as u8),
            processed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed_batches: AtomicU64::new(0),
        }
    }

    pub(crate) fn set_phase(&self, phase: WorkerPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub(crate) fn phase(&self) -> WorkerPhase {
        WorkerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }
}

/// Counters for one listener run
#[derive(Debug)]
pub(crate) struct ThroughputCounters {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed_batches: AtomicU64,
    started_at: Option<DateTime<Utc>>,
    shards: Vec<ShardCounters>,
}

impl ThroughputCounters {
    pub(crate) fn new(shard_count: usize, started_at: Option<DateTime<Utc>>) -> Self {
        Self {
            processed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed_batches: AtomicU64::new(0),
            started_at,
            shards: (0..shard_count).map(|_| ShardCounters::new()).collect(),
        }
    }

    pub(crate) fn shard(&self, index: usize) -> &ShardCounters {
        &self.shards[index]
    }

    /// Count a polled batch before it is handed to the receiver
    pub(crate) fn record_polled(&self, index: usize, batch_len: usize) {
        let n = batch_len as u64;
        self.processed.fetch_add(n, Ordering::Relaxed);
        self.shards[index].processed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_succeeded(&self, index: usize, count: usize) {
        let n = count as u64;
        self.succeeded.fetch_add(n, Ordering::Relaxed);
        self.shards[index].succeeded.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_batch(&self, index: usize) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
        self.shards[index]
            .failed_batches
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ListenerStats {
        ListenerStats {
            processed: self.processed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            started_at: self.started_at,
            shards: self
                .shards
                .iter()
                .enumerate()
                .map(|(shard, counters)| ShardStats {
                    shard,
                    phase: counters.phase(),
                    processed: counters.processed.load(Ordering::Relaxed),
                    succeeded: counters.succeeded.load(Ordering::Relaxed),
                    failed_batches: counters.failed_batches.load(Ordering::Relaxed),
                })
                .collect(),
        }
    }
}

/// Snapshot of one shard's worker
#[derive(Debug, Clone, PartialEq)]
pub struct ShardStats {
    pub shard: usize,
    pub phase: WorkerPhase,
    /// Items handed to the receiver
    pub processed: u64,
    /// Items the receiver reported as successful
    pub succeeded: u64,
    /// Batches where the receiver returned an error or panicked
    pub failed_batches: u64,
}

/// Snapshot of a listener run
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed_batches: u64,
    /// When the current (or last) run started; `None` before the first start
    pub started_at: Option<DateTime<Utc>>,
    pub shards: Vec<ShardStats>,
}

impl ListenerStats {
    pub fn runnable_workers(&self) -> usize {
        self.shards.iter().filter(|s| s.phase.is_runnable()).count()
    }

    pub fn waiting_workers(&self) -> usize {
        self.shards
            .iter()
            .filter(|s| s.phase == WorkerPhase::Waiting)
            .count()
    }

    pub fn new_or_terminated_workers(&self) -> usize {
        self.shards
            .iter()
            .filter(|s| matches!(s.phase, WorkerPhase::New | WorkerPhase::Terminated))
            .count()
    }
}

/// Progress line emitted by the listener's reporter
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerSummary {
    pub listener: String,
    pub receiver: String,
    pub processed: u64,
    pub succeeded: u64,
    pub runnable: usize,
    pub waiting: usize,
    pub new_or_terminated: usize,
}

impl ListenerSummary {
    pub(crate) fn from_stats(listener: &str, receiver: &str, stats: &ListenerStats) -> Self {
        Self {
            listener: listener.to_string(),
            receiver: receiver.to_string(),
            processed: stats.processed,
            succeeded: stats.succeeded,
            runnable: stats.runnable_workers(),
            waiting: stats.waiting_workers(),
            new_or_terminated: stats.new_or_terminated_workers(),
        }
    }
}

impl fmt::Display for ListenerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listener={} receiver={} processed={} succeeded={} runnable={} waiting={} new_or_terminated={}",
            self.listener,
            self.receiver,
            self.processed,
            self.succeeded,
            self.runnable,
            self.waiting,
            self.new_or_terminated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_per_shard() {
        let counters = ThroughputCounters::new(2, None);

        counters.record_polled(0, 5);
        counters.record_succeeded(0, 5);
        counters.record_polled(1, 3);
        counters.record_failed_batch(1);

        let stats = counters.snapshot();
        assert_eq!(stats.processed, 8);
        assert_eq!(stats.succeeded, 5);
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.shards[0].succeeded, 5);
        assert_eq!(stats.shards[1].processed, 3);
        assert_eq!(stats.shards[1].succeeded, 0);
    }

    #[test]
    fn test_phase_counts() {
        let counters = ThroughputCounters::new(4, None);
        counters.shard(0).set_phase(WorkerPhase::Processing);
        counters.shard(1).set_phase(WorkerPhase::Waiting);
        counters.shard(2).set_phase(WorkerPhase::Terminated);

        let stats = counters.snapshot();
        assert_eq!(stats.runnable_workers(), 1);
        assert_eq!(stats.waiting_workers(), 1);
        assert_eq!(stats.new_or_terminated_workers(), 2);
    }

    #[test]
    fn test_summary_display() {
        let counters = ThroughputCounters::new(1, None);
        counters.record_polled(0, 10);
        counters.record_succeeded(0, 9);

        let summary = ListenerSummary::from_stats("orders", "OrderReceiver", &counters.snapshot());
        assert_eq!(
            summary.to_string(),
            "listener=orders receiver=OrderReceiver processed=10 succeeded=9 runnable=0 waiting=0 new_or_terminated=1"
        );
    }
}
