//! Demo workload for the `queueset` binary
//!
//! Produces synthetic work items into a queue set and lets a listener drain them through a
//! receiver that only logs what it sees.

use crate::app::cli::QueueSetConfig;
use crate::core::shutdown::ShutdownCoordinator;
use crate::queue::{
    ListenerSummary, QueueError, QueueResult, QueueSet, QueueSetListener, Receiver,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const IDLE_CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// A unit of demo work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: usize,
    pub payload: String,
}

/// Receiver that logs each batch and counts every item as a success
#[derive(Debug, Default)]
pub struct LoggingReceiver {
    batches: u64,
}

impl Receiver<WorkItem> for LoggingReceiver {
    fn receive(&mut self, batch: Vec<WorkItem>) -> QueueResult<usize> {
        self.batches += 1;
        if let (Some(first), Some(last)) = (batch.first(), batch.last()) {
            log::debug!(
                "Batch {} on {}: items {}..={} ({} items)",
                self.batches,
                std::thread::current().name().unwrap_or("worker"),
                first.id,
                last.id,
                batch.len()
            );
        }
        Ok(batch.len())
    }

    fn name(&self) -> String {
        "LoggingReceiver".to_string()
    }
}

/// Outcome of a demo run
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub produced: usize,
    pub rejected: usize,
    pub interrupted: bool,
    pub summary: ListenerSummary,
}

/// Build the queue set and listener described by `config`
pub fn build_listener(config: &QueueSetConfig) -> QueueResult<QueueSetListener<WorkItem>> {
    let queue_set = Arc::new(QueueSet::new(config.shards, config.max_capacity)?);

    QueueSetListener::builder()
        .name("queueset")
        .queue_set(queue_set)
        .receiver(LoggingReceiver::default)
        .receiver_name("LoggingReceiver")
        .group_size(config.group_size)
        .auto_close(config.auto_close)
        .report_interval(config.report_interval())
        .poll_timeout(config.poll_timeout())
        .build()
}

/// Split `items` work items into `put_batch` calls of at most `batch` items
///
/// Returns `(produced, rejected)`. A full shard drops the rest of that batch; production
/// carries on with the next one.
pub fn produce(set: &QueueSet<WorkItem>, items: usize, batch: usize) -> QueueResult<(usize, usize)> {
    if batch == 0 {
        return Err(QueueError::invalid_argument("batch size must be greater than zero"));
    }

    let mut produced = 0;
    let mut rejected = 0;
    let mut next_id = 0;
    while next_id < items {
        let end = (next_id + batch).min(items);
        let chunk: Vec<WorkItem> = (next_id..end)
            .map(|id| WorkItem {
                id,
                payload: format!("item-{}", id),
            })
            .collect();
        let chunk_len = chunk.len();
        let before = set.size();

        match set.put_batch(chunk) {
            Ok(placed) => produced += placed,
            Err(QueueError::CapacityExceeded { capacity }) => {
                // Consumers may drain concurrently, so the size delta is only an estimate
                let placed = set.size().saturating_sub(before).min(chunk_len);
                log::warn!(
                    "Shard capacity {} reached; dropped about {} items of batch starting at {}",
                    capacity,
                    chunk_len - placed,
                    next_id
                );
                produced += placed;
                rejected += chunk_len - placed;
            }
            Err(e) => return Err(e),
        }
        next_id = end;
    }

    Ok((produced, rejected))
}

/// Produce the demo items, start the listener, and wait for it to go idle or for shutdown
pub async fn run(
    config: &QueueSetConfig,
    items: usize,
    batch: usize,
    coordinator: &ShutdownCoordinator,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> QueueResult<DemoReport> {
    let listener = build_listener(config)?;
    let (produced, rejected) = produce(listener.queue_set(), items, batch)?;
    log::info!(
        "Queued {} items over {} shards {:?}",
        produced,
        listener.queue_set().shard_count(),
        listener.queue_set().shard_sizes()
    );

    listener.start()?;

    let mut interrupted = false;
    while listener.is_busy() {
        if coordinator
            .sleep_or_shutdown(shutdown_rx, IDLE_CHECK_INTERVAL)
            .await
        {
            interrupted = true;
            break;
        }
    }

    if interrupted {
        log::info!("Stopping listener after shutdown request");
    }
    listener.stop();

    let listener = Arc::new(listener);
    let waiter = Arc::clone(&listener);
    let idle = tokio::task::spawn_blocking(move || waiter.wait_until_idle(Duration::from_secs(30)))
        .await
        .unwrap_or(false);
    if !idle {
        log::warn!("Listener still busy after 30s; a receiver may be stuck");
    }

    Ok(DemoReport {
        produced,
        rejected,
        interrupted,
        summary: listener.summary(),
    })
}
