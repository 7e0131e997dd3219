//! Per-shard worker thread
//!
//! Each worker owns one shard for the duration of a listener run. It builds its own receiver,
//! then polls batches until a stop is requested (or, with auto-close, until its shard comes
//! up empty). Receiver errors and panics are contained here so one misbehaving shard never
//! affects the others.

use crate::queue::listener::ListenerShared;
use crate::queue::memory::MemoryQueue;
use crate::queue::receiver::{Receiver, ReceiverFactory};
use crate::queue::stats::{ThroughputCounters, WorkerPhase};
use crate::queue::traits::BoundedQueue;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Settings frozen at `start()`
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerSettings {
    pub group_size: usize,
    pub auto_close: bool,
    pub poll_timeout: Duration,
}

pub(crate) struct ShardWorker<T> {
    pub index: usize,
    pub shard: Arc<MemoryQueue<T>>,
    pub factory: ReceiverFactory<T>,
    pub counters: Arc<ThroughputCounters>,
    pub shared: Arc<ListenerShared>,
    pub settings: WorkerSettings,
}

/// Marks the worker terminated and retires it from the listener when dropped,
/// including when the worker unwinds
struct RetireGuard {
    index: usize,
    counters: Arc<ThroughputCounters>,
    shared: Arc<ListenerShared>,
}

impl Drop for RetireGuard {
    fn drop(&mut self) {
        self.counters
            .shard(self.index)
            .set_phase(WorkerPhase::Terminated);
        self.shared.retire_worker();
    }
}

impl<T: Send + 'static> ShardWorker<T> {
    pub(crate) fn run(self) {
        let _guard = RetireGuard {
            index: self.index,
            counters: Arc::clone(&self.counters),
            shared: Arc::clone(&self.shared),
        };

        let factory = Arc::clone(&self.factory);
        let mut receiver = match panic::catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(receiver) => receiver,
            Err(payload) => {
                log::error!(
                    "Shard {} worker could not build its receiver: {}",
                    self.index,
                    panic_message(payload.as_ref())
                );
                return;
            }
        };

        log::debug!(
            "Shard {} worker started (group size {}, auto-close {})",
            self.index,
            self.settings.group_size,
            self.settings.auto_close
        );

        let phase = self.counters.shard(self.index);
        loop {
            if self.shared.abort_requested() {
                log::debug!("Shard {} worker observed stop request", self.index);
                break;
            }

            phase.set_phase(if self.shard.is_empty() {
                WorkerPhase::Waiting
            } else {
                WorkerPhase::Polling
            });

            let batch = match self
                .shard
                .poll_batch_timeout(self.settings.group_size, self.settings.poll_timeout)
            {
                Ok(batch) => batch,
                Err(e) => {
                    log::error!("Shard {} poll failed, worker exiting: {}", self.index, e);
                    break;
                }
            };

            if batch.is_empty() {
                if self.settings.auto_close {
                    log::debug!("Shard {} drained, auto-closing worker", self.index);
                    break;
                }
                continue;
            }

            phase.set_phase(WorkerPhase::Processing);
            self.process(receiver.as_mut(), batch);
        }
    }

    fn process(&self, receiver: &mut dyn Receiver<T>, batch: Vec<T>) {
        let batch_len = batch.len();
        self.counters.record_polled(self.index, batch_len);

        match panic::catch_unwind(AssertUnwindSafe(|| receiver.receive(batch))) {
            Ok(Ok(count)) => {
                if count > batch_len {
                    log::warn!(
                        "Receiver {} reported {} successes for a batch of {} on shard {}",
                        receiver.name(),
                        count,
                        batch_len,
                        self.index
                    );
                }
                self.counters
                    .record_succeeded(self.index, count.min(batch_len));
            }
            Ok(Err(e)) => {
                self.counters.record_failed_batch(self.index);
                log::error!(
                    "Receiver {} failed on shard {} ({} items): {}",
                    receiver.name(),
                    self.index,
                    batch_len,
                    e
                );
                log::debug!("DEBUG_DETAILS: {:?}", e);
            }
            Err(payload) => {
                self.counters.record_failed_batch(self.index);
                log::error!(
                    "Receiver {} panicked on shard {} ({} items): {}",
                    receiver.name(),
                    self.index,
                    batch_len,
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
