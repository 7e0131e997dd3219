//! QueueSetListener - one consumer thread per shard with start/stop lifecycle
//!
//! The listener drives a [`QueueSet`]: `start()` spawns a worker thread for every shard plus
//! a reporter that logs a progress summary at a fixed interval, `stop()` asks the workers to
//! finish and returns straight away. Workers retire themselves; the last one to exit moves
//! the listener back to [`ListenerState::Idle`].
//!
//! ```text
//!          start()              stop()             last worker exits
//!   Idle ───────────▶ Running ──────────▶ Stopping ─────────────────▶ Idle
//!                        │                                             ▲
//!                        └──── all workers auto-closed ────────────────┘
//! ```

use crate::core::sync::{
    deadline_after, lock_or_error, lock_recover, time_left, wait_timeout_recover,
};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::receiver::{receiver_factory, Receiver, ReceiverFactory};
use crate::queue::set::QueueSet;
use crate::queue::stats::{ListenerStats, ListenerSummary, ThroughputCounters};
use crate::queue::worker::{panic_message, ShardWorker, WorkerSettings};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_GROUP_SIZE: usize = 1;
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Lifecycle state of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Running,
    Stopping,
}

struct Lifecycle {
    state: ListenerState,
    /// Incremented on every start so a reporter from an earlier run can tell it is stale
    generation: u64,
    group_size: usize,
    auto_close: bool,
    counters: Arc<ThroughputCounters>,
    workers: Vec<JoinHandle<()>>,
    reporter: Option<JoinHandle<()>>,
}

/// State shared between the listener handle, its workers and its reporter
pub(crate) struct ListenerShared {
    name: String,
    receiver_name: String,
    lifecycle: Mutex<Lifecycle>,
    changed: Condvar,
    abort: AtomicBool,
    live_workers: AtomicUsize,
}

impl ListenerShared {
    pub(crate) fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Called once by every worker as it exits
    pub(crate) fn retire_worker(&self) {
        if self.live_workers.fetch_sub(1, Ordering::AcqRel) == 1 {
            let mut lifecycle = lock_recover(&self.lifecycle);
            self.mark_idle(&mut lifecycle);
        }
    }

    fn mark_idle(&self, lifecycle: &mut Lifecycle) {
        let previous = lifecycle.state;
        lifecycle.state = ListenerState::Idle;
        self.changed.notify_all();

        log::info!(
            "Listener idle (was {:?}): {}",
            previous,
            self.summary_of(&lifecycle.counters)
        );
    }

    fn summary_of(&self, counters: &ThroughputCounters) -> ListenerSummary {
        ListenerSummary::from_stats(&self.name, &self.receiver_name, &counters.snapshot())
    }

    fn run_reporter(&self, generation: u64, interval: Duration) {
        let mut lifecycle = lock_recover(&self.lifecycle);
        loop {
            // An interval too large for a deadline never reports
            let deadline = deadline_after(interval);
            loop {
                if lifecycle.generation != generation || lifecycle.state != ListenerState::Running
                {
                    return;
                }
                let Some(left) = time_left(deadline) else {
                    break;
                };
                let (guard, _timed_out) = wait_timeout_recover(&self.changed, lifecycle, left);
                lifecycle = guard;
            }

            // Logged under the lock so no progress line follows a stop
            log::info!("{}", self.summary_of(&lifecycle.counters));
        }
    }
}

/// Runs one worker thread per shard of a [`QueueSet`]
///
/// # Example
///
/// ```rust,no_run
/// use queueset::queue::{QueueSet, QueueSetListener, QueueResult};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let set = Arc::new(QueueSet::new(4, 10_000)?);
///
/// let listener = QueueSetListener::builder()
///     .queue_set(Arc::clone(&set))
///     .receiver(|| |batch: Vec<String>| -> QueueResult<usize> { Ok(batch.len()) })
///     .group_size(16)
///     .auto_close(true)
///     .build()?;
///
/// set.put_batch((0..1000).map(|i| format!("item-{}", i)).collect())?;
/// listener.start()?;
/// listener.wait_until_idle(Duration::from_secs(10));
/// println!("{}", listener.summary());
/// # Ok(())
/// # }
/// ```
pub struct QueueSetListener<T> {
    queue_set: Arc<QueueSet<T>>,
    factory: ReceiverFactory<T>,
    shared: Arc<ListenerShared>,
    report_interval: Duration,
    poll_timeout: Duration,
}

impl<T: Send + 'static> QueueSetListener<T> {
    pub fn builder() -> QueueSetListenerBuilder<T> {
        QueueSetListenerBuilder::new()
    }

    /// Spawn one worker per shard and the progress reporter
    ///
    /// Calling `start()` while the listener is running or still stopping logs a warning and
    /// does nothing. Fails with a configuration error when the queue set has no shards.
    pub fn start(&self) -> QueueResult<()> {
        let mut lifecycle = lock_or_error(&self.shared.lifecycle, "listener")?;
        if lifecycle.state != ListenerState::Idle {
            log::warn!(
                "Listener {} is {:?}; start ignored",
                self.shared.name,
                lifecycle.state
            );
            return Ok(());
        }

        let shards = self.queue_set.shards().to_vec();
        if shards.is_empty() {
            return Err(QueueError::configuration(format!(
                "listener {} has no shards to consume ({} configured)",
                self.shared.name,
                self.queue_set.configured_shards()
            )));
        }

        // Threads from the previous run have all retired; reap them once the lock is released.
        let mut finished: Vec<JoinHandle<()>> = lifecycle.workers.drain(..).collect();
        finished.extend(lifecycle.reporter.take());

        let counters = Arc::new(ThroughputCounters::new(shards.len(), Some(Utc::now())));
        lifecycle.counters = Arc::clone(&counters);
        lifecycle.generation += 1;
        lifecycle.state = ListenerState::Running;
        self.shared.abort.store(false, Ordering::Release);
        self.shared
            .live_workers
            .store(shards.len(), Ordering::Release);

        let settings = WorkerSettings {
            group_size: lifecycle.group_size,
            auto_close: lifecycle.auto_close,
            poll_timeout: self.poll_timeout,
        };
        let total = shards.len();

        for (index, shard) in shards.into_iter().enumerate() {
            let worker = ShardWorker {
                index,
                shard,
                factory: Arc::clone(&self.factory),
                counters: Arc::clone(&counters),
                shared: Arc::clone(&self.shared),
                settings,
            };

            let spawned = thread::Builder::new()
                .name(format!("{}-shard-{}", self.shared.name, index))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => lifecycle.workers.push(handle),
                Err(e) => {
                    self.abort_partial_start(&mut lifecycle, total - index);
                    return Err(QueueError::WorkerSpawn {
                        message: format!("shard {}: {}", index, e),
                    });
                }
            }
        }

        let shared = Arc::clone(&self.shared);
        let generation = lifecycle.generation;
        let interval = self.report_interval;
        match thread::Builder::new()
            .name(format!("{}-reporter", self.shared.name))
            .spawn(move || shared.run_reporter(generation, interval))
        {
            Ok(handle) => lifecycle.reporter = Some(handle),
            Err(e) => log::warn!(
                "Listener {} running without progress reporter: {}",
                self.shared.name,
                e
            ),
        }

        log::info!(
            "Listener {} started {} workers (group size {}, auto-close {})",
            self.shared.name,
            total,
            settings.group_size,
            settings.auto_close
        );
        drop(lifecycle);

        reap_threads(&self.shared.name, finished);
        Ok(())
    }

    /// Undo a start whose thread spawning failed part way through
    fn abort_partial_start(&self, lifecycle: &mut Lifecycle, unspawned: usize) {
        self.shared.abort.store(true, Ordering::Release);
        lifecycle.state = ListenerState::Stopping;
        self.queue_set.wake_consumers();

        let previous = self
            .shared
            .live_workers
            .fetch_sub(unspawned, Ordering::AcqRel);
        if previous == unspawned {
            self.shared.mark_idle(lifecycle);
        }
    }

    /// Ask every worker to finish after its current batch
    ///
    /// Returns immediately; poll [`is_busy`](Self::is_busy) or call
    /// [`wait_until_idle`](Self::wait_until_idle) to learn when shutdown completed. A
    /// receiver that never returns keeps its worker, and so the listener, busy forever.
    pub fn stop(&self) {
        let mut lifecycle = lock_recover(&self.shared.lifecycle);
        if lifecycle.state != ListenerState::Running {
            log::debug!(
                "Listener {} is {:?}; stop ignored",
                self.shared.name,
                lifecycle.state
            );
            return;
        }

        self.shared.abort.store(true, Ordering::Release);
        lifecycle.state = ListenerState::Stopping;
        self.shared.changed.notify_all();
        drop(lifecycle);

        self.queue_set.wake_consumers();
        log::info!("Stop requested for listener {}", self.shared.name);
    }

    /// True from `start()` until every worker has exited
    pub fn is_busy(&self) -> bool {
        self.state() != ListenerState::Idle
    }

    pub fn state(&self) -> ListenerState {
        lock_recover(&self.shared.lifecycle).state
    }

    /// Block until the listener is idle or `timeout` elapses; returns whether it is idle
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = deadline_after(timeout);
        let mut lifecycle = lock_recover(&self.shared.lifecycle);
        while lifecycle.state != ListenerState::Idle {
            let Some(left) = time_left(deadline) else {
                return false;
            };
            let (guard, _timed_out) = wait_timeout_recover(&self.shared.changed, lifecycle, left);
            lifecycle = guard;
        }
        true
    }

    /// Change the batch size; ignored unless the listener is idle
    pub fn set_group_size(&self, group_size: usize) -> QueueResult<()> {
        if group_size == 0 {
            return Err(QueueError::invalid_argument(
                "group size must be greater than zero",
            ));
        }

        let mut lifecycle = lock_recover(&self.shared.lifecycle);
        if lifecycle.state == ListenerState::Idle {
            lifecycle.group_size = group_size;
        } else {
            log::debug!(
                "Listener {} is busy; group size change to {} ignored",
                self.shared.name,
                group_size
            );
        }
        Ok(())
    }

    /// Change the auto-close policy; ignored unless the listener is idle
    pub fn set_auto_close(&self, auto_close: bool) {
        let mut lifecycle = lock_recover(&self.shared.lifecycle);
        if lifecycle.state == ListenerState::Idle {
            lifecycle.auto_close = auto_close;
        } else {
            log::debug!(
                "Listener {} is busy; auto-close change to {} ignored",
                self.shared.name,
                auto_close
            );
        }
    }

    pub fn group_size(&self) -> usize {
        lock_recover(&self.shared.lifecycle).group_size
    }

    pub fn auto_close(&self) -> bool {
        lock_recover(&self.shared.lifecycle).auto_close
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn receiver_name(&self) -> &str {
        &self.shared.receiver_name
    }

    pub fn queue_set(&self) -> &Arc<QueueSet<T>> {
        &self.queue_set
    }

    /// Counters of the current (or most recent) run
    pub fn stats(&self) -> ListenerStats {
        let counters = Arc::clone(&lock_recover(&self.shared.lifecycle).counters);
        counters.snapshot()
    }

    /// The progress line the reporter logs
    pub fn summary(&self) -> ListenerSummary {
        let counters = Arc::clone(&lock_recover(&self.shared.lifecycle).counters);
        self.shared.summary_of(&counters)
    }
}

impl<T> Drop for QueueSetListener<T> {
    fn drop(&mut self) {
        // Workers keep their own handles on the shared state; ask them to finish but do not
        // wait, a stuck receiver would hang the drop.
        let mut lifecycle = lock_recover(&self.shared.lifecycle);
        if lifecycle.state == ListenerState::Running {
            self.shared.abort.store(true, Ordering::Release);
            lifecycle.state = ListenerState::Stopping;
            self.shared.changed.notify_all();
            drop(lifecycle);
            self.queue_set.wake_consumers();
        }
    }
}

/// Join threads that have already retired; returns how many ended in a panic
fn reap_threads(listener: &str, handles: Vec<JoinHandle<()>>) -> usize {
    let mut panicked = 0;
    for handle in handles {
        let thread_name = handle.thread().name().unwrap_or("unnamed").to_string();
        if let Err(payload) = handle.join() {
            log::warn!(
                "Listener {}: thread {} panicked: {}",
                listener,
                thread_name,
                panic_message(payload.as_ref())
            );
            panicked += 1;
        }
    }
    panicked
}

/// Builder for [`QueueSetListener`]
pub struct QueueSetListenerBuilder<T> {
    queue_set: Option<Arc<QueueSet<T>>>,
    factory: Option<ReceiverFactory<T>>,
    receiver_name: Option<String>,
    name: String,
    group_size: usize,
    auto_close: bool,
    report_interval: Duration,
    poll_timeout: Duration,
}

impl<T: Send + 'static> QueueSetListenerBuilder<T> {
    fn new() -> Self {
        Self {
            queue_set: None,
            factory: None,
            receiver_name: None,
            name: "queueset".to_string(),
            group_size: DEFAULT_GROUP_SIZE,
            auto_close: false,
            report_interval: DEFAULT_REPORT_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// The queue set to consume (required)
    pub fn queue_set(mut self, queue_set: Arc<QueueSet<T>>) -> Self {
        self.queue_set = Some(queue_set);
        self
    }

    /// Constructor called once per worker thread (required, or use `receiver_factory`)
    pub fn receiver<R, F>(mut self, make: F) -> Self
    where
        R: Receiver<T> + 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.factory = Some(receiver_factory(make));
        self.receiver_name
            .get_or_insert_with(|| std::any::type_name::<R>().to_string());
        self
    }

    /// Pre-boxed receiver factory
    pub fn receiver_factory(mut self, factory: ReceiverFactory<T>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Name used for the receiver in progress summaries
    pub fn receiver_name(mut self, name: impl Into<String>) -> Self {
        self.receiver_name = Some(name.into());
        self
    }

    /// Listener name, used as the worker thread name prefix
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    pub fn auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = auto_close;
        self
    }

    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Longest time a worker sleeps on an empty shard before re-checking for a stop
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn build(self) -> QueueResult<QueueSetListener<T>> {
        let queue_set = self
            .queue_set
            .ok_or_else(|| QueueError::invalid_argument("listener requires a queue set"))?;
        let factory = self
            .factory
            .ok_or_else(|| QueueError::invalid_argument("listener requires a receiver factory"))?;
        if self.group_size == 0 {
            return Err(QueueError::invalid_argument(
                "group size must be greater than zero",
            ));
        }
        if self.report_interval.is_zero() || self.poll_timeout.is_zero() {
            return Err(QueueError::invalid_argument(
                "report interval and poll timeout must be non-zero",
            ));
        }

        let receiver_name = self
            .receiver_name
            .unwrap_or_else(|| "receiver".to_string());

        Ok(QueueSetListener {
            queue_set,
            factory,
            shared: Arc::new(ListenerShared {
                name: self.name,
                receiver_name,
                lifecycle: Mutex::new(Lifecycle {
                    state: ListenerState::Idle,
                    generation: 0,
                    group_size: self.group_size,
                    auto_close: self.auto_close,
                    counters: Arc::new(ThroughputCounters::new(0, None)),
                    workers: Vec::new(),
                    reporter: None,
                }),
                changed: Condvar::new(),
                abort: AtomicBool::new(false),
                live_workers: AtomicUsize::new(0),
            }),
            report_interval: self.report_interval,
            poll_timeout: self.poll_timeout,
        })
    }
}
