//! Test suites for the sharded queue and its listener
//!
//! Unit tests for each type live next to the type; these suites exercise the pieces
//! together with real worker threads.


use crate::queue::{QueueResult, QueueSetListener, QueueSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(super) const WAIT: Duration = Duration::from_secs(10);

/// Listener whose receivers record every item they see into `seen`
pub(super) fn recording_listener(
    set: Arc<QueueSet<u32>>,
    seen: Arc<Mutex<Vec<u32>>>,
    group_size: usize,
    auto_close: bool,
) -> QueueSetListener<u32> {
    QueueSetListener::builder()
        .queue_set(set)
        .receiver(move || {
            let seen = Arc::clone(&seen);
            move |batch: Vec<u32>| -> QueueResult<usize> {
                let len = batch.len();
                seen.lock().unwrap().extend(batch);
                Ok(len)
            }
        })
        .receiver_name("recording")
        .group_size(group_size)
        .auto_close(auto_close)
        .poll_timeout(Duration::from_millis(10))
        .build()
        .unwrap()
}

/// Listener that counts items and the largest batch it was handed
pub(super) fn counting_listener(
    set: Arc<QueueSet<u32>>,
    items: Arc<AtomicUsize>,
    largest_batch: Arc<AtomicUsize>,
    group_size: usize,
) -> QueueSetListener<u32> {
    QueueSetListener::builder()
        .queue_set(set)
        .receiver(move || {
            let items = Arc::clone(&items);
            let largest_batch = Arc::clone(&largest_batch);
            move |batch: Vec<u32>| -> QueueResult<usize> {
                items.fetch_add(batch.len(), Ordering::SeqCst);
                largest_batch.fetch_max(batch.len(), Ordering::SeqCst);
                Ok(batch.len())
            }
        })
        .group_size(group_size)
        .auto_close(true)
        .poll_timeout(Duration::from_millis(10))
        .build()
        .unwrap()
}

/// Global logger that keeps every formatted message
pub(super) struct CapturedLogs {
    lines: Mutex<Vec<String>>,
}

impl CapturedLogs {
    /// Number of captured messages starting with `prefix`
    pub(super) fn count_starting_with(&self, prefix: &str) -> usize {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

impl log::Log for CapturedLogs {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.lines.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static CAPTURED_LOGS: CapturedLogs = CapturedLogs {
    lines: Mutex::new(Vec::new()),
};

/// Install the capturing logger for this test binary and return it
pub(super) fn captured_logs() -> &'static CapturedLogs {
    if log::set_logger(&CAPTURED_LOGS).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }
    &CAPTURED_LOGS
}
