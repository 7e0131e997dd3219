//! Common test utilities and helpers
//!
//! Shared receivers and fixtures for the integration tests.

#![allow(dead_code)]

use queueset::queue::{QueueError, QueueResult, Receiver};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const WAIT: Duration = Duration::from_secs(10);

/// Items received per worker thread name
pub type Deliveries = Arc<Mutex<HashMap<String, Vec<u64>>>>;

/// Records every item it receives under the name of the worker thread
pub struct CollectingReceiver {
    thread: String,
    deliveries: Deliveries,
    reject_over: Option<u64>,
}

impl CollectingReceiver {
    pub fn new(deliveries: Deliveries) -> Self {
        Self {
            thread: std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string(),
            deliveries,
            reject_over: None,
        }
    }

    /// Count items above `limit` as unsuccessful instead of failing the batch
    pub fn rejecting_over(deliveries: Deliveries, limit: u64) -> Self {
        Self {
            reject_over: Some(limit),
            ..Self::new(deliveries)
        }
    }
}

impl Receiver<u64> for CollectingReceiver {
    fn receive(&mut self, batch: Vec<u64>) -> QueueResult<usize> {
        let accepted = match self.reject_over {
            Some(limit) => batch.iter().filter(|&&item| item <= limit).count(),
            None => batch.len(),
        };

        self.deliveries
            .lock()
            .map_err(|_| QueueError::processing("deliveries lock poisoned"))?
            .entry(self.thread.clone())
            .or_default()
            .extend(batch);
        Ok(accepted)
    }

    fn name(&self) -> String {
        "CollectingReceiver".to_string()
    }
}

pub fn new_deliveries() -> Deliveries {
    Arc::new(Mutex::new(HashMap::new()))
}

pub fn delivered_count(deliveries: &Deliveries) -> usize {
    deliveries.lock().unwrap().values().map(Vec::len).sum()
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Write `contents` to a temporary `.toml` file
pub fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("queueset")
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
