//! Lock poisoning policy shared by the queue and listener
//!
//! Queue state is only mutated by code that cannot panic half-way through an update, so a
//! poisoned lock still guards consistent data. Fallible operations surface poisoning as a
//! [`QueueError::Synchronisation`] so producers learn about it; infallible queries (sizes,
//! state checks) and the worker threads recover the guard and carry on.

use crate::queue::error::{QueueError, QueueResult};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Length of one wait slice when a timeout is too large to form a deadline
pub const UNBOUNDED_WAIT_SLICE: Duration = Duration::from_secs(3600);

/// Lock a mutex, converting poisoning into a queue error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use queueset::core::sync::lock_or_error;
///
/// let shard = Mutex::new(vec![1, 2, 3]);
/// let guard = lock_or_error(&shard, "shard").unwrap();
/// assert_eq!(guard.len(), 3);
/// ```
pub fn lock_or_error<'a, T>(mutex: &'a Mutex<T>, what: &str) -> QueueResult<MutexGuard<'a, T>> {
    mutex.lock().map_err(|poison_err| QueueError::Synchronisation {
        message: format!(
            "{} lock poisoned; a thread panicked while holding it. PoisonError: {:?}",
            what, poison_err
        ),
    })
}

/// Lock a mutex, recovering the guard if a previous holder panicked
pub fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("Recovering poisoned lock");
        poisoned.into_inner()
    })
}

/// Wait on a condition variable for at most `timeout`, recovering from poisoning
///
/// Returns the re-acquired guard and `true` when the wait timed out.
pub fn wait_timeout_recover<'a, T>(
    condvar: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: Duration,
) -> (MutexGuard<'a, T>, bool) {
    let (guard, result) = condvar
        .wait_timeout(guard, timeout)
        .unwrap_or_else(PoisonError::into_inner);
    (guard, result.timed_out())
}

/// The instant `timeout` from now, or `None` when it is past what `Instant` can hold
pub fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Time remaining before `deadline`; `None` once it has passed
///
/// A missing deadline never expires and yields [`UNBOUNDED_WAIT_SLICE`] each time.
pub fn time_left(deadline: Option<Instant>) -> Option<Duration> {
    match deadline {
        Some(deadline) => deadline
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero()),
        None => Some(UNBOUNDED_WAIT_SLICE),
    }
}
