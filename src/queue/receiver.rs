//! Batch processing contract for queue set workers
//!
//! A [`QueueSetListener`](crate::queue::QueueSetListener) builds one receiver per worker
//! thread, on that thread, through a factory closure. Receivers may therefore keep per-shard
//! state in plain fields and do not need to be `Send`.

use crate::queue::error::QueueResult;

/// Processing logic invoked with each batch polled from a shard
///
/// # Example
///
/// ```rust
/// use queueset::queue::{QueueError, QueueResult, Receiver};
///
/// struct LineCounter {
///     lines: usize,
/// }
///
/// impl Receiver<String> for LineCounter {
///     fn receive(&mut self, batch: Vec<String>) -> QueueResult<usize> {
///         if batch.iter().any(|line| line.is_empty()) {
///             return Err(QueueError::processing("empty line in batch"));
///         }
///         self.lines += batch.len();
///         Ok(batch.len())
///     }
/// }
/// ```
pub trait Receiver<T> {
    /// Process `batch` and return how many of its items succeeded
    ///
    /// The count should lie in `0..=batch.len()`; larger values are clamped by the listener.
    /// Returning an error (or panicking) marks the whole batch as unsuccessful; the worker
    /// keeps running either way.
    fn receive(&mut self, batch: Vec<T>) -> QueueResult<usize>;

    /// Name used in progress summaries
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

impl<T, F> Receiver<T> for F
where
    F: FnMut(Vec<T>) -> QueueResult<usize>,
{
    fn receive(&mut self, batch: Vec<T>) -> QueueResult<usize> {
        self(batch)
    }
}

/// Produces a fresh receiver for each worker thread
pub type ReceiverFactory<T> = std::sync::Arc<dyn Fn() -> Box<dyn Receiver<T>> + Send + Sync>;

/// Wrap a typed constructor into a [`ReceiverFactory`]
pub fn receiver_factory<T, R, F>(make: F) -> ReceiverFactory<T>
where
    T: 'static,
    R: Receiver<T> + 'static,
    F: Fn() -> R + Send + Sync + 'static,
{
    std::sync::Arc::new(move || Box::new(make()) as Box<dyn Receiver<T>>)
}
