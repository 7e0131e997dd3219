//! Fatal error reporting shared by the binary's error types
//!
//! Errors the operator can fix (bad flags, an invalid config file, a queue set with no usable
//! shards) are reported with their own message. Anything else is reported with the operation
//! that failed, and the full error goes to the debug log.

/// Errors that know whether their message is meant for the operator
///
/// When `is_user_actionable()` is true, `user_message()` must return `Some`; otherwise it
/// returns `None`.
pub trait ContextualError: std::error::Error {
    fn is_user_actionable(&self) -> bool;

    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error at the detail level that suits it
///
/// ```rust
/// use queueset::core::error_handling::log_error_with_context;
/// use queueset::queue::QueueError;
///
/// let err = QueueError::configuration("queue set has no usable shards");
/// log_error_with_context(&err, "Starting listener");
/// // FATAL: queue set has no usable shards
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

/// Message to show on stderr for a fatal error
pub fn fatal_message<E: ContextualError>(error: &E, operation_context: &str) -> String {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => user_msg.to_string(),
        _ => format!("{}: {}", operation_context, error),
    }
}
