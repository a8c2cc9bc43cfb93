//! Action queue error types

use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors surfaced synchronously to queue callers.
///
/// Failures *inside* queued actions are deliberately not represented here:
/// they are caught in the worker, logged, and swallowed.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("Queue \"{0}\" is closed; no further actions are accepted")]
    Closed(String),
}
