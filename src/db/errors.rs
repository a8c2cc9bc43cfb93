//! Record store error types
//!
//! These are the synchronously surfaced failures. Failures inside queued
//! disk actions (missing file on update, I/O error on delete or write) are
//! caught in the queue worker and logged, never returned here — the caller
//! has already moved on by the time they happen.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::queue::QueueError;

/// Result type for record store operations
pub type DbResult<T> = Result<T, DbError>;

/// Record store errors
#[derive(Debug, Error)]
pub enum DbError {
    /// `update` was called for an index with no cache entry. Fatal to that
    /// call; nothing is enqueued and disk is untouched.
    #[error("No record with index {index} exists in this domain")]
    NotFound { index: u64 },

    /// A persisted file's content could not be deserialized. Fatal during
    /// load: on-disk corruption is for the operator to investigate, so the
    /// offending path and raw content ride along.
    #[error("Failed to decode {}: {message} (raw content: {content:?})", .path.display())]
    Decode {
        path: PathBuf,
        content: String,
        message: String,
    },

    /// Disk or directory access failed on the caller's thread.
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    /// The store was stopped; its queue accepts no further work.
    #[error(transparent)]
    Queue(#[from] QueueError),
}
