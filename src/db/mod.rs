//! Flat-file record persistence for shaledb
//!
//! One [`RecordStore`] owns one domain directory: an in-memory cache of
//! records, a monotonic identity counter, and a serialized action queue that
//! is the only code path allowed to touch that directory's files.
//!
//! # Design principles
//!
//! - In-memory mutation is synchronous; disk catches up behind the queue
//! - One file per record, named by its index (`{dir}/{index}.ddps`)
//! - Records are opaque text; the store never inspects field values
//! - Decode failures on load are fatal, never silently dropped
//! - A caller's non-error return means "accepted", not "durable"

mod errors;
mod loader;
mod record;
mod store;

pub use errors::{DbError, DbResult};
pub use record::{DecodeFailure, DiskRecord, DB_FILE_SUFFIX};
pub use store::RecordStore;
