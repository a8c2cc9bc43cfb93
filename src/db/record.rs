//! The capability contract a record type supplies to the store.

use thiserror::Error;

/// Suffix applied to every file the store writes.
pub const DB_FILE_SUFFIX: &str = "ddps";

/// Error produced by a record type's [`DiskRecord::deserialize`].
///
/// Carries only a message; the loader wraps it with the offending path and
/// raw file content before surfacing it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DecodeFailure {
    message: String,
}

impl DecodeFailure {
    /// Creates a decode failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A value the record store can persist.
///
/// The store is type-parametric over this contract and inspects nothing
/// else: a record is an identity slot plus an opaque text codec.
///
/// # Contract
///
/// - `index() == 0` means "not yet assigned"; the store writes the slot via
///   `set_index` on first persistence and treats it as immutable afterwards.
/// - `serialize` must produce text with no embedded raw newline, so
///   line-oriented consumers of the surrounding protocol stay intact.
/// - `deserialize` must be a left inverse of `serialize`:
///   `deserialize(&r.serialize()) == Ok(r)` for every valid record `r`.
///   Crash recovery rebuilds the cache purely from serialized files, so this
///   round-trip law is load-bearing, not a convention.
pub trait DiskRecord: Clone + Send + 'static {
    /// The record's identity within its domain; 0 when unassigned.
    fn index(&self) -> u64;

    /// Writes the identity slot.
    fn set_index(&mut self, index: u64);

    /// Converts the record to its transportable text representation.
    fn serialize(&self) -> String;

    /// Reconstructs a record from its serialized text.
    fn deserialize(text: &str) -> Result<Self, DecodeFailure>;
}
