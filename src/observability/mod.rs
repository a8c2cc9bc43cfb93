//! Observability for shaledb
//!
//! A deliberately small logging surface:
//! - Structured logs (JSON), one line per event
//! - Deterministic key ordering
//! - Explicit severity levels
//! - Synchronous, no buffering, no background threads
//!
//! The record store's queue worker reports swallowed background failures
//! through this module; that is the only place those failures surface, so
//! the output format stays machine-greppable.

mod logger;

pub use logger::{Logger, Severity};
