//! Serialized action queue
//!
//! A single-consumer task queue: producers enqueue named units of work, and
//! one dedicated worker thread drains and executes them strictly in
//! submission order. This is the ordering primitive the record store's
//! persistence design depends on: two writes enqueued A-then-B land on disk
//! in that order, and disk latency never blocks the enqueuing caller.
//!
//! # Failure isolation
//!
//! An action that fails is logged and does not halt the worker; subsequent
//! actions still execute. Callers of `enqueue` therefore get "accepted"
//! semantics, never "durably completed" semantics.

mod action_queue;
mod errors;

pub use action_queue::ActionQueue;
pub use errors::{QueueError, QueueResult};
