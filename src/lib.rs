//! shaledb - a small self-hostable web stack with flat-file record persistence
//!
//! The load-bearing piece is [`db`]: a per-domain, disk-backed record store
//! whose every disk mutation goes through [`queue`], a serialized action
//! queue with one worker per domain. [`web`] is the raw socket boundary the
//! stack talks through.

pub mod cli;
pub mod config;
pub mod db;
pub mod observability;
pub mod queue;
pub mod web;
