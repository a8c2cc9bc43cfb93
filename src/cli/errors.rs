//! CLI-specific error types

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::db::DbError;

/// Result type for CLI commands
pub type CliResult<T> = Result<T, CliError>;

/// CLI errors — printed to stderr by main, exit code 1.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Refusing to overwrite existing config at {0}")]
    AlreadyInitialized(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}
