//! CLI module for shaledb
//!
//! Commands:
//! - init: write a default config file and create the data directory
//! - serve: boot the socket server and serve until interrupted

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{init, serve};
pub use errors::{CliError, CliResult};

/// Parse arguments and dispatch to the matching command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match cli.command {
        Command::Init { config } => init(&config),
        Command::Serve { config } => serve(&config),
    }
}
