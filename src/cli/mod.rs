// src/cli/mod.rs
pub mod args;
pub mod handlers;

pub use args::Cli;

use anyhow::Result;

use crate::exit::NetsieveExit;
use args::Commands;

/// Runs one parsed command line.
///
/// # Errors
/// Propagates the handler's error.
pub fn execute(cli: &Cli) -> Result<NetsieveExit> {
    let config = cli.config.as_deref();
    match &cli.command {
        Commands::Scan(args) => handlers::handle_scan(args, cli.format, config),
        Commands::Inspect { file } => handlers::handle_inspect(file, cli.format, config),
    }
}
