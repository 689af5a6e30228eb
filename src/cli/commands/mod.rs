//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine to execute the command
//! 3. Formats and displays output
//!
//! Handlers do NOT touch the staging tree directly.

mod clean;
mod completion;
mod graph;
mod install;

// Re-export command functions for testing and direct invocation
pub use clean::clean;
pub use completion::completion;
pub use graph::graph;
pub use install::install;

use crate::cli::args::Command;
use crate::core::config::Config;
use crate::engine::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context, config: &Config) -> Result<()> {
    match command {
        Command::Install { skip_install } => install::install(ctx, config, skip_install),
        Command::Graph { json } => graph::graph(ctx, json),
        Command::Clean => clean::clean(ctx, config),
        Command::Completion { shell } => completion::completion(shell),
    }
}
