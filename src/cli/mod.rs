//! cli
//!
//! Command-line interface layer for modweave.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and initialise logging
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`] for resolution and staging. Handlers only format output.

pub mod args;
pub mod commands;

pub use args::{Cli, Command, Shell};

use crate::engine;
use crate::logging;
use crate::ui::output::{self, Verbosity};
use anyhow::{Context as _, Result};

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let ctx = engine::Context {
        cwd: cli.cwd.clone(),
        host: cli.host.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };

    // Completion output must not depend on a readable host configuration.
    if let Command::Completion { shell } = cli.command {
        return commands::completion(shell);
    }

    let loaded = engine::load_config(&ctx).context("Failed to load configuration")?;
    logging::init_logging(loaded.config.log_filter(), ctx.debug);

    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let config = &loaded.config;
    for (scope, path) in [
        ("global", config.global_config_loaded_from()),
        ("project", config.project_config_loaded_from()),
    ] {
        if let Some(path) = path {
            output::debug(
                format!("Loaded {} config from {}", scope, path.display()),
                verbosity,
            );
        }
    }
    for warning in &loaded.warnings {
        output::warn(
            format!("{} ({})", warning.message, warning.path.display()),
            verbosity,
        );
    }

    commands::dispatch(cli.command, &ctx, &loaded.config)
}
