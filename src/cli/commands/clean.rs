//! clean command - Remove the staging tree

use crate::core::config::Config;
use crate::engine::{self, Context};
use crate::ui::output::{self, Verbosity};
use anyhow::{Context as _, Result};

/// Remove the staging tree of the context's host.
pub fn clean(ctx: &Context, config: &Config) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);

    match engine::clean(ctx, config).context("Failed to clean staging tree")? {
        Some(root) => output::success(format!("Removed {}", root.display()), verbosity),
        None => output::print("Nothing to clean.", verbosity),
    }
    Ok(())
}
