//! install command - Resolve modules and rebuild the staging tree

use crate::core::config::Config;
use crate::engine::{self, Context};
use crate::ui::output::{self, Verbosity};
use anyhow::{Context as _, Result};

/// Resolve the host and run the staging pipeline.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `config` - Loaded configuration
/// * `skip_install` - Skip the package install step
pub fn install(ctx: &Context, config: &Config, skip_install: bool) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);

    let (graph, report) =
        engine::compose(ctx, config, skip_install).context("Failed to compose host")?;

    for step in &report.steps {
        output::debug(format!("done: {}", step), verbosity);
    }
    for warning in &report.scripts.warnings {
        output::warn(warning, verbosity);
    }
    for failure in &report.event_failures {
        output::warn(failure, verbosity);
    }
    for decision in report.merge.applied() {
        output::debug(
            format!(
                "{} {} -> {} (from {})",
                decision.package,
                decision.host_version.as_deref().unwrap_or("-"),
                decision.module_version,
                decision.module
            ),
            verbosity,
        );
    }

    if report.install_skipped {
        output::print("Package install skipped.", verbosity);
    }
    output::success(
        format!(
            "Staged {} module(s) in {}",
            graph.module_count(),
            report.staging_root.display()
        ),
        verbosity,
    );
    output::debug(format!("fingerprint {}", report.fingerprint), verbosity);

    Ok(())
}
