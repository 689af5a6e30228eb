//! engine
//!
//! Composes a resolved module graph into the host's staging tree.
//!
//! # Architecture
//!
//! The engine sits between the CLI and the domain types in [`crate::core`]:
//!
//! 1. **Resolve**: load the host descriptor and build the [`ModuleGraph`]
//! 2. **Stage**: run the [`stage::Orchestrator`] pipeline over the graph
//!
//! ```text
//! host descriptor -> Resolver -> ModuleGraph -> Orchestrator -> staging tree
//!                                                    |
//!                                                EventBus -> subscribers, hooks
//! ```
//!
//! All process spawning goes through [`exec::CommandRunner`]; the CLI uses
//! [`exec::ShellRunner`], tests substitute a recording runner.
//!
//! # Example
//!
//! ```no_run
//! use modweave::core::config::Config;
//! use modweave::engine::{self, Context};
//!
//! let ctx = Context::default();
//! let config = Config::default();
//! let (graph, report) = engine::compose(&ctx, &config, false)?;
//! println!("{} modules staged in {}", graph.module_count(), report.staging_root.display());
//! # Ok::<(), engine::EngineError>(())
//! ```

pub mod events;
pub mod exec;
pub mod merge;
pub mod scripts;
pub mod stage;

pub use events::{EventBus, EventError, EventPayload, LifecycleEvent};
pub use exec::{CommandRunner, CommandSpec, RunError, ShellRunner};
pub use merge::{merge_manifests, ConflictDecision, MergeReport};
pub use scripts::{collect_scripts, DuplicateScriptWarning, ScriptCollection};
pub use stage::{ComposeReport, Orchestrator, StageError, StageOptions, StagingStep};

use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::info;

use crate::core::config::{Config, ConfigError, ConfigLoadResult};
use crate::core::descriptor::HOST_DESCRIPTOR_FILE;
use crate::core::graph::{ModuleGraph, ResolveError, Resolver};
use crate::core::lock::StagingLock;
use crate::core::paths::{normalize_path, StagingPaths};

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Host descriptor file or directory, relative to the working directory.
    pub host: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

impl Context {
    /// The effective working directory.
    pub fn working_dir(&self) -> Result<PathBuf, EngineError> {
        let current = std::env::current_dir().map_err(EngineError::WorkingDir)?;
        Ok(match &self.cwd {
            Some(cwd) => normalize_path(&current.join(cwd)),
            None => current,
        })
    }

    /// Path of the host descriptor.
    ///
    /// `--host` may name the descriptor or the directory holding it.
    pub fn host_descriptor(&self) -> Result<PathBuf, EngineError> {
        let cwd = self.working_dir()?;
        let path = match &self.host {
            Some(host) => normalize_path(&cwd.join(host)),
            None => cwd,
        };
        Ok(if path.is_dir() {
            path.join(HOST_DESCRIPTOR_FILE)
        } else {
            path
        })
    }

    /// Directory holding the host descriptor.
    pub fn host_dir(&self) -> Result<PathBuf, EngineError> {
        let descriptor = self.host_descriptor()?;
        Ok(descriptor
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")))
    }
}

/// Errors from engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cannot determine working directory: {0}")]
    WorkingDir(io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("staging failed: {0}")]
    Stage(#[from] StageError),

    #[error("event setup failed: {0}")]
    Event(#[from] EventError),
}

/// Load tool configuration for the context's host.
pub fn load_config(ctx: &Context) -> Result<ConfigLoadResult, EngineError> {
    let host_dir = ctx.host_dir()?;
    Ok(Config::load(Some(host_dir.as_path()))?)
}

/// Resolve the module graph of the context's host.
pub fn resolve(ctx: &Context) -> Result<ModuleGraph, EngineError> {
    let descriptor = ctx.host_descriptor()?;
    info!(descriptor = %descriptor.display(), "resolving module graph");
    Ok(Resolver::resolve(&descriptor)?)
}

/// Resolve the host and run the full staging pipeline with the shell runner.
pub fn compose(
    ctx: &Context,
    config: &Config,
    skip_install: bool,
) -> Result<(ModuleGraph, ComposeReport), EngineError> {
    let graph = resolve(ctx)?;

    let mut options = StageOptions::from_config(config);
    options.skip_install |= skip_install;

    let report = compose_with(
        &graph,
        config,
        options,
        Rc::new(ShellRunner),
        EventBus::new(config.event_errors()),
    )?;
    Ok((graph, report))
}

/// Run the staging pipeline over an already resolved graph.
///
/// Hooks from `config` are subscribed to `bus` after any subscribers the
/// caller registered.
pub fn compose_with(
    graph: &ModuleGraph,
    config: &Config,
    options: StageOptions,
    runner: Rc<dyn CommandRunner>,
    mut bus: EventBus,
) -> Result<ComposeReport, EngineError> {
    let host_dir = graph.host().base_path.clone();
    bus.subscribe_hooks(config.hooks(), Rc::clone(&runner), &host_dir)?;

    let paths = StagingPaths::new(host_dir, config.staging_dir());
    let report = Orchestrator::new(graph, paths, options, runner.as_ref())
        .with_bus(bus)
        .run()?;
    Ok(report)
}

/// Remove the staging tree, install directory included.
///
/// Returns the removed root, or `None` if there was nothing to remove.
pub fn clean(ctx: &Context, config: &Config) -> Result<Option<PathBuf>, EngineError> {
    let paths = StagingPaths::new(ctx.host_dir()?, config.staging_dir());
    let root = paths.root();
    if !root.exists() {
        return Ok(None);
    }

    let _lock = StagingLock::acquire(&paths).map_err(StageError::from)?;
    stage::clean_staging(&paths, false)?;
    fs::remove_dir(&root).map_err(|source| StageError::Io {
        path: root.clone(),
        source,
    })?;
    info!(root = %root.display(), "removed staging tree");
    Ok(Some(root))
}
