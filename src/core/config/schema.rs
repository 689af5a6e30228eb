//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$MODWEAVE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/modweave/config.toml`
//! 3. `~/.modweave/config.toml`
//!
//! # Project Config
//!
//! Located at `<host dir>/modweave.toml` (canonical).
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., hook events must name a known lifecycle event).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::LifecycleEvent;

/// How version conflicts between the host and a non-entry module resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// The module's version wins whenever it differs from the host's.
    #[default]
    Legacy,
    /// The module's version wins only when it is strictly newer.
    Newer,
}

/// What happens when an event subscriber fails.
///
/// Applied identically to every lifecycle event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventErrorPolicy {
    /// Log the failure and continue the pipeline.
    #[default]
    Warn,
    /// Abort the pipeline with the subscriber's error.
    Abort,
}

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// log_filter = "modweave=debug"
/// install_command = "pnpm install"
/// skip_install = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: Option<String>,

    /// Package install command
    pub install_command: Option<String>,

    /// Skip the package install step
    pub skip_install: Option<bool>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(cmd) = &self.install_command {
            if cmd.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "install_command cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Project configuration (per host).
///
/// # Example
///
/// ```toml
/// staging_dir = ".modweave"
/// script_prefix = "mw-"
/// merge_policy = "legacy"
/// event_errors = "warn"
///
/// [[hooks]]
/// event = "SYMLINKS_CREATED"
/// command = "./scripts/after-link.sh"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Staging directory name below the host directory
    pub staging_dir: Option<String>,

    /// Prefix marking module scripts that are merged into the host
    pub script_prefix: Option<String>,

    /// Version conflict policy
    pub merge_policy: Option<MergePolicy>,

    /// Event subscriber failure policy
    pub event_errors: Option<EventErrorPolicy>,

    /// Package install command (overrides global)
    pub install_command: Option<String>,

    /// Skip the package install step (overrides global)
    pub skip_install: Option<bool>,

    /// Shell commands subscribed to lifecycle events
    pub hooks: Vec<HookConfig>,
}

impl ProjectConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.staging_dir {
            let single_component = !dir.is_empty()
                && dir != "."
                && dir != ".."
                && !dir.contains(['/', '\\']);
            if !single_component {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid staging_dir '{}', must be a single directory name",
                    dir
                )));
            }
        }

        if let Some(prefix) = &self.script_prefix {
            if prefix.len() < 2 || !prefix.ends_with('-') {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid script_prefix '{}', must be non-empty and end with '-'",
                    prefix
                )));
            }
        }

        if let Some(cmd) = &self.install_command {
            if cmd.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "install_command cannot be empty".to_string(),
                ));
            }
        }

        for hook in &self.hooks {
            hook.validate()?;
        }

        Ok(())
    }
}

/// A shell command subscribed to one lifecycle event (or `*` for all).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    pub event: String,
    pub command: String,
}

impl HookConfig {
    /// Wildcard event name.
    pub const ALL_EVENTS: &'static str = "*";

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event != Self::ALL_EVENTS && LifecycleEvent::from_name(&self.event).is_none() {
            let valid: Vec<&str> = LifecycleEvent::ALL.iter().map(|e| e.name()).collect();
            return Err(ConfigError::InvalidValue(format!(
                "unknown hook event '{}', must be '*' or one of: {}",
                self.event,
                valid.join(", ")
            )));
        }
        if self.command.trim().is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "hook for '{}' has an empty command",
                self.event
            )));
        }
        Ok(())
    }
}
