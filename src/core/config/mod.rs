//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! modweave has two configuration scopes:
//! - **Global**: User-level settings
//! - **Project**: Host-level overrides, next to the host descriptor
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Project config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$MODWEAVE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/modweave/config.toml`
//! 3. `~/.modweave/config.toml`
//!
//! # Project Config Locations
//!
//! Searched in order:
//! 1. `<host dir>/modweave.toml` (canonical)
//! 2. `<host dir>/.modweave.toml` (compatibility, warns)
//!
//! # Example
//!
//! ```no_run
//! use modweave::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/host"))).unwrap();
//! let config = result.config;
//!
//! println!("Staging into: {}", config.staging_dir());
//! println!("Install command: {}", config.install_command());
//! ```

pub mod schema;

pub use schema::{EventErrorPolicy, GlobalConfig, HookConfig, MergePolicy, ProjectConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::paths::DEFAULT_STAGING_DIR;

/// Canonical project config file name.
pub const PROJECT_CONFIG_FILE: &str = "modweave.toml";

/// Environment variable naming an explicit global config file.
pub const CONFIG_ENV_VAR: &str = "MODWEAVE_CONFIG";

const DEFAULT_SCRIPT_PREFIX: &str = "mw-";
const DEFAULT_INSTALL_COMMAND: &str = "npm install";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence rules automatically. Project config
/// overrides global config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Project configuration (if the host has one)
    pub project: Option<ProjectConfig>,
    global_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `host_dir` is provided, also loads the project config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or
    /// fail validation. Missing config files are not an error.
    pub fn load(host_dir: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        Self::load_with_global(Self::find_global().as_deref(), host_dir)
    }

    /// Load configuration with an explicit global config file.
    pub fn load_with_global(
        global_file: Option<&Path>,
        host_dir: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let global: GlobalConfig = match global_file {
            Some(path) => read_toml(path)?,
            None => GlobalConfig::default(),
        };

        let (project, project_path) = match host_dir {
            Some(dir) => Self::load_project(dir, &mut warnings)?,
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                project,
                global_path: global_file.map(Path::to_path_buf),
                project_path,
            },
            warnings,
        })
    }

    /// Locate the global config file, if any exists.
    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("modweave/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".modweave/config.toml"))
            .filter(|path| path.exists())
    }

    fn load_project(
        host_dir: &Path,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<(Option<ProjectConfig>, Option<PathBuf>), ConfigError> {
        let canonical = Self::project_config_path(host_dir);
        if canonical.exists() {
            let config = read_toml(&canonical)?;
            return Ok((Some(config), Some(canonical)));
        }

        let compat = host_dir.join(".modweave.toml");
        if compat.exists() {
            warnings.push(ConfigWarning {
                message: format!(
                    "Using deprecated config location. Please rename to '{}'",
                    canonical.display()
                ),
                path: compat.clone(),
            });
            let config = read_toml(&compat)?;
            return Ok((Some(config), Some(compat)));
        }

        Ok((None, None))
    }

    /// Canonical project config path for a host directory.
    pub fn project_config_path(host_dir: &Path) -> PathBuf {
        host_dir.join(PROJECT_CONFIG_FILE)
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Staging directory name. Defaults to `.modweave`.
    pub fn staging_dir(&self) -> &str {
        self.project
            .as_ref()
            .and_then(|p| p.staging_dir.as_deref())
            .unwrap_or(DEFAULT_STAGING_DIR)
    }

    /// Prefix of module scripts merged into the host. Defaults to `mw-`.
    pub fn script_prefix(&self) -> &str {
        self.project
            .as_ref()
            .and_then(|p| p.script_prefix.as_deref())
            .unwrap_or(DEFAULT_SCRIPT_PREFIX)
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.project
            .as_ref()
            .and_then(|p| p.merge_policy)
            .unwrap_or_default()
    }

    pub fn event_errors(&self) -> EventErrorPolicy {
        self.project
            .as_ref()
            .and_then(|p| p.event_errors)
            .unwrap_or_default()
    }

    /// Package install command. Project overrides global; defaults to
    /// `npm install`.
    pub fn install_command(&self) -> &str {
        self.project
            .as_ref()
            .and_then(|p| p.install_command.as_deref())
            .or(self.global.install_command.as_deref())
            .unwrap_or(DEFAULT_INSTALL_COMMAND)
    }

    /// Whether the install step is skipped. Defaults to `false`.
    pub fn skip_install(&self) -> bool {
        self.project
            .as_ref()
            .and_then(|p| p.skip_install)
            .or(self.global.skip_install)
            .unwrap_or(false)
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.global.log_filter.as_deref()
    }

    /// Configured event hooks, in declaration order.
    pub fn hooks(&self) -> &[HookConfig] {
        self.project
            .as_ref()
            .map(|p| p.hooks.as_slice())
            .unwrap_or_default()
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded project config file.
    pub fn project_config_loaded_from(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
