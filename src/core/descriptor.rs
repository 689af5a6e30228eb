//! core::descriptor
//!
//! Host and module descriptor files.
//!
//! # Files
//!
//! - `modweave-host.json` - one per host; lists module references and
//!   host-level options (base href, title, head content, compiler options)
//! - `modweave-module.json` - declares one or more modules living in the
//!   same directory, each with its own references to further modules
//!
//! A module's package manifest is the `package.json` next to its descriptor.
//!
//! # References
//!
//! A [`ModuleReference`] names a descriptor by path, relative to the
//! directory of the descriptor that declares it, and binds one or more of
//! the modules declared there. The path may point at the descriptor file
//! itself or at its directory.
//!
//! # Example
//!
//! ```json
//! {
//!   "modules": [
//!     { "path": "../shared", "names": ["core", "ui"] }
//!   ],
//!   "title": "Dashboard",
//!   "htmlHeadContent": ["<link rel=\"icon\" href=\"favicon.ico\">"]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// File name of a host descriptor.
pub const HOST_DESCRIPTOR_FILE: &str = "modweave-host.json";

/// File name of a module descriptor.
pub const MODULE_DESCRIPTOR_FILE: &str = "modweave-module.json";

/// File name of a package manifest.
pub const PACKAGE_MANIFEST_FILE: &str = "package.json";

/// Errors from descriptor loading.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse descriptor '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("module '{name}' is not declared in '{path}'")]
    ModuleNotDeclared { name: String, path: PathBuf },

    #[error("invalid descriptor '{path}': {message}")]
    Invalid { path: PathBuf, message: String },
}

/// A single value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

/// A reference to modules declared in another descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleReference {
    /// Descriptor path (file or directory), relative to the declaring descriptor.
    pub path: PathBuf,
    /// Module names to bind from that descriptor.
    pub names: Vec<String>,
}

impl ModuleReference {
    /// Absolute path of the referenced descriptor file.
    pub fn descriptor_path(&self, declaring_dir: &Path) -> PathBuf {
        let joined = super::paths::normalize_path(&declaring_dir.join(&self.path));
        let names_file = joined.extension().is_some_and(|ext| ext == "json");
        if joined.is_dir() || !names_file {
            joined.join(MODULE_DESCRIPTOR_FILE)
        } else {
            joined
        }
    }
}

/// Parsed `modweave-host.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostDescriptor {
    /// Host name; defaults to the host directory name.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub modules: Vec<ModuleReference>,

    #[serde(default)]
    pub base_href: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub html_head_content: OneOrMany<String>,

    /// Ahead-of-time compilation toggle; defaults to `true`.
    #[serde(default)]
    pub aot: Option<bool>,

    #[serde(default)]
    pub compiler_options: serde_json::Map<String, serde_json::Value>,
}

impl HostDescriptor {
    /// Load a host descriptor.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        read_json(path)
    }
}

/// Parsed `modweave-module.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleDescriptorFile {
    #[serde(default)]
    pub modules: Vec<ModuleDefinition>,
}

impl ModuleDescriptorFile {
    /// Load a module descriptor.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let file: Self = read_json(path)?;

        let mut seen = std::collections::BTreeSet::new();
        for module in &file.modules {
            if !seen.insert(module.name.as_str()) {
                return Err(DescriptorError::Invalid {
                    path: path.to_path_buf(),
                    message: format!("module '{}' is declared more than once", module.name),
                });
            }
        }

        Ok(file)
    }

    /// Take the definition of `name`.
    pub fn take(&mut self, name: &str, path: &Path) -> Result<ModuleDefinition, DescriptorError> {
        let pos = self
            .modules
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| DescriptorError::ModuleNotDeclared {
                name: name.to_string(),
                path: path.to_path_buf(),
            })?;
        Ok(self.modules.swap_remove(pos))
    }
}

/// One module inside a module descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDefinition {
    pub name: String,

    /// Publishing scope, without the leading `@`.
    #[serde(default)]
    pub package_name: Option<String>,

    #[serde(default)]
    pub is_entry: bool,

    #[serde(default)]
    pub precompiled: bool,

    /// Source root relative to the descriptor directory.
    #[serde(default)]
    pub src_path: Option<PathBuf>,

    #[serde(default)]
    pub assets_path: OneOrMany<PathBuf>,

    #[serde(default)]
    pub styles_path: Option<PathBuf>,

    #[serde(default)]
    pub excluded_packages: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<ModuleReference>,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, DescriptorError> {
    let contents = fs::read_to_string(path).map_err(|e| DescriptorError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&contents).map_err(|e| DescriptorError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
