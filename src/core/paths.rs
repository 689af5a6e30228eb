//! core::paths
//!
//! Centralized path routing for the staging tree.
//!
//! **Hard rule:** no code outside this module computes paths below the
//! staging root. Every step asks [`StagingPaths`] where its output lives.
//!
//! # Staging Layout
//!
//! All generated output lives under `<host dir>/<staging dir>/`:
//! - `dependencies/<module>` - link to each source-linked module's source root
//! - `precompiled/<module>` - link to each precompiled module's base path
//! - `modules.json` - generated module registry
//! - `package.json` - merged package manifest
//! - `compiler-options.json` - host compiler option overrides
//! - `src/styles.scss` - generated style entry
//! - `src/index.html` - generated document shell
//! - `src/assets/<module>/` - per-module asset links
//!
//! Outside the staging root:
//! - `<host dir>/<staging dir>.lock` - exclusive lock held during composition
//! - `<host dir>/env/` - environment scaffolding (created once, never cleaned)
//!
//! # Example
//!
//! ```
//! use modweave::core::paths::StagingPaths;
//! use std::path::PathBuf;
//!
//! let paths = StagingPaths::new(PathBuf::from("/work/host"), ".modweave");
//!
//! assert_eq!(paths.root(), PathBuf::from("/work/host/.modweave"));
//! assert_eq!(
//!     paths.styles_entry(),
//!     PathBuf::from("/work/host/.modweave/src/styles.scss")
//! );
//! ```

use std::path::{Component, Path, PathBuf};

use crate::core::types::ModuleName;

/// Default staging directory name.
pub const DEFAULT_STAGING_DIR: &str = ".modweave";

/// Directory excluded from staging fingerprints.
pub const INSTALL_DIR: &str = "node_modules";

/// Centralized path routing for a host's staging tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingPaths {
    host_dir: PathBuf,
    staging_dir: String,
}

impl StagingPaths {
    /// Create routing for `host_dir` with the given staging directory name.
    pub fn new(host_dir: PathBuf, staging_dir: impl Into<String>) -> Self {
        Self {
            host_dir,
            staging_dir: staging_dir.into(),
        }
    }

    /// The host directory (where the host descriptor lives).
    pub fn host_dir(&self) -> &Path {
        &self.host_dir
    }

    /// The staging directory name.
    pub fn staging_dir_name(&self) -> &str {
        &self.staging_dir
    }

    /// Root of the staging tree.
    pub fn root(&self) -> PathBuf {
        self.host_dir.join(&self.staging_dir)
    }

    /// Lock file guarding the staging tree.
    ///
    /// Lives beside the root so that cleaning the root never removes it.
    pub fn lock_path(&self) -> PathBuf {
        self.host_dir.join(format!("{}.lock", self.staging_dir))
    }

    // =========================================================================
    // Module links
    // =========================================================================

    pub fn dependencies_dir(&self) -> PathBuf {
        self.root().join("dependencies")
    }

    pub fn dependency_link(&self, module: &ModuleName) -> PathBuf {
        self.dependencies_dir().join(module.as_str())
    }

    pub fn precompiled_dir(&self) -> PathBuf {
        self.root().join("precompiled")
    }

    pub fn precompiled_link(&self, module: &ModuleName) -> PathBuf {
        self.precompiled_dir().join(module.as_str())
    }

    // =========================================================================
    // Generated files
    // =========================================================================

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join("package.json")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root().join("modules.json")
    }

    pub fn compiler_options_path(&self) -> PathBuf {
        self.root().join("compiler-options.json")
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root().join("src")
    }

    pub fn styles_entry(&self) -> PathBuf {
        self.src_dir().join("styles.scss")
    }

    pub fn index_html(&self) -> PathBuf {
        self.src_dir().join("index.html")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.src_dir().join("assets")
    }

    pub fn module_assets_dir(&self, module: &ModuleName) -> PathBuf {
        self.assets_dir().join(module.as_str())
    }

    /// Dependency link directory as seen from `src/`, for style imports.
    pub fn dependencies_from_src(&self) -> PathBuf {
        PathBuf::from("..").join("dependencies")
    }

    // =========================================================================
    // Host-level scaffolding (outside the staging root)
    // =========================================================================

    pub fn gitignore_path(&self) -> PathBuf {
        self.host_dir.join(".gitignore")
    }

    pub fn env_dir(&self) -> PathBuf {
        self.host_dir.join("env")
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component where possible. Does not touch the filesystem.
///
/// ```
/// use modweave::core::paths::normalize_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     normalize_path(Path::new("/a/b/../c/./d")),
///     PathBuf::from("/a/c/d")
/// );
/// assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
/// ```
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !matches!(
                    out.components().next_back(),
                    Some(Component::RootDir | Component::Prefix(_))
                ) {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Express `path` relative to `base`, lexically.
///
/// Returns `None` when `path` is not below `base`.
///
/// ```
/// use modweave::core::paths::relative_to;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     relative_to(Path::new("src/styles/main.scss"), Path::new("src")),
///     Some(PathBuf::from("styles/main.scss"))
/// );
/// assert_eq!(relative_to(Path::new("lib/x.scss"), Path::new("src")), None);
/// ```
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    normalize_path(path)
        .strip_prefix(normalize_path(base))
        .ok()
        .map(Path::to_path_buf)
}

/// Render a relative path with forward slashes, as used in generated files.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
