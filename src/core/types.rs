//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ModuleName`] - Validated module name, usable as a single path component
//! - [`ModuleId`] - Arena index of a node inside a resolved module graph
//! - [`Fingerprint`] - Content hash of a staging tree for idempotence checks
//! - [`LifecycleEvent`] - Named events triggered by the staging pipeline
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use modweave::core::types::ModuleName;
//!
//! let name = ModuleName::new("shared-ui").unwrap();
//! assert_eq!(name.as_str(), "shared-ui");
//!
//! assert!(ModuleName::new("../escape").is_err());
//! assert!(ModuleName::new("").is_err());
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid module name: {0}")]
    InvalidModuleName(String),
}

/// A validated module name.
///
/// Module names become link names inside the staging tree, so they must be
/// a single, portable path component:
/// - Cannot be empty
/// - Cannot start with `.`
/// - Cannot contain `/`, `\`, `:`, whitespace or ASCII control characters
///
/// # Example
///
/// ```
/// use modweave::core::types::ModuleName;
///
/// assert!(ModuleName::new("core").is_ok());
/// assert!(ModuleName::new("feature_x2").is_ok());
/// assert!(ModuleName::new(".hidden").is_err());
/// assert!(ModuleName::new("a/b").is_err());
/// assert!(ModuleName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleName(String);

impl ModuleName {
    /// Create a new validated module name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidModuleName` if the name cannot be used as a
    /// staging link name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidModuleName(
                "module name cannot be empty".into(),
            ));
        }

        if name.starts_with('.') {
            return Err(TypeError::InvalidModuleName(format!(
                "module name cannot start with '.': {name}"
            )));
        }

        const INVALID_CHARS: [char; 3] = ['/', '\\', ':'];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidModuleName(format!(
                    "module name cannot contain '{c}': {name}"
                )));
            }
        }

        if name
            .chars()
            .any(|c| c.is_whitespace() || c.is_ascii_control())
        {
            return Err(TypeError::InvalidModuleName(format!(
                "module name cannot contain whitespace or control characters: {name:?}"
            )));
        }

        Ok(())
    }

    /// Get the module name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModuleName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModuleName> for String {
    fn from(name: ModuleName) -> Self {
        name.0
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a node in a [`crate::core::graph::ModuleGraph`].
///
/// Ids are only meaningful for the graph that produced them. The host is
/// always [`ModuleId::HOST`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub(crate) usize);

impl ModuleId {
    /// The root node of every graph.
    pub const HOST: ModuleId = ModuleId(0);

    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A staging tree fingerprint.
///
/// The fingerprint is a SHA-256 hash over every entry below a directory:
/// relative path, entry kind, and either the file contents or the link
/// target. Two staging runs over identical descriptors produce the same
/// fingerprint, independent of timestamps.
///
/// # Example
///
/// ```
/// use modweave::core::types::Fingerprint;
///
/// let dir = tempfile::TempDir::new().unwrap();
/// std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
///
/// let fp = Fingerprint::of_tree(dir.path(), &[]).unwrap();
/// let fp2 = Fingerprint::of_tree(dir.path(), &[]).unwrap();
/// assert_eq!(fp, fp2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of the tree rooted at `root`.
    ///
    /// Directory names listed in `skip` are ignored at any depth. Symlinks
    /// are never followed.
    pub fn of_tree(root: &Path, skip: &[&str]) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        if root.exists() {
            hash_dir(root, Path::new(""), skip, &mut hasher)?;
        }
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn hash_dir(dir: &Path, rel: &Path, skip: &[&str], hasher: &mut Sha256) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        let rel_path = rel.join(&name);
        let meta = fs::symlink_metadata(entry.path())?;
        let file_type = meta.file_type();

        if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            hasher.update(b"L\0");
            hasher.update(rel_path.to_string_lossy().as_bytes());
            hasher.update(b"\0");
            hasher.update(target.to_string_lossy().as_bytes());
            hasher.update(b"\n");
        } else if file_type.is_dir() {
            if skip.iter().any(|s| name.to_string_lossy() == *s) {
                continue;
            }
            hasher.update(b"D\0");
            hasher.update(rel_path.to_string_lossy().as_bytes());
            hasher.update(b"\n");
            hash_dir(&entry.path(), &rel_path, skip, hasher)?;
        } else {
            hasher.update(b"F\0");
            hasher.update(rel_path.to_string_lossy().as_bytes());
            hasher.update(b"\0");
            hasher.update(fs::read(entry.path())?);
            hasher.update(b"\n");
        }
    }

    Ok(())
}

/// Events triggered by the staging pipeline, one per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEvent {
    PreinstallExecuted,
    StagingCleaned,
    SymlinksCreated,
    RegistryGenerated,
    StylesReferenced,
    AssetsLinked,
    DependenciesMerged,
    ScriptsCollected,
    IndexHtmlGenerated,
    GitignoreAdjusted,
    PackagesInstalled,
    EnvScaffolded,
    PostinstallExecuted,
}

impl LifecycleEvent {
    /// All events, in pipeline order.
    pub const ALL: [LifecycleEvent; 13] = [
        LifecycleEvent::PreinstallExecuted,
        LifecycleEvent::StagingCleaned,
        LifecycleEvent::SymlinksCreated,
        LifecycleEvent::RegistryGenerated,
        LifecycleEvent::StylesReferenced,
        LifecycleEvent::AssetsLinked,
        LifecycleEvent::DependenciesMerged,
        LifecycleEvent::ScriptsCollected,
        LifecycleEvent::IndexHtmlGenerated,
        LifecycleEvent::GitignoreAdjusted,
        LifecycleEvent::PackagesInstalled,
        LifecycleEvent::EnvScaffolded,
        LifecycleEvent::PostinstallExecuted,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LifecycleEvent::PreinstallExecuted => "PREINSTALL_EXECUTED",
            LifecycleEvent::StagingCleaned => "STAGING_CLEANED",
            LifecycleEvent::SymlinksCreated => "SYMLINKS_CREATED",
            LifecycleEvent::RegistryGenerated => "REGISTRY_GENERATED",
            LifecycleEvent::StylesReferenced => "STYLES_REFERENCED",
            LifecycleEvent::AssetsLinked => "ASSETS_LINKED",
            LifecycleEvent::DependenciesMerged => "DEPENDENCIES_MERGED",
            LifecycleEvent::ScriptsCollected => "SCRIPTS_COLLECTED",
            LifecycleEvent::IndexHtmlGenerated => "INDEX_HTML_GENERATED",
            LifecycleEvent::GitignoreAdjusted => "GITIGNORE_ADJUSTED",
            LifecycleEvent::PackagesInstalled => "PACKAGES_INSTALLED",
            LifecycleEvent::EnvScaffolded => "ENV_SCAFFOLDED",
            LifecycleEvent::PostinstallExecuted => "POSTINSTALL_EXECUTED",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod module_name {
        use super::*;

        #[test]
        fn accepts_common_names() {
            for name in ["core", "shared-ui", "feature_x", "Dashboard2", "a.b"] {
                assert!(ModuleName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn rejects_path_like_names() {
            for name in ["", ".", "..", ".hidden", "a/b", "a\\b", "c:d", "x y", "tab\t"] {
                assert!(ModuleName::new(name).is_err(), "{name:?} should be invalid");
            }
        }

        #[test]
        fn ordering_is_lexicographic() {
            let a = ModuleName::new("alpha").unwrap();
            let b = ModuleName::new("beta").unwrap();
            assert!(a < b);
        }

        #[test]
        fn serde_roundtrip_validates() {
            let parsed: Result<ModuleName, _> = serde_json::from_str("\"../x\"");
            assert!(parsed.is_err());

            let parsed: ModuleName = serde_json::from_str("\"core\"").unwrap();
            assert_eq!(parsed.as_str(), "core");
        }
    }

    mod fingerprint {
        use super::*;
        use tempfile::TempDir;

        #[test]
        fn missing_root_hashes_as_empty() {
            let dir = TempDir::new().unwrap();
            let missing = dir.path().join("nope");
            let empty = dir.path().join("empty");
            fs::create_dir(&empty).unwrap();

            assert_eq!(
                Fingerprint::of_tree(&missing, &[]).unwrap(),
                Fingerprint::of_tree(&empty, &[]).unwrap()
            );
        }

        #[test]
        fn content_change_changes_fingerprint() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("a.txt"), "one").unwrap();
            let before = Fingerprint::of_tree(dir.path(), &[]).unwrap();

            fs::write(dir.path().join("a.txt"), "two").unwrap();
            let after = Fingerprint::of_tree(dir.path(), &[]).unwrap();

            assert_ne!(before, after);
        }

        #[test]
        fn skipped_directories_are_ignored() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("a.txt"), "one").unwrap();
            let before = Fingerprint::of_tree(dir.path(), &["node_modules"]).unwrap();

            fs::create_dir(dir.path().join("node_modules")).unwrap();
            fs::write(dir.path().join("node_modules/x.js"), "x").unwrap();
            let after = Fingerprint::of_tree(dir.path(), &["node_modules"]).unwrap();

            assert_eq!(before, after);
        }

        #[test]
        fn hex_encoded_sha256() {
            let dir = TempDir::new().unwrap();
            let fp = Fingerprint::of_tree(dir.path(), &[]).unwrap();
            assert_eq!(fp.as_str().len(), 64);
            assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
