//! core::manifest
//!
//! Package manifest (`package.json`) model.
//!
//! Only the three maps the composer touches are typed: `dependencies`,
//! `devDependencies` and `scripts`. Every other top-level field is carried
//! through untouched so that writing a manifest back does not lose data.
//!
//! Maps are ordered (`BTreeMap`), which keeps the written manifest stable
//! across runs.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name → version-range map.
pub type DependencyMap = BTreeMap<String, String>;

/// Name → command map.
pub type ScriptMap = BTreeMap<String, String>;

/// Errors from manifest operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read package manifest '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse package manifest '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to write package manifest '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize package manifest: {0}")]
    Serialize(String),
}

/// Which dependency map a package belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DependencyKind {
    Dependencies,
    DevDependencies,
}

impl DependencyKind {
    /// Both kinds, in merge order.
    pub const ALL: [DependencyKind; 2] = [
        DependencyKind::Dependencies,
        DependencyKind::DevDependencies,
    ];

    /// Manifest key for this map.
    pub fn key(self) -> &'static str {
        match self {
            DependencyKind::Dependencies => "dependencies",
            DependencyKind::DevDependencies => "devDependencies",
        }
    }
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A package manifest.
///
/// # Example
///
/// ```
/// use modweave::core::manifest::PackageManifest;
///
/// let manifest: PackageManifest = serde_json::from_str(r#"{
///     "name": "host",
///     "dependencies": { "rxjs": "^7.8.0" },
///     "private": true
/// }"#).unwrap();
///
/// assert_eq!(manifest.dependencies["rxjs"], "^7.8.0");
/// assert!(manifest.dev_dependencies.is_empty());
/// assert_eq!(manifest.extra["private"], serde_json::Value::Bool(true));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub dependencies: DependencyMap,

    #[serde(default)]
    pub dev_dependencies: DependencyMap,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: ScriptMap,

    /// Fields the composer does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageManifest {
    /// Load a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&contents).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load a manifest, treating a missing file as an empty manifest.
    pub fn load_or_default(path: &Path) -> Result<Self, ManifestError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Dependency map of the given kind.
    pub fn deps(&self, kind: DependencyKind) -> &DependencyMap {
        match kind {
            DependencyKind::Dependencies => &self.dependencies,
            DependencyKind::DevDependencies => &self.dev_dependencies,
        }
    }

    /// Mutable dependency map of the given kind.
    pub fn deps_mut(&mut self, kind: DependencyKind) -> &mut DependencyMap {
        match kind {
            DependencyKind::Dependencies => &mut self.dependencies,
            DependencyKind::DevDependencies => &mut self.dev_dependencies,
        }
    }

    /// Render as pretty JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        let mut out =
            serde_json::to_string_pretty(self).map_err(|e| ManifestError::Serialize(e.to_string()))?;
        out.push('\n');
        Ok(out)
    }

    /// Write the manifest atomically (temp file, then rename).
    pub fn write(&self, path: &Path) -> Result<(), ManifestError> {
        let write_err = |p: &Path, e: std::io::Error| ManifestError::Write {
            path: p.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(path, e))?;
        }

        let contents = self.to_json_pretty()?;
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| write_err(&temp_path, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| write_err(&temp_path, e))?;
        file.sync_all().map_err(|e| write_err(&temp_path, e))?;

        fs::rename(&temp_path, path).map_err(|e| write_err(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_maps_default_to_empty() {
        let manifest: PackageManifest = serde_json::from_str("{}").unwrap();
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.dev_dependencies.is_empty());
        assert!(manifest.scripts.is_empty());
    }

    #[test]
    fn unknown_fields_survive_a_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("package.json");
        fs::write(
            &path,
            r#"{ "name": "host", "version": "1.0.0", "engines": { "node": ">=18" } }"#,
        )
        .unwrap();

        let manifest = PackageManifest::load(&path).unwrap();
        manifest.write(&path).unwrap();

        let reread: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reread["name"], "host");
        assert_eq!(reread["engines"]["node"], ">=18");
        assert!(reread["dependencies"].is_object());
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let temp = TempDir::new().unwrap();
        let manifest = PackageManifest::load_or_default(&temp.path().join("none.json")).unwrap();
        assert_eq!(manifest, PackageManifest::default());
    }

    #[test]
    fn parse_error_names_the_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("package.json");
        fs::write(&path, "{ not json").unwrap();

        let err = PackageManifest::load(&path).unwrap_err();
        assert!(err.to_string().contains("package.json"));
    }

    #[test]
    fn deps_mut_selects_map() {
        let mut manifest = PackageManifest::default();
        manifest
            .deps_mut(DependencyKind::DevDependencies)
            .insert("jest".into(), "29.0.0".into());
        assert!(manifest.dependencies.is_empty());
        assert_eq!(manifest.deps(DependencyKind::DevDependencies)["jest"], "29.0.0");
    }

    #[test]
    fn written_output_is_sorted_and_newline_terminated() {
        let mut manifest = PackageManifest::default();
        manifest.dependencies.insert("zeta".into(), "1.0.0".into());
        manifest.dependencies.insert("alpha".into(), "1.0.0".into());

        let json = manifest.to_json_pretty().unwrap();
        assert!(json.ends_with('\n'));
        assert!(json.find("alpha").unwrap() < json.find("zeta").unwrap());
    }
}
