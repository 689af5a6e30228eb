//! Test fixtures: a temporary directory holding a host and its modules.
//!
//! Layout:
//! - `<root>/host/` - host descriptor and package manifest
//! - `<root>/mods/<name>/` - one directory per module

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::TempDir;

use super::descriptor::{HOST_DESCRIPTOR_FILE, MODULE_DESCRIPTOR_FILE, PACKAGE_MANIFEST_FILE};
use super::graph::{ModuleGraph, Resolver};

pub(crate) struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub(crate) fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn host_dir(&self) -> PathBuf {
        self.root().join("host")
    }

    pub(crate) fn host_descriptor(&self) -> PathBuf {
        self.host_dir().join(HOST_DESCRIPTOR_FILE)
    }

    pub(crate) fn module_dir(&self, name: &str) -> PathBuf {
        self.root().join("mods").join(name)
    }

    /// Write a host descriptor referencing `names`, merged with `extra`.
    pub(crate) fn host(&self, names: &[&str], extra: Value) -> &Self {
        let modules: Vec<_> = names
            .iter()
            .map(|n| json!({ "path": format!("../mods/{n}"), "names": [n] }))
            .collect();
        let mut host = json!({ "modules": modules });
        merge(&mut host, extra);
        write_json(&self.host_descriptor(), &host);
        self
    }

    /// Write a module depending on sibling modules, merged with `extra`.
    pub(crate) fn module(&self, name: &str, deps: &[&str], extra: Value) -> &Self {
        let dependencies: Vec<_> = deps
            .iter()
            .map(|d| json!({ "path": format!("../{d}"), "names": [d] }))
            .collect();
        let mut module = json!({ "name": name, "dependencies": dependencies });
        merge(&mut module, extra);
        write_json(
            &self.module_dir(name).join(MODULE_DESCRIPTOR_FILE),
            &json!({ "modules": [module] }),
        );
        self
    }

    pub(crate) fn host_manifest(&self, manifest: Value) -> &Self {
        write_json(&self.host_dir().join(PACKAGE_MANIFEST_FILE), &manifest);
        self
    }

    pub(crate) fn module_manifest(&self, name: &str, manifest: Value) -> &Self {
        write_json(&self.module_dir(name).join(PACKAGE_MANIFEST_FILE), &manifest);
        self
    }

    /// Write a file below a module directory.
    pub(crate) fn module_file(&self, name: &str, rel: &str, contents: &str) -> &Self {
        let path = self.module_dir(name).join(rel);
        fs::create_dir_all(path.parent().expect("file has a parent")).unwrap();
        fs::write(path, contents).unwrap();
        self
    }

    pub(crate) fn resolve(&self) -> ModuleGraph {
        Resolver::resolve(&self.host_descriptor()).expect("fixture resolves")
    }
}

pub(crate) fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().expect("file has a parent")).unwrap();
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn merge(target: &mut Value, extra: Value) {
    if let (Some(obj), Value::Object(extra)) = (target.as_object_mut(), extra) {
        obj.extend(extra);
    }
}
