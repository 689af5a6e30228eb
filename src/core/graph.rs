//! core::graph
//!
//! Module graph representation and resolution.
//!
//! # Architecture
//!
//! The module graph is a DAG where:
//! - Nodes are modules, stored once in an arena and addressed by [`ModuleId`]
//! - Edges point from a module to the modules it depends on, in declaration order
//! - Root is the host ([`ModuleId::HOST`])
//!
//! A module referenced by several parents (a diamond) is a single node that
//! every parent points at. The [`Resolver`] guarantees this by consulting a
//! name-keyed registry before constructing anything.
//!
//! # Invariants
//!
//! - Graph must be acyclic
//! - Module names are unique within a graph
//! - The host is never a dependency of another module
//! - At most one module is marked as entry

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::descriptor::{
    DescriptorError, HostDescriptor, ModuleDefinition, ModuleDescriptorFile, ModuleReference,
    PACKAGE_MANIFEST_FILE,
};
use super::manifest::{ManifestError, PackageManifest};
use super::paths::normalize_path;
use super::types::{ModuleId, ModuleName, TypeError};

/// Errors from module graph resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A referenced module's descriptor does not exist on disk.
    #[error("module '{name}' could not be found at '{expected_path}' referenced by '{referenced_by}'")]
    MissingModule {
        name: String,
        expected_path: PathBuf,
        referenced_by: String,
    },

    #[error("circular module dependency: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    /// A module references the name declared by the host descriptor.
    #[error("module '{referenced_by}' references the host '{host}' as a dependency")]
    HostReferenced { host: String, referenced_by: String },

    #[error("more than one entry module: '{first}' and '{second}'")]
    MultipleEntryModules { first: String, second: String },

    #[error("invalid module name in '{path}': {source}")]
    InvalidName { path: PathBuf, source: TypeError },
}

/// A resolved module.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    id: ModuleId,
    pub name: ModuleName,
    /// Publishing scope, without the leading `@`.
    pub package_name: Option<String>,
    /// Directory holding the module's descriptor and package manifest.
    pub base_path: PathBuf,
    pub descriptor_path: PathBuf,
    pub is_host: bool,
    pub is_entry: bool,
    pub precompiled: bool,
    /// Source root, relative to `base_path`.
    pub src_path: PathBuf,
    /// Asset folders, relative to `base_path`.
    pub assets_paths: Vec<PathBuf>,
    /// Global style sheet, relative to `base_path`.
    pub styles_path: Option<PathBuf>,
    pub excluded_packages: BTreeSet<String>,
    pub manifest: PackageManifest,
    /// Direct dependencies, in declaration order.
    pub dependencies: Vec<ModuleId>,
}

impl ModuleNode {
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Absolute source root.
    pub fn src_root(&self) -> PathBuf {
        normalize_path(&self.base_path.join(&self.src_path))
    }

    /// The identifier this module would be published under: `@scope/name`,
    /// or just `name` when the module has no scope.
    pub fn package_id(&self) -> String {
        match &self.package_name {
            Some(scope) => format!("@{}/{}", scope, self.name),
            None => self.name.to_string(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.base_path.join(PACKAGE_MANIFEST_FILE)
    }
}

/// Host-level options read from the host descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct HostOptions {
    pub base_href: String,
    pub title: String,
    pub head_lines: Vec<String>,
    pub aot: bool,
    pub compiler_options: serde_json::Map<String, serde_json::Value>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            base_href: "/".to_string(),
            title: String::new(),
            head_lines: Vec::new(),
            aot: true,
            compiler_options: serde_json::Map::new(),
        }
    }
}

/// A resolved module graph rooted at the host.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    nodes: Vec<ModuleNode>,
    /// Pre-order traversal of every non-host module, computed once.
    order: Vec<ModuleId>,
    options: HostOptions,
}

impl ModuleGraph {
    fn new(nodes: Vec<ModuleNode>, options: HostOptions) -> Self {
        let order = preorder(&nodes);
        Self {
            nodes,
            order,
            options,
        }
    }

    pub fn host(&self) -> &ModuleNode {
        &self.nodes[ModuleId::HOST.index()]
    }

    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    /// Get a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was produced by a different graph.
    pub fn node(&self, id: ModuleId) -> &ModuleNode {
        &self.nodes[id.index()]
    }

    /// Find a module by name.
    pub fn get(&self, name: &str) -> Option<&ModuleNode> {
        self.nodes.iter().find(|n| n.name.as_str() == name)
    }

    /// Direct dependencies of a node, in declaration order.
    pub fn dependencies_of(&self, id: ModuleId) -> impl Iterator<Item = &ModuleNode> {
        self.node(id).dependencies.iter().map(|dep| self.node(*dep))
    }

    /// Every module reachable from the host, host excluded.
    ///
    /// Order is pre-order over dependency declaration order; each module
    /// appears once, at its first visit. Every generated artifact follows
    /// this order.
    pub fn all_recursive_dependencies(&self) -> impl Iterator<Item = &ModuleNode> {
        self.order.iter().map(|id| self.node(*id))
    }

    /// Number of modules, host excluded.
    pub fn module_count(&self) -> usize {
        self.order.len()
    }

    pub fn entry_module(&self) -> Option<&ModuleNode> {
        self.all_recursive_dependencies().find(|n| n.is_entry)
    }
}

fn preorder(nodes: &[ModuleNode]) -> Vec<ModuleId> {
    let mut order = Vec::new();
    let mut seen = BTreeSet::new();
    let mut stack: Vec<ModuleId> = nodes
        .first()
        .map(|host| host.dependencies.iter().rev().copied().collect())
        .unwrap_or_default();

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        order.push(id);
        stack.extend(nodes[id.index()].dependencies.iter().rev().copied());
    }
    order
}

/// Registry state of a module name.
#[derive(Debug, Clone, Copy)]
enum Slot {
    /// Registered, dependencies still being resolved.
    Resolving(ModuleId),
    Resolved(ModuleId),
}

/// Builds a [`ModuleGraph`] from a host descriptor.
///
/// The resolver owns the name registry for one resolution run. Each module
/// is registered before its own dependencies are resolved, so a module
/// reachable through several parents is constructed exactly once and a
/// true cycle is detected instead of recursing forever.
///
/// # Example
///
/// ```no_run
/// use modweave::core::graph::Resolver;
/// use std::path::Path;
///
/// let graph = Resolver::resolve(Path::new("/work/host/modweave-host.json"))?;
/// for module in graph.all_recursive_dependencies() {
///     println!("{}", module.name);
/// }
/// # Ok::<(), modweave::core::graph::ResolveError>(())
/// ```
#[derive(Debug, Default)]
pub struct Resolver {
    nodes: Vec<ModuleNode>,
    registry: BTreeMap<ModuleName, Slot>,
    /// Names currently being resolved, outermost first.
    stack: Vec<ModuleName>,
    /// Host name given in the host descriptor. A name derived from the
    /// host directory is not reserved.
    declared_host: Option<ModuleName>,
}

impl Resolver {
    /// Resolve the graph rooted at the given host descriptor.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Descriptor`] if a descriptor is unreadable or malformed
    /// - [`ResolveError::MissingModule`] if a referenced descriptor does not exist
    /// - [`ResolveError::Cycle`] if modules depend on each other circularly
    pub fn resolve(host_descriptor: &Path) -> Result<ModuleGraph, ResolveError> {
        // Relative base paths would turn into dangling symlink targets.
        let absolute = std::path::absolute(host_descriptor)
            .map(|p| normalize_path(&p))
            .map_err(|source| DescriptorError::Read {
                path: host_descriptor.to_path_buf(),
                source,
            })?;
        let host_descriptor = absolute.as_path();
        let descriptor = HostDescriptor::load(host_descriptor)?;
        let host_dir = host_descriptor
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let name = host_name(&descriptor, &host_dir, host_descriptor)?;
        let manifest = PackageManifest::load_or_default(&host_dir.join(PACKAGE_MANIFEST_FILE))?;

        let mut resolver = Resolver {
            declared_host: descriptor.name.is_some().then(|| name.clone()),
            ..Default::default()
        };
        resolver.nodes.push(ModuleNode {
            id: ModuleId::HOST,
            name: name.clone(),
            package_name: None,
            base_path: host_dir.clone(),
            descriptor_path: host_descriptor.to_path_buf(),
            is_host: true,
            is_entry: false,
            precompiled: false,
            src_path: PathBuf::from("."),
            assets_paths: Vec::new(),
            styles_path: None,
            excluded_packages: BTreeSet::new(),
            manifest,
            dependencies: Vec::new(),
        });
        resolver.stack.push(name);

        let mut deps = Vec::new();
        for reference in &descriptor.modules {
            deps.extend(resolver.resolve_reference(ModuleId::HOST, &host_dir, reference)?);
        }
        resolver.nodes[ModuleId::HOST.index()].dependencies = deps;

        let options = HostOptions {
            base_href: descriptor.base_href.unwrap_or_else(|| "/".to_string()),
            title: descriptor.title.unwrap_or_default(),
            head_lines: descriptor.html_head_content.into_vec(),
            aot: descriptor.aot.unwrap_or(true),
            compiler_options: descriptor.compiler_options,
        };

        let graph = ModuleGraph::new(resolver.nodes, options);
        check_single_entry(&graph)?;

        info!(
            host = %graph.host().name,
            modules = graph.module_count(),
            "resolved module graph"
        );
        Ok(graph)
    }

    /// Resolve every name bound by one reference, returning their ids.
    fn resolve_reference(
        &mut self,
        parent: ModuleId,
        declaring_dir: &Path,
        reference: &ModuleReference,
    ) -> Result<Vec<ModuleId>, ResolveError> {
        let descriptor_path = reference.descriptor_path(declaring_dir);
        let mut ids = Vec::with_capacity(reference.names.len());

        for raw in &reference.names {
            let name = ModuleName::new(raw.as_str()).map_err(|source| ResolveError::InvalidName {
                path: descriptor_path.clone(),
                source,
            })?;
            let referenced_by = self.nodes[parent.index()].name.to_string();

            if self.declared_host.as_ref() == Some(&name) {
                return Err(ResolveError::HostReferenced {
                    host: name.to_string(),
                    referenced_by,
                });
            }

            match self.registry.get(&name) {
                Some(Slot::Resolved(id)) => {
                    debug!(module = %name, parent = %referenced_by, "reusing resolved module");
                    ids.push(*id);
                }
                Some(Slot::Resolving(_)) => {
                    let start = self.stack.iter().rposition(|n| *n == name).unwrap_or(0);
                    let mut chain: Vec<String> =
                        self.stack[start..].iter().map(|n| n.to_string()).collect();
                    chain.push(name.to_string());
                    return Err(ResolveError::Cycle { chain });
                }
                None => {
                    if !descriptor_path.exists() {
                        return Err(ResolveError::MissingModule {
                            name: name.to_string(),
                            expected_path: descriptor_path,
                            referenced_by,
                        });
                    }
                    ids.push(self.construct(name, &descriptor_path)?);
                }
            }
        }

        Ok(ids)
    }

    /// Construct a new node, registering it before resolving its dependencies.
    fn construct(
        &mut self,
        name: ModuleName,
        descriptor_path: &Path,
    ) -> Result<ModuleId, ResolveError> {
        let mut file = ModuleDescriptorFile::load(descriptor_path)?;
        let definition = file.take(name.as_str(), descriptor_path)?;
        let base_path = descriptor_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let manifest = PackageManifest::load_or_default(&base_path.join(PACKAGE_MANIFEST_FILE))?;

        let id = ModuleId(self.nodes.len());
        let ModuleDefinition {
            package_name,
            is_entry,
            precompiled,
            src_path,
            assets_path,
            styles_path,
            excluded_packages,
            dependencies,
            ..
        } = definition;

        self.nodes.push(ModuleNode {
            id,
            name: name.clone(),
            package_name,
            base_path: base_path.clone(),
            descriptor_path: descriptor_path.to_path_buf(),
            is_host: false,
            is_entry,
            precompiled,
            src_path: src_path.unwrap_or_else(|| PathBuf::from(".")),
            assets_paths: assets_path.into_vec(),
            styles_path,
            excluded_packages: excluded_packages.into_iter().collect(),
            manifest,
            dependencies: Vec::new(),
        });
        self.registry.insert(name.clone(), Slot::Resolving(id));
        self.stack.push(name.clone());
        debug!(module = %name, path = %descriptor_path.display(), "constructing module");

        let mut deps = Vec::new();
        for reference in &dependencies {
            deps.extend(self.resolve_reference(id, &base_path, reference)?);
        }

        self.stack.pop();
        self.nodes[id.index()].dependencies = deps;
        self.registry.insert(name, Slot::Resolved(id));
        Ok(id)
    }
}

fn host_name(
    descriptor: &HostDescriptor,
    host_dir: &Path,
    descriptor_path: &Path,
) -> Result<ModuleName, ResolveError> {
    if let Some(name) = &descriptor.name {
        return ModuleName::new(name.as_str()).map_err(|source| ResolveError::InvalidName {
            path: descriptor_path.to_path_buf(),
            source,
        });
    }

    // Directory names are not guaranteed to be valid module names.
    let from_dir = host_dir
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| ModuleName::new(n).ok());
    match from_dir {
        Some(name) => Ok(name),
        None => ModuleName::new("host").map_err(|source| ResolveError::InvalidName {
            path: descriptor_path.to_path_buf(),
            source,
        }),
    }
}

fn check_single_entry(graph: &ModuleGraph) -> Result<(), ResolveError> {
    let mut entries = graph.all_recursive_dependencies().filter(|n| n.is_entry);
    if let (Some(first), Some(second)) = (entries.next(), entries.next()) {
        return Err(ResolveError::MultipleEntryModules {
            first: first.name.to_string(),
            second: second.name.to_string(),
        });
    }
    Ok(())
}
