//! engine::merge
//!
//! Version conflict resolution: merges every module's package manifest into
//! the host's.
//!
//! # Rules
//!
//! Modules are visited in graph traversal order. For each module and each of
//! the two dependency maps:
//!
//! 1. Packages that are themselves modules of the graph (`@scope/name`) are
//!    never merged; they are linked, not installed.
//! 2. Packages listed in the module's `excludedPackages` are skipped.
//! 3. The module's version is applied when the host has no entry, when the
//!    module is the entry module, or when the [`MergePolicy`] says so:
//!    - [`MergePolicy::Legacy`]: the versions differ at all
//!    - [`MergePolicy::Newer`]: the module's version is strictly greater
//!
//! Once the entry module has set a package, no other module can replace it.
//!
//! Merging never fails. Every outcome is recorded in the [`MergeReport`].

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::core::config::MergePolicy;
use crate::core::graph::{ModuleGraph, ModuleNode};
use crate::core::manifest::{DependencyKind, PackageManifest};
use crate::core::types::ModuleName;
use crate::core::version::{is_newer, versions_differ};

/// Which side's version ends up in the host manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Take {
    Host,
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// The host had no entry for the package.
    NotInHost,
    /// The module is the entry module.
    EntryModule,
    /// Versions differ and the legacy policy lets the module win.
    VersionDiffers,
    /// The module's version is strictly newer.
    Newer,
    /// Versions are equal after stripping range markers.
    SameVersion,
    /// The module's version is not newer than the host's.
    NotNewer,
    /// The entry module already pinned this package.
    PinnedByEntry,
    /// The package is a module of the graph.
    Blocked,
    /// The module opted the package out of merging.
    Excluded,
}

/// The outcome for one (module, package) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictDecision {
    pub module: ModuleName,
    pub package: String,
    pub kind: DependencyKind,
    pub take: Take,
    pub reason: DecisionReason,
    pub host_version: Option<String>,
    pub module_version: String,
}

/// All merge decisions, in the order they were made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub decisions: Vec<ConflictDecision>,
}

impl MergeReport {
    /// Decisions that changed the host manifest.
    pub fn applied(&self) -> impl Iterator<Item = &ConflictDecision> {
        self.decisions.iter().filter(|d| {
            d.take == Take::Module && d.host_version.as_deref() != Some(d.module_version.as_str())
        })
    }

    /// Decision for a package in a given map made while visiting `module`.
    pub fn find(&self, module: &str, package: &str, kind: DependencyKind) -> Option<&ConflictDecision> {
        self.decisions
            .iter()
            .find(|d| d.module.as_str() == module && d.package == package && d.kind == kind)
    }
}

/// Merge every module's dependencies into `host`.
///
/// `host` is mutated in place; the caller persists it.
pub fn merge_manifests(
    host: &mut PackageManifest,
    graph: &ModuleGraph,
    policy: MergePolicy,
) -> MergeReport {
    let blocklist: BTreeSet<String> = graph
        .all_recursive_dependencies()
        .map(ModuleNode::package_id)
        .collect();

    let mut report = MergeReport::default();
    let mut pinned: BTreeSet<(DependencyKind, String)> = BTreeSet::new();

    for module in graph.all_recursive_dependencies() {
        for kind in DependencyKind::ALL {
            for (package, module_version) in module.manifest.deps(kind) {
                let host_version = host.deps(kind).get(package).cloned();
                let (take, reason) = decide(
                    module,
                    package,
                    kind,
                    host_version.as_deref(),
                    module_version,
                    &blocklist,
                    &pinned,
                    policy,
                );

                if take == Take::Module {
                    debug!(
                        module = %module.name,
                        package = %package,
                        kind = %kind,
                        from = host_version.as_deref().unwrap_or("-"),
                        to = %module_version,
                        ?reason,
                        "merged dependency"
                    );
                    host.deps_mut(kind)
                        .insert(package.clone(), module_version.clone());
                    if module.is_entry {
                        pinned.insert((kind, package.clone()));
                    }
                }

                report.decisions.push(ConflictDecision {
                    module: module.name.clone(),
                    package: package.clone(),
                    kind,
                    take,
                    reason,
                    host_version,
                    module_version: module_version.clone(),
                });
            }
        }
    }

    report
}

#[allow(clippy::too_many_arguments)]
fn decide(
    module: &ModuleNode,
    package: &str,
    kind: DependencyKind,
    host_version: Option<&str>,
    module_version: &str,
    blocklist: &BTreeSet<String>,
    pinned: &BTreeSet<(DependencyKind, String)>,
    policy: MergePolicy,
) -> (Take, DecisionReason) {
    if blocklist.contains(package) {
        return (Take::Host, DecisionReason::Blocked);
    }
    if module.excluded_packages.contains(package) {
        return (Take::Host, DecisionReason::Excluded);
    }

    let Some(current) = host_version else {
        return (Take::Module, DecisionReason::NotInHost);
    };
    if module.is_entry {
        return (Take::Module, DecisionReason::EntryModule);
    }
    if pinned.contains(&(kind, package.to_string())) {
        return (Take::Host, DecisionReason::PinnedByEntry);
    }

    match policy {
        MergePolicy::Legacy if versions_differ(current, module_version) => {
            (Take::Module, DecisionReason::VersionDiffers)
        }
        MergePolicy::Legacy => (Take::Host, DecisionReason::SameVersion),
        MergePolicy::Newer if is_newer(module_version, current) => {
            (Take::Module, DecisionReason::Newer)
        }
        MergePolicy::Newer if versions_differ(current, module_version) => {
            (Take::Host, DecisionReason::NotNewer)
        }
        MergePolicy::Newer => (Take::Host, DecisionReason::SameVersion),
    }
}
