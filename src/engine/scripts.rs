//! engine::scripts
//!
//! Custom build scripts contributed by modules.
//!
//! A module contributes a script by declaring it in its package manifest
//! under the configured prefix (`mw-` by default). `mw-lint` becomes the host
//! script `lint`. The install phase scripts (`mw-preinstall`,
//! `mw-postinstall`) are run by the orchestrator instead of being merged.
//!
//! When two modules contribute the same simplified name, the first one in
//! traversal order wins and a [`DuplicateScriptWarning`] is recorded.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::core::graph::ModuleGraph;
use crate::core::manifest::PackageManifest;
use crate::core::types::ModuleName;

/// Install phases with module-provided scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    Pre,
    Post,
}

impl InstallPhase {
    fn suffix(self) -> &'static str {
        match self {
            InstallPhase::Pre => "preinstall",
            InstallPhase::Post => "postinstall",
        }
    }

    /// Full script name for this phase under `prefix`.
    pub fn script_name(self, prefix: &str) -> String {
        format!("{}{}", prefix, self.suffix())
    }
}

/// The install phase script a manifest declares, if any.
pub fn phase_script<'a>(
    manifest: &'a PackageManifest,
    prefix: &str,
    phase: InstallPhase,
) -> Option<&'a str> {
    manifest
        .scripts
        .get(&phase.script_name(prefix))
        .map(String::as_str)
}

/// Two modules contributed a script under the same simplified name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateScriptWarning {
    pub script: String,
    /// The module whose script was kept.
    pub first_module: ModuleName,
    pub second_module: ModuleName,
}

impl fmt::Display for DuplicateScriptWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The script named \"{}\" is declared multiple times. ({} & {})",
            self.script, self.first_module, self.second_module
        )
    }
}

/// A script selected for the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectedScript {
    /// Simplified name (prefix removed).
    pub name: String,
    pub command: String,
    pub module: ModuleName,
}

/// Result of [`collect_scripts`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptCollection {
    pub scripts: Vec<CollectedScript>,
    pub warnings: Vec<DuplicateScriptWarning>,
}

impl ScriptCollection {
    /// Write the collected scripts into the host's script table.
    ///
    /// Returns true if anything was written.
    pub fn apply(&self, host: &mut PackageManifest) -> bool {
        for script in &self.scripts {
            host.scripts
                .insert(script.name.clone(), script.command.clone());
        }
        !self.scripts.is_empty()
    }
}

/// Collect prefixed scripts from every module, in traversal order.
pub fn collect_scripts(graph: &ModuleGraph, prefix: &str) -> ScriptCollection {
    let reserved = [
        InstallPhase::Pre.script_name(prefix),
        InstallPhase::Post.script_name(prefix),
    ];
    let mut collection = ScriptCollection::default();

    for module in graph.all_recursive_dependencies() {
        for (name, command) in &module.manifest.scripts {
            let Some(simple) = name.strip_prefix(prefix) else {
                continue;
            };
            if simple.is_empty() || reserved.contains(name) {
                continue;
            }

            match collection.scripts.iter().find(|s| s.name == simple) {
                Some(existing) => {
                    let warning = DuplicateScriptWarning {
                        script: simple.to_string(),
                        first_module: existing.module.clone(),
                        second_module: module.name.clone(),
                    };
                    warn!("{}", warning);
                    collection.warnings.push(warning);
                }
                None => collection.scripts.push(CollectedScript {
                    name: simple.to_string(),
                    command: command.clone(),
                    module: module.name.clone(),
                }),
            }
        }
    }

    collection
}
