//! engine::stage
//!
//! The staging orchestrator: materializes a resolved graph into the host's
//! staging tree.
//!
//! # Pipeline
//!
//! Steps run strictly in [`StagingStep::ALL`] order. Each step finishes its
//! filesystem writes before its [`LifecycleEvent`] is triggered, and before
//! the next step starts. Every step walks the graph in traversal order, so
//! generated files are identical across runs for identical descriptors.
//!
//! # Failure
//!
//! The first error aborts the pipeline. Artifacts already written are left
//! in place; re-running from a clean state is the recovery path.
//!
//! # Invariants
//!
//! - The staging lock is held for the whole pipeline
//! - Module sources are linked, never copied
//! - `env/` scaffolding is created once and never overwritten

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use super::events::{EventBus, EventError, EventPayload, LifecycleEvent};
use super::exec::{CommandRunner, CommandSpec, RunError};
use super::merge::{merge_manifests, MergeReport};
use super::scripts::{collect_scripts, phase_script, InstallPhase, ScriptCollection};
use crate::core::config::{Config, MergePolicy};
use crate::core::graph::{ModuleGraph, ModuleNode};
use crate::core::lock::{LockError, StagingLock};
use crate::core::manifest::{ManifestError, PackageManifest};
use crate::core::paths::{normalize_path, relative_to, to_slash, StagingPaths, INSTALL_DIR};
use crate::core::types::{Fingerprint, ModuleName};

/// Header of the generated style entry.
const STYLES_HEADER: &str = "\
/* Generated by modweave. Do not edit: this file is rewritten on every install.
 * Global styles belong in the stylesPath of a module descriptor. */";

const INDEX_HTML_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <!--[title]-->
  <base href="<!--[baseHref]-->">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <!--[htmlHeadContent]-->
</head>
<body>
</body>
</html>
"#;

const GITIGNORE_COMMENT: &str = "# modweave staging output";

/// One step of the staging pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingStep {
    RunPreinstall,
    Clean,
    LinkModules,
    GenerateRegistry,
    ReferenceStyles,
    LinkAssets,
    MergeDependencies,
    CollectScripts,
    GenerateIndexHtml,
    AdjustGitignore,
    InstallPackages,
    ScaffoldEnvironment,
    RunPostinstall,
}

impl StagingStep {
    /// All steps, in execution order.
    pub const ALL: [StagingStep; 13] = [
        StagingStep::RunPreinstall,
        StagingStep::Clean,
        StagingStep::LinkModules,
        StagingStep::GenerateRegistry,
        StagingStep::ReferenceStyles,
        StagingStep::LinkAssets,
        StagingStep::MergeDependencies,
        StagingStep::CollectScripts,
        StagingStep::GenerateIndexHtml,
        StagingStep::AdjustGitignore,
        StagingStep::InstallPackages,
        StagingStep::ScaffoldEnvironment,
        StagingStep::RunPostinstall,
    ];

    /// The event triggered after this step.
    pub fn event(self) -> LifecycleEvent {
        match self {
            StagingStep::RunPreinstall => LifecycleEvent::PreinstallExecuted,
            StagingStep::Clean => LifecycleEvent::StagingCleaned,
            StagingStep::LinkModules => LifecycleEvent::SymlinksCreated,
            StagingStep::GenerateRegistry => LifecycleEvent::RegistryGenerated,
            StagingStep::ReferenceStyles => LifecycleEvent::StylesReferenced,
            StagingStep::LinkAssets => LifecycleEvent::AssetsLinked,
            StagingStep::MergeDependencies => LifecycleEvent::DependenciesMerged,
            StagingStep::CollectScripts => LifecycleEvent::ScriptsCollected,
            StagingStep::GenerateIndexHtml => LifecycleEvent::IndexHtmlGenerated,
            StagingStep::AdjustGitignore => LifecycleEvent::GitignoreAdjusted,
            StagingStep::InstallPackages => LifecycleEvent::PackagesInstalled,
            StagingStep::ScaffoldEnvironment => LifecycleEvent::EnvScaffolded,
            StagingStep::RunPostinstall => LifecycleEvent::PostinstallExecuted,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StagingStep::RunPreinstall => "preinstall scripts",
            StagingStep::Clean => "cleanup",
            StagingStep::LinkModules => "linking modules",
            StagingStep::GenerateRegistry => "generating module registry",
            StagingStep::ReferenceStyles => "referencing styles",
            StagingStep::LinkAssets => "linking assets",
            StagingStep::MergeDependencies => "merging packages",
            StagingStep::CollectScripts => "collecting scripts",
            StagingStep::GenerateIndexHtml => "generating index.html",
            StagingStep::AdjustGitignore => "adjusting .gitignore",
            StagingStep::InstallPackages => "installing packages",
            StagingStep::ScaffoldEnvironment => "scaffolding environment",
            StagingStep::RunPostinstall => "postinstall scripts",
        }
    }
}

impl fmt::Display for StagingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Kind of path a module declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Source,
    Styles,
    Assets,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssetKind::Source => "source folder",
            AssetKind::Styles => "styles file",
            AssetKind::Assets => "assets folder",
        })
    }
}

/// Errors from the staging pipeline.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Lock(#[from] LockError),

    /// A path declared by a module does not exist.
    #[error("could not find {kind} '{}' defined by module '{module}'", .path.display())]
    MissingAsset {
        module: ModuleName,
        kind: AssetKind,
        path: PathBuf,
    },

    /// Two asset folders of one module would link to the same name.
    #[error(
        "asset folders '{}' and '{}' of module '{module}' both link as '{folder}'",
        .first.display(),
        .second.display()
    )]
    AssetFolderClash {
        module: ModuleName,
        folder: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("styles file '{}' of module '{module}' is outside its source folder", .path.display())]
    StylesOutsideSource { module: ModuleName, path: PathBuf },

    #[error("i/o error at '{}': {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("{step} failed: {source}")]
    Command {
        step: StagingStep,
        source: RunError,
    },

    #[error(transparent)]
    Event(#[from] EventError),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StageError + '_ {
    move |source| StageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOptions {
    pub script_prefix: String,
    pub merge_policy: MergePolicy,
    pub install_command: String,
    pub skip_install: bool,
}

impl StageOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            script_prefix: config.script_prefix().to_string(),
            merge_policy: config.merge_policy(),
            install_command: config.install_command().to_string(),
            skip_install: config.skip_install(),
        }
    }
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct ComposeReport {
    pub staging_root: PathBuf,
    pub steps: Vec<StagingStep>,
    pub merge: MergeReport,
    pub scripts: ScriptCollection,
    /// Subscriber failures tolerated by the event policy.
    pub event_failures: Vec<EventError>,
    pub install_skipped: bool,
    /// Fingerprint of the staging tree, install directory excluded.
    pub fingerprint: Fingerprint,
}

/// Drives the staging pipeline for one graph.
///
/// # Example
///
/// ```no_run
/// use modweave::core::config::Config;
/// use modweave::core::graph::Resolver;
/// use modweave::core::paths::StagingPaths;
/// use modweave::engine::events::EventBus;
/// use modweave::engine::exec::ShellRunner;
/// use modweave::engine::stage::{Orchestrator, StageOptions};
/// use std::path::Path;
///
/// let graph = Resolver::resolve(Path::new("/work/host/modweave-host.json"))?;
/// let paths = StagingPaths::new(graph.host().base_path.clone(), ".modweave");
/// let options = StageOptions::from_config(&Config::default());
///
/// let report = Orchestrator::new(&graph, paths, options, &ShellRunner)
///     .with_bus(EventBus::default())
///     .run()?;
/// println!("staged {} steps", report.steps.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Orchestrator<'a> {
    graph: &'a ModuleGraph,
    paths: StagingPaths,
    options: StageOptions,
    runner: &'a dyn CommandRunner,
    bus: EventBus,
    manifest: PackageManifest,
    merge: MergeReport,
    scripts: ScriptCollection,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        graph: &'a ModuleGraph,
        paths: StagingPaths,
        options: StageOptions,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            graph,
            paths,
            options,
            runner,
            bus: EventBus::default(),
            manifest: graph.host().manifest.clone(),
            merge: MergeReport::default(),
            scripts: ScriptCollection::default(),
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Run every step in order.
    ///
    /// # Errors
    ///
    /// - [`StageError::Lock`] if another process is staging this host
    /// - [`StageError::MissingAsset`] if a declared path does not exist
    /// - [`StageError::AssetFolderClash`] if two asset folders of a module share a name
    /// - [`StageError::Command`] if a script or the install command fails
    /// - [`StageError::Event`] if a subscriber fails under the abort policy
    pub fn run(mut self) -> Result<ComposeReport, StageError> {
        let _lock = StagingLock::acquire(&self.paths)?;
        let root = self.paths.root();
        let mut completed = Vec::with_capacity(StagingStep::ALL.len());

        for step in StagingStep::ALL {
            info!(step = %step, "staging");
            self.run_step(step)?;

            let event = step.event();
            let payload = EventPayload::snapshot(event, self.graph, &self.manifest, &root);
            self.bus.trigger_event(event, &payload)?;
            completed.push(step);
        }

        let fingerprint = Fingerprint::of_tree(&root, &[INSTALL_DIR]).map_err(io_err(&root))?;
        info!(fingerprint = %fingerprint, "staging complete");

        Ok(ComposeReport {
            staging_root: root,
            steps: completed,
            merge: self.merge,
            scripts: self.scripts,
            event_failures: self.bus.failures().to_vec(),
            install_skipped: self.options.skip_install,
            fingerprint,
        })
    }

    fn run_step(&mut self, step: StagingStep) -> Result<(), StageError> {
        match step {
            StagingStep::RunPreinstall => self.run_phase_scripts(InstallPhase::Pre, step),
            StagingStep::Clean => clean_staging(&self.paths, true),
            StagingStep::LinkModules => self.link_modules(),
            StagingStep::GenerateRegistry => self.generate_registry(),
            StagingStep::ReferenceStyles => self.reference_styles(),
            StagingStep::LinkAssets => self.link_assets(),
            StagingStep::MergeDependencies => self.merge_dependencies(),
            StagingStep::CollectScripts => self.collect_scripts(),
            StagingStep::GenerateIndexHtml => self.generate_index_html(),
            StagingStep::AdjustGitignore => self.adjust_gitignore(),
            StagingStep::InstallPackages => self.install_packages(step),
            StagingStep::ScaffoldEnvironment => self.scaffold_environment(),
            StagingStep::RunPostinstall => self.run_phase_scripts(InstallPhase::Post, step),
        }
    }

    // =========================================================================
    // Steps
    // =========================================================================

    /// Run a phase script of every module, then of the host.
    fn run_phase_scripts(&self, phase: InstallPhase, step: StagingStep) -> Result<(), StageError> {
        let modules = self
            .graph
            .all_recursive_dependencies()
            .chain(std::iter::once(self.graph.host()));

        for module in modules {
            if let Some(script) = phase_script(&module.manifest, &self.options.script_prefix, phase)
            {
                debug!(module = %module.name, script, "running phase script");
                self.runner
                    .run(&CommandSpec::new(script, module.base_path.as_path()))
                    .map_err(|source| StageError::Command { step, source })?;
            }
        }
        Ok(())
    }

    fn link_modules(&self) -> Result<(), StageError> {
        for module in self.graph.all_recursive_dependencies() {
            let (link, target) = if module.precompiled {
                (self.paths.precompiled_link(&module.name), module.base_path.clone())
            } else {
                (self.paths.dependency_link(&module.name), module.src_root())
            };

            if !target.is_dir() {
                return Err(StageError::MissingAsset {
                    module: module.name.clone(),
                    kind: AssetKind::Source,
                    path: target,
                });
            }
            link_dir(&link, &target)?;
        }
        Ok(())
    }

    fn generate_registry(&self) -> Result<(), StageError> {
        let root = self.paths.root();
        let entries: Vec<_> = self
            .graph
            .all_recursive_dependencies()
            .map(|m| {
                let link = if m.precompiled {
                    self.paths.precompiled_link(&m.name)
                } else {
                    self.paths.dependency_link(&m.name)
                };
                let link = relative_to(&link, &root).unwrap_or(link);
                let dependencies: Vec<&str> = self
                    .graph
                    .dependencies_of(m.id())
                    .map(|d| d.name.as_str())
                    .collect();
                json!({
                    "name": m.name,
                    "packageName": m.package_name,
                    "isEntry": m.is_entry,
                    "precompiled": m.precompiled,
                    "link": to_slash(&link),
                    "dependencies": dependencies,
                })
            })
            .collect();

        write_json(&self.paths.registry_path(), &json!({ "modules": entries }))
    }

    fn reference_styles(&self) -> Result<(), StageError> {
        let mut lines = vec![STYLES_HEADER.to_string()];
        for module in self.graph.all_recursive_dependencies() {
            if let Some(import) = self.style_import(module)? {
                lines.push(format!("@import \"{}\";", import));
            }
        }

        let mut contents = lines.join("\n");
        contents.push('\n');
        write_file(&self.paths.styles_entry(), &contents)
    }

    /// Import path of a module's global styles, seen from the style entry.
    fn style_import(&self, module: &ModuleNode) -> Result<Option<String>, StageError> {
        let Some(styles) = &module.styles_path else {
            return Ok(None);
        };

        if module.precompiled {
            let package_base = module.src_path.parent().unwrap_or(Path::new(""));
            let rel = relative_to(styles, package_base).unwrap_or_else(|| normalize_path(styles));
            let mut import = PathBuf::new();
            if let Some(scope) = &module.package_name {
                import.push(format!("@{}", scope));
            }
            import.push(module.name.as_str());
            import.push(rel);
            return Ok(Some(to_slash(&import)));
        }

        let absolute = normalize_path(&module.base_path.join(styles));
        if !absolute.is_file() {
            return Err(StageError::MissingAsset {
                module: module.name.clone(),
                kind: AssetKind::Styles,
                path: styles.clone(),
            });
        }
        let rel = relative_to(&absolute, &module.src_root()).ok_or_else(|| {
            StageError::StylesOutsideSource {
                module: module.name.clone(),
                path: styles.clone(),
            }
        })?;

        let import = self
            .paths
            .dependencies_from_src()
            .join(module.name.as_str())
            .join(rel);
        Ok(Some(to_slash(&import)))
    }

    fn link_assets(&self) -> Result<(), StageError> {
        let assets_dir = self.paths.assets_dir();
        fs::create_dir_all(&assets_dir).map_err(io_err(&assets_dir))?;

        for module in self.graph.all_recursive_dependencies() {
            let mut linked: BTreeMap<PathBuf, &PathBuf> = BTreeMap::new();
            for declared in &module.assets_paths {
                let target = normalize_path(&module.base_path.join(declared));
                if !target.is_dir() {
                    return Err(StageError::MissingAsset {
                        module: module.name.clone(),
                        kind: AssetKind::Assets,
                        path: declared.clone(),
                    });
                }
                let folder = target
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("assets"));
                if let Some(first) = linked.get(&folder) {
                    return Err(StageError::AssetFolderClash {
                        module: module.name.clone(),
                        folder: folder.display().to_string(),
                        first: (*first).clone(),
                        second: declared.clone(),
                    });
                }
                linked.insert(folder.clone(), declared);
                link_dir(&self.paths.module_assets_dir(&module.name).join(folder), &target)?;
            }
        }
        Ok(())
    }

    fn merge_dependencies(&mut self) -> Result<(), StageError> {
        self.merge = merge_manifests(&mut self.manifest, self.graph, self.options.merge_policy);
        info!(
            decisions = self.merge.decisions.len(),
            applied = self.merge.applied().count(),
            "merged package manifests"
        );
        self.manifest.write(&self.paths.manifest_path())?;
        Ok(())
    }

    fn collect_scripts(&mut self) -> Result<(), StageError> {
        self.scripts = collect_scripts(self.graph, &self.options.script_prefix);
        if self.scripts.apply(&mut self.manifest) {
            self.manifest.write(&self.paths.manifest_path())?;
        }
        Ok(())
    }

    fn generate_index_html(&self) -> Result<(), StageError> {
        let options = self.graph.options();

        let mut html = INDEX_HTML_TEMPLATE
            .replace("<!--[title]-->", &format!("<title>{}</title>", options.title))
            .replace("<!--[baseHref]-->", &options.base_href);
        if !options.head_lines.is_empty() {
            let custom = format!(
                "<!--[custom]-->\n  {}\n  <!--[custom]-->",
                options.head_lines.join("\n  ")
            );
            html = html.replace("<!--[htmlHeadContent]-->", &custom);
        }
        write_file(&self.paths.index_html(), &html)?;

        write_json(
            &self.paths.compiler_options_path(),
            &json!({
                "aot": options.aot,
                "compilerOptions": options.compiler_options,
            }),
        )
    }

    fn adjust_gitignore(&self) -> Result<(), StageError> {
        let path = self.paths.gitignore_path();
        let existing = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_err(&path)(e)),
        };

        let wanted = [
            format!("/{}", self.paths.staging_dir_name()),
            format!("/{}.lock", self.paths.staging_dir_name()),
        ];
        let missing: Vec<&String> = wanted
            .iter()
            .filter(|line| !existing.lines().any(|l| l.trim() == line.as_str()))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let mut contents = existing;
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        if !contents.lines().any(|l| l == GITIGNORE_COMMENT) {
            contents.push_str(GITIGNORE_COMMENT);
            contents.push('\n');
        }
        for line in missing {
            contents.push_str(line);
            contents.push('\n');
        }
        write_file(&path, &contents)
    }

    fn install_packages(&self, step: StagingStep) -> Result<(), StageError> {
        if self.options.skip_install {
            info!("skipping package install");
            return Ok(());
        }
        self.runner
            .run(&CommandSpec::new(
                self.options.install_command.as_str(),
                self.paths.root(),
            ))
            .map_err(|source| StageError::Command { step, source })
    }

    fn scaffold_environment(&self) -> Result<(), StageError> {
        let env_dir = self.paths.env_dir();
        fs::create_dir_all(&env_dir).map_err(io_err(&env_dir))?;

        for (file, production) in [("environment.json", false), ("environment.prod.json", true)] {
            let path = env_dir.join(file);
            if !path.exists() {
                write_json(&path, &json!({ "production": production }))?;
            }
        }
        Ok(())
    }
}

/// Remove generated output below the staging root.
///
/// With `keep_install`, the package install directory survives so that a
/// re-run does not download everything again.
pub fn clean_staging(paths: &StagingPaths, keep_install: bool) -> Result<(), StageError> {
    let root = paths.root();
    if root.exists() {
        let entries = fs::read_dir(&root).map_err(io_err(&root))?;
        for entry in entries {
            let entry = entry.map_err(io_err(&root))?;
            if keep_install && entry.file_name() == INSTALL_DIR {
                continue;
            }
            remove_entry(&entry.path())?;
        }
    }
    fs::create_dir_all(&root).map_err(io_err(&root))?;
    Ok(())
}

/// Remove a file, directory, or link without following links.
fn remove_entry(path: &Path) -> Result<(), StageError> {
    let meta = fs::symlink_metadata(path).map_err(io_err(path))?;
    let result = if meta.file_type().is_symlink() {
        // Directory links on Windows must be removed as directories.
        fs::remove_file(path).or_else(|_| fs::remove_dir(path))
    } else if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(io_err(path))
}

/// Create a directory link at `link` pointing at `target`, replacing any
/// existing entry.
fn link_dir(link: &Path, target: &Path) -> Result<(), StageError> {
    if fs::symlink_metadata(link).is_ok() {
        remove_entry(link)?;
    }
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    debug!(link = %link.display(), target = %target.display(), "linking");

    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);
    #[cfg(windows)]
    let result = std::os::windows::fs::symlink_dir(target, link);

    result.map_err(io_err(link))
}

fn write_file(path: &Path, contents: &str) -> Result<(), StageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    fs::write(path, contents).map_err(io_err(path))
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), StageError> {
    let mut contents = serde_json::to_string_pretty(value)
        .map_err(|e| io_err(path)(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    contents.push('\n');
    write_file(path, &contents)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::config::EventErrorPolicy;
    use crate::core::fixtures::TestWorkspace;
    use crate::engine::events::HandlerError;
    use crate::engine::exec::recording::RecordingRunner;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn options() -> StageOptions {
        StageOptions {
            script_prefix: "mw-".to_string(),
            merge_policy: MergePolicy::Legacy,
            install_command: "npm install".to_string(),
            skip_install: false,
        }
    }

    fn paths(ws: &TestWorkspace) -> StagingPaths {
        StagingPaths::new(ws.host_dir(), ".modweave")
    }

    /// Host with a linked module `ui` (styles + assets) and a precompiled `core`.
    fn sample() -> TestWorkspace {
        let ws = TestWorkspace::new();
        ws.host(&["ui", "core"], json!({ "title": "Demo" }))
            .host_manifest(json!({ "name": "demo", "dependencies": { "rxjs": "7.0.0" } }))
            .module(
                "ui",
                &[],
                json!({
                    "srcPath": "src",
                    "stylesPath": "src/styles/main.scss",
                    "assetsPath": "assets"
                }),
            )
            .module_file("ui", "src/styles/main.scss", "body {}")
            .module_file("ui", "assets/logo.svg", "<svg/>")
            .module_manifest(
                "ui",
                json!({
                    "dependencies": { "rxjs": "7.8.0" },
                    "scripts": { "mw-lint": "eslint .", "mw-postinstall": "node post.js" }
                }),
            )
            .module(
                "core",
                &[],
                json!({
                    "packageName": "acme",
                    "precompiled": true,
                    "srcPath": "lib/src",
                    "stylesPath": "lib/theme.scss"
                }),
            );
        ws
    }

    fn run(ws: &TestWorkspace, runner: &RecordingRunner) -> ComposeReport {
        let graph = ws.resolve();
        Orchestrator::new(&graph, paths(ws), options(), runner)
            .run()
            .expect("pipeline succeeds")
    }

    mod pipeline {
        use super::*;

        #[test]
        fn steps_and_events_run_in_order() {
            let ws = sample();
            let graph = ws.resolve();
            let seen = Rc::new(RefCell::new(Vec::new()));
            let mut bus = EventBus::new(EventErrorPolicy::Abort);
            let log = Rc::clone(&seen);
            bus.subscribe_all("recorder", move |payload| {
                log.borrow_mut().push(payload.event);
                Ok(())
            });

            let runner = RecordingRunner::default();
            let report = Orchestrator::new(&graph, paths(&ws), options(), &runner)
                .with_bus(bus)
                .run()
                .unwrap();

            assert_eq!(report.steps, StagingStep::ALL.to_vec());
            let expected: Vec<_> = StagingStep::ALL.iter().map(|s| s.event()).collect();
            assert_eq!(*seen.borrow(), expected);
        }

        #[test]
        fn modules_are_linked_not_copied() {
            let ws = sample();
            run(&ws, &RecordingRunner::default());
            let p = paths(&ws);

            let ui = ws.module_dir("ui");
            let link = p.dependencies_dir().join("ui");
            assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
            assert_eq!(fs::read_link(&link).unwrap(), ui.join("src"));

            let core = p.precompiled_dir().join("core");
            assert_eq!(fs::read_link(&core).unwrap(), ws.module_dir("core"));
        }

        #[test]
        fn styles_entry_lists_imports_in_traversal_order() {
            let ws = sample();
            run(&ws, &RecordingRunner::default());

            let styles = fs::read_to_string(paths(&ws).styles_entry()).unwrap();
            insta::assert_snapshot!(styles.trim_end(), @r#"
            /* Generated by modweave. Do not edit: this file is rewritten on every install.
             * Global styles belong in the stylesPath of a module descriptor. */
            @import "../dependencies/ui/styles/main.scss";
            @import "@acme/core/theme.scss";
            "#);
        }

        #[test]
        fn assets_are_linked_per_module() {
            let ws = sample();
            run(&ws, &RecordingRunner::default());

            let link = paths(&ws).assets_dir().join("ui").join("assets");
            assert_eq!(fs::read_link(&link).unwrap(), ws.module_dir("ui").join("assets"));
            assert!(link.join("logo.svg").exists());
        }

        #[test]
        fn manifest_is_merged_and_scripts_collected() {
            let ws = sample();
            let report = run(&ws, &RecordingRunner::default());

            let written = PackageManifest::load(&paths(&ws).manifest_path()).unwrap();
            assert_eq!(written.dependencies["rxjs"], "7.8.0");
            assert_eq!(written.scripts["lint"], "eslint .");
            assert!(!written.scripts.contains_key("postinstall"));
            assert_eq!(written.extra["name"], "demo");
            assert_eq!(report.merge.applied().count(), 1);

            // The host's own manifest is never touched.
            let host = PackageManifest::load(&ws.host_dir().join("package.json")).unwrap();
            assert_eq!(host.dependencies["rxjs"], "7.0.0");
        }

        #[test]
        fn install_and_phase_scripts_use_the_runner() {
            let ws = sample();
            let runner = RecordingRunner::default();
            run(&ws, &runner);

            assert_eq!(runner.commands(), vec!["npm install", "node post.js"]);
            let calls = runner.calls.borrow();
            assert_eq!(calls[0].cwd, paths(&ws).root());
            assert_eq!(calls[1].cwd, ws.module_dir("ui"));
        }

        #[test]
        fn skip_install_does_not_run_install() {
            let ws = sample();
            let graph = ws.resolve();
            let runner = RecordingRunner::default();
            let report = Orchestrator::new(
                &graph,
                paths(&ws),
                StageOptions {
                    skip_install: true,
                    ..options()
                },
                &runner,
            )
            .run()
            .unwrap();

            assert!(report.install_skipped);
            assert_eq!(runner.commands(), vec!["node post.js"]);
        }

        #[test]
        fn index_html_and_compiler_options() {
            let ws = sample();
            run(&ws, &RecordingRunner::default());
            let p = paths(&ws);

            let html = fs::read_to_string(p.index_html()).unwrap();
            assert!(html.contains("<title>Demo</title>"));
            assert!(html.contains("<base href=\"/\">"));

            let options: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(p.compiler_options_path()).unwrap())
                    .unwrap();
            assert_eq!(options["aot"], true);
        }

        #[test]
        fn gitignore_and_env_scaffolding() {
            let ws = sample();
            fs::write(ws.host_dir().join(".gitignore"), "node_modules").unwrap();
            fs::create_dir_all(ws.host_dir().join("env")).unwrap();
            fs::write(ws.host_dir().join("env/environment.json"), "{\"custom\":1}").unwrap();

            run(&ws, &RecordingRunner::default());
            run(&ws, &RecordingRunner::default());

            let gitignore = fs::read_to_string(ws.host_dir().join(".gitignore")).unwrap();
            assert_eq!(
                gitignore,
                "node_modules\n# modweave staging output\n/.modweave\n/.modweave.lock\n"
            );

            let env = fs::read_to_string(ws.host_dir().join("env/environment.json")).unwrap();
            assert_eq!(env, "{\"custom\":1}");
            let prod: serde_json::Value = serde_json::from_str(
                &fs::read_to_string(ws.host_dir().join("env/environment.prod.json")).unwrap(),
            )
            .unwrap();
            assert_eq!(prod["production"], true);
        }

        #[test]
        fn rerun_is_idempotent() {
            let ws = sample();
            let first = run(&ws, &RecordingRunner::default());
            fs::remove_dir_all(paths(&ws).root()).unwrap();
            let second = run(&ws, &RecordingRunner::default());
            let third = run(&ws, &RecordingRunner::default());

            assert_eq!(first.fingerprint, second.fingerprint);
            assert_eq!(second.fingerprint, third.fingerprint);
        }
    }

    mod failures {
        use super::*;

        #[test]
        fn missing_styles_file_aborts() {
            let ws = sample();
            fs::remove_file(ws.module_dir("ui").join("src/styles/main.scss")).unwrap();
            let graph = ws.resolve();
            let runner = RecordingRunner::default();

            let err = Orchestrator::new(&graph, paths(&ws), options(), &runner)
                .run()
                .unwrap_err();
            match err {
                StageError::MissingAsset { module, kind, .. } => {
                    assert_eq!(module.as_str(), "ui");
                    assert_eq!(kind, AssetKind::Styles);
                }
                other => panic!("unexpected error: {other}"),
            }
            // Later steps never ran.
            assert!(!paths(&ws).manifest_path().exists());
            assert!(runner.commands().is_empty());
        }

        #[test]
        fn missing_assets_folder_aborts() {
            let ws = sample();
            fs::remove_dir_all(ws.module_dir("ui").join("assets")).unwrap();
            let graph = ws.resolve();

            let err = Orchestrator::new(&graph, paths(&ws), options(), &RecordingRunner::default())
                .run()
                .unwrap_err();
            assert!(matches!(
                err,
                StageError::MissingAsset {
                    kind: AssetKind::Assets,
                    ..
                }
            ));
        }

        #[test]
        fn asset_folders_with_one_basename_clash() {
            let ws = sample();
            ws.module(
                "ui",
                &[],
                json!({ "srcPath": "src", "assetsPath": ["a/assets", "b/assets"] }),
            )
            .module_file("ui", "a/assets/one.svg", "<svg/>")
            .module_file("ui", "b/assets/two.svg", "<svg/>");
            let graph = ws.resolve();

            let err = Orchestrator::new(&graph, paths(&ws), options(), &RecordingRunner::default())
                .run()
                .unwrap_err();
            match err {
                StageError::AssetFolderClash {
                    module,
                    folder,
                    first,
                    second,
                } => {
                    assert_eq!(module.as_str(), "ui");
                    assert_eq!(folder, "assets");
                    assert_eq!(first, PathBuf::from("a/assets"));
                    assert_eq!(second, PathBuf::from("b/assets"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn failing_install_is_a_command_error() {
            let ws = sample();
            let graph = ws.resolve();
            let runner = RecordingRunner::failing_on("npm");

            let err = Orchestrator::new(&graph, paths(&ws), options(), &runner)
                .run()
                .unwrap_err();
            assert!(matches!(
                err,
                StageError::Command {
                    step: StagingStep::InstallPackages,
                    ..
                }
            ));
        }

        #[test]
        fn aborting_subscriber_stops_pipeline() {
            let ws = sample();
            let graph = ws.resolve();
            let mut bus = EventBus::new(EventErrorPolicy::Abort);
            bus.subscribe(LifecycleEvent::SymlinksCreated, "veto", |_| {
                Err(HandlerError::new("nope"))
            });

            let err = Orchestrator::new(&graph, paths(&ws), options(), &RecordingRunner::default())
                .with_bus(bus)
                .run()
                .unwrap_err();
            assert!(matches!(err, StageError::Event(_)));
            assert!(!paths(&ws).styles_entry().exists());
        }

        #[test]
        fn warning_subscriber_is_reported() {
            let ws = sample();
            let graph = ws.resolve();
            let mut bus = EventBus::new(EventErrorPolicy::Warn);
            bus.subscribe(LifecycleEvent::SymlinksCreated, "flaky", |_| {
                Err(HandlerError::new("nope"))
            });

            let report = Orchestrator::new(&graph, paths(&ws), options(), &RecordingRunner::default())
                .with_bus(bus)
                .run()
                .unwrap();
            assert_eq!(report.event_failures.len(), 1);
            assert_eq!(report.steps.len(), StagingStep::ALL.len());
        }

        #[test]
        fn concurrent_run_is_locked_out() {
            let ws = sample();
            let graph = ws.resolve();
            let _held = StagingLock::acquire(&paths(&ws)).unwrap();

            let err = Orchestrator::new(&graph, paths(&ws), options(), &RecordingRunner::default())
                .run()
                .unwrap_err();
            assert!(matches!(err, StageError::Lock(LockError::AlreadyLocked(_))));
        }
    }

    mod cleaning {
        use super::*;

        #[test]
        fn clean_keeps_install_dir_on_request() {
            let ws = sample();
            let p = paths(&ws);
            fs::create_dir_all(p.root().join(INSTALL_DIR).join("rxjs")).unwrap();
            fs::write(p.root().join("stale.txt"), "x").unwrap();

            clean_staging(&p, true).unwrap();
            assert!(p.root().join(INSTALL_DIR).exists());
            assert!(!p.root().join("stale.txt").exists());

            clean_staging(&p, false).unwrap();
            assert!(!p.root().join(INSTALL_DIR).exists());
            assert!(p.root().exists());
        }

        #[test]
        fn clean_removes_links_without_following_them() {
            let ws = sample();
            run(&ws, &RecordingRunner::default());

            clean_staging(&paths(&ws), false).unwrap();
            assert!(ws.module_dir("ui").join("src/styles/main.scss").exists());
            assert!(ws.module_dir("ui").join("assets/logo.svg").exists());
        }
    }
}
