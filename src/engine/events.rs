//! engine::events
//!
//! Lifecycle event bus.
//!
//! The orchestrator triggers one [`LifecycleEvent`] after each pipeline step.
//! Subscribers observe an immutable [`EventPayload`] snapshot; they can run
//! arbitrary side effects but cannot skip, reorder, or alter steps.
//!
//! # Failure Policy
//!
//! A failing subscriber is handled by the bus's [`EventErrorPolicy`], the
//! same way for every event:
//! - `Warn`: logged and recorded, the pipeline continues
//! - `Abort`: returned as an error, the pipeline stops
//!
//! # Hooks
//!
//! `[[hooks]]` entries from the project config subscribe shell commands. The
//! command receives the event name in `MODWEAVE_EVENT` and the payload as
//! JSON in `MODWEAVE_EVENT_PAYLOAD`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::exec::{CommandRunner, CommandSpec};
use crate::core::config::{EventErrorPolicy, HookConfig};
use crate::core::graph::{ModuleGraph, ModuleNode};
use crate::core::manifest::PackageManifest;

pub use crate::core::types::LifecycleEvent;

/// Environment variable carrying the event name to hook commands.
pub const EVENT_ENV_VAR: &str = "MODWEAVE_EVENT";

/// Environment variable carrying the JSON payload to hook commands.
pub const PAYLOAD_ENV_VAR: &str = "MODWEAVE_EVENT_PAYLOAD";

/// Snapshot of one module, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSnapshot {
    pub name: String,
    pub package_name: Option<String>,
    pub base_path: PathBuf,
    pub src_root: PathBuf,
    pub is_host: bool,
    pub is_entry: bool,
    pub precompiled: bool,
    pub styles_path: Option<PathBuf>,
    pub assets_paths: Vec<PathBuf>,
    pub dependencies: Vec<String>,
}

impl ModuleSnapshot {
    pub fn of(node: &ModuleNode, graph: &ModuleGraph) -> Self {
        Self {
            name: node.name.to_string(),
            package_name: node.package_name.clone(),
            base_path: node.base_path.clone(),
            src_root: node.src_root(),
            is_host: node.is_host,
            is_entry: node.is_entry,
            precompiled: node.precompiled,
            styles_path: node.styles_path.clone(),
            assets_paths: node.assets_paths.clone(),
            dependencies: graph
                .dependencies_of(node.id())
                .map(|d| d.name.to_string())
                .collect(),
        }
    }
}

/// Data handed to every subscriber of an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub event: LifecycleEvent,
    pub emitted_at: DateTime<Utc>,
    pub host: ModuleSnapshot,
    /// Every module, in traversal order.
    pub modules: Vec<ModuleSnapshot>,
    /// The host manifest as composed so far.
    pub manifest: PackageManifest,
    pub staging_root: PathBuf,
}

impl EventPayload {
    pub fn snapshot(
        event: LifecycleEvent,
        graph: &ModuleGraph,
        manifest: &PackageManifest,
        staging_root: &Path,
    ) -> Self {
        Self {
            event,
            emitted_at: Utc::now(),
            host: ModuleSnapshot::of(graph.host(), graph),
            modules: graph
                .all_recursive_dependencies()
                .map(|m| ModuleSnapshot::of(m, graph))
                .collect(),
            manifest: manifest.clone(),
            staging_root: staging_root.to_path_buf(),
        }
    }
}

/// A subscriber failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors surfaced by the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("subscriber '{subscriber}' failed on {event}: {source}")]
    HandlerFailed {
        event: LifecycleEvent,
        subscriber: String,
        source: HandlerError,
    },

    #[error("unknown lifecycle event '{0}'")]
    UnknownEvent(String),
}

/// A subscriber callback.
pub type Handler = Box<dyn Fn(&EventPayload) -> Result<(), HandlerError>>;

struct Subscriber {
    label: String,
    handler: Handler,
}

/// Named-event dispatch.
///
/// Subscribers for a specific event run before wildcard subscribers; within
/// each group, in registration order.
///
/// # Example
///
/// ```
/// use modweave::core::config::EventErrorPolicy;
/// use modweave::engine::events::{EventBus, LifecycleEvent};
///
/// let mut bus = EventBus::new(EventErrorPolicy::Warn);
/// bus.subscribe(LifecycleEvent::SymlinksCreated, "log", |payload| {
///     println!("{} modules linked", payload.modules.len());
///     Ok(())
/// });
/// assert_eq!(bus.subscriber_count(LifecycleEvent::SymlinksCreated), 1);
/// ```
pub struct EventBus {
    policy: EventErrorPolicy,
    handlers: BTreeMap<&'static str, Vec<Subscriber>>,
    wildcard: Vec<Subscriber>,
    failures: Vec<EventError>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("policy", &self.policy)
            .field("events", &self.handlers.keys().collect::<Vec<_>>())
            .field("wildcard", &self.wildcard.len())
            .field("failures", &self.failures)
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventErrorPolicy::default())
    }
}

impl EventBus {
    pub fn new(policy: EventErrorPolicy) -> Self {
        Self {
            policy,
            handlers: BTreeMap::new(),
            wildcard: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn policy(&self) -> EventErrorPolicy {
        self.policy
    }

    /// Subscribe to one event.
    pub fn subscribe<F>(&mut self, event: LifecycleEvent, label: impl Into<String>, handler: F)
    where
        F: Fn(&EventPayload) -> Result<(), HandlerError> + 'static,
    {
        self.handlers
            .entry(event.name())
            .or_default()
            .push(Subscriber {
                label: label.into(),
                handler: Box::new(handler),
            });
    }

    /// Subscribe to every event.
    pub fn subscribe_all<F>(&mut self, label: impl Into<String>, handler: F)
    where
        F: Fn(&EventPayload) -> Result<(), HandlerError> + 'static,
    {
        self.wildcard.push(Subscriber {
            label: label.into(),
            handler: Box::new(handler),
        });
    }

    /// Subscribe configured hook commands, run in `cwd`.
    pub fn subscribe_hooks(
        &mut self,
        hooks: &[HookConfig],
        runner: Rc<dyn CommandRunner>,
        cwd: &Path,
    ) -> Result<(), EventError> {
        for hook in hooks {
            let runner = Rc::clone(&runner);
            let command = hook.command.clone();
            let cwd = cwd.to_path_buf();
            let label = format!("hook: {}", hook.command);

            let handler = move |payload: &EventPayload| -> Result<(), HandlerError> {
                let json = serde_json::to_string(payload)
                    .map_err(|e| HandlerError::new(format!("cannot serialize payload: {e}")))?;
                let spec = CommandSpec::new(command.as_str(), cwd.as_path())
                    .env(EVENT_ENV_VAR, payload.event.name())
                    .env(PAYLOAD_ENV_VAR, json);
                runner
                    .run(&spec)
                    .map_err(|e| HandlerError::new(e.to_string()))
            };

            if hook.event == HookConfig::ALL_EVENTS {
                self.subscribe_all(label, handler);
            } else {
                let event = LifecycleEvent::from_name(&hook.event)
                    .ok_or_else(|| EventError::UnknownEvent(hook.event.clone()))?;
                self.subscribe(event, label, handler);
            }
        }
        Ok(())
    }

    pub fn subscriber_count(&self, event: LifecycleEvent) -> usize {
        self.handlers.get(event.name()).map_or(0, Vec::len) + self.wildcard.len()
    }

    /// Notify every subscriber of `event`.
    ///
    /// # Errors
    ///
    /// Under [`EventErrorPolicy::Abort`], returns the first subscriber
    /// failure; the remaining subscribers are not called.
    pub fn trigger_event(
        &mut self,
        event: LifecycleEvent,
        payload: &EventPayload,
    ) -> Result<(), EventError> {
        let specific = self.handlers.get(event.name()).into_iter().flatten();
        let mut failures = Vec::new();

        for subscriber in specific.chain(self.wildcard.iter()) {
            debug!(event = %event, subscriber = %subscriber.label, "notifying subscriber");
            if let Err(source) = (subscriber.handler)(payload) {
                let err = EventError::HandlerFailed {
                    event,
                    subscriber: subscriber.label.clone(),
                    source,
                };
                match self.policy {
                    EventErrorPolicy::Abort => return Err(err),
                    EventErrorPolicy::Warn => {
                        warn!("{}", err);
                        failures.push(err);
                    }
                }
            }
        }

        self.failures.extend(failures);
        Ok(())
    }

    /// Failures tolerated under [`EventErrorPolicy::Warn`] so far.
    pub fn failures(&self) -> &[EventError] {
        &self.failures
    }
}
