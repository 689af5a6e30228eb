//! engine::exec
//!
//! External process execution.
//!
//! The orchestrator never spawns processes directly. Package installation,
//! install phase scripts, and event hooks all go through a [`CommandRunner`],
//! so tests can substitute a runner that records instead of executing.
//!
//! Commands are shell strings, run to completion with inherited stdio. There
//! is no timeout; a non-zero exit is a [`RunError::Failed`].

use std::io;
use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;
use tracing::debug;

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to start '{command}': {source}")]
    Spawn { command: String, source: io::Error },

    #[error("command '{command}' {}", exit_label(.code))]
    Failed { command: String, code: Option<i32> },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

/// A shell command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Runs shell commands.
pub trait CommandRunner {
    /// Run a command to completion.
    fn run(&self, spec: &CommandSpec) -> Result<(), RunError>;
}

/// Runs commands through the platform shell (`sh -c` or `cmd /C`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, spec: &CommandSpec) -> Result<(), RunError> {
        debug!(command = %spec.command, cwd = %spec.cwd.display(), "running command");

        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.args(["/C", &spec.command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", &spec.command]);
            c
        };

        let status = command
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().map(|(k, v)| (k, v)))
            .status()
            .map_err(|e| RunError::Spawn {
                command: spec.command.clone(),
                source: e,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(RunError::Failed {
                command: spec.command.clone(),
                code: status.code(),
            })
        }
    }
}
