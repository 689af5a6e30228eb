//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--host <path>`: Host descriptor file or directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// modweave - compose linked modules into a staged host build tree
#[derive(Parser, Debug)]
#[command(name = "mw")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if mw was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Host descriptor file, or the directory containing it
    #[arg(long, global = true, value_name = "PATH")]
    pub host: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve modules and rebuild the staging tree
    #[command(
        name = "install",
        visible_alias = "i",
        long_about = "Resolve the host's module graph and rebuild its staging tree.\n\n\
            Module sources are linked into the staging directory, style sheets and \
            assets are referenced, package manifests are merged, and the package \
            manager is run in the staging directory. Re-running install from scratch \
            is always safe.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Stage the host in the current directory
    mw install

    # Stage a host elsewhere, without running the package manager
    mw --host ../shell install --skip-install"
    )]
    Install {
        /// Do not run the package install command
        #[arg(long)]
        skip_install: bool,
    },

    /// Show the resolved module graph
    #[command(
        name = "graph",
        long_about = "Resolve the host's module graph and print it in traversal order.\n\n\
            Traversal order is the order used for every generated artifact: \
            dependencies in declaration order, depth first, each module once.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Print the modules as a tree
    mw graph

    # Machine-readable output
    mw graph --json"
    )]
    Graph {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove the staging tree
    #[command(name = "clean")]
    Clean,

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for mw commands.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    mw completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    mw completion zsh >> ~/.zshrc

    # Fish
    mw completion fish > ~/.config/fish/completions/mw.fish

    # PowerShell
    mw completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}
