//! modweave - compose linked modules into a staged host build tree
//!
//! A host application declares the modules it is built from. modweave
//! resolves the full module graph, merges every module's package manifest
//! into one, links module sources and assets into a staging directory, and
//! runs the package manager there. Subscribers can observe each step of the
//! pipeline through a named-event bus.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Manifest merging, the staging pipeline, and the event bus
//! - [`core`] - Domain types, descriptors, the module graph, and configuration
//! - [`ui`] - User-facing output
//! - [`logging`] - `tracing` subscriber setup
//!
//! # Invariants
//!
//! 1. Every generated artifact lists modules in the same traversal order
//! 2. Module sources are linked into the staging tree, never copied
//! 3. Re-running the pipeline from scratch yields the same staging tree
//! 4. Only one pipeline runs per host at a time

pub mod cli;
pub mod core;
pub mod engine;
pub mod logging;
pub mod ui;
