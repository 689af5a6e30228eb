//! core
//!
//! Core domain types, schemas, and resolution for modweave.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ModuleName, ModuleId, Fingerprint
//! - [`descriptor`] - Host and module descriptor files
//! - [`manifest`] - Package manifest model
//! - [`version`] - Version string comparison
//! - [`graph`] - Module graph representation and resolution
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for the staging tree
//! - [`lock`] - Exclusive staging lock
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Resolution is deterministic

pub mod config;
pub mod descriptor;
pub mod graph;
pub mod lock;
pub mod manifest;
pub mod paths;
pub mod types;
pub mod version;

#[cfg(test)]
pub(crate) mod fixtures;
