//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All user-facing output goes through this module so that `--quiet` and
//! `--debug` are honored consistently. Diagnostics for developers go through
//! `tracing` instead.

pub mod output;
