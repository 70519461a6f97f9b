//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Results printed to stdout
//! - [`logging`] - Diagnostic logging to stderr
//!
//! # Design
//!
//! Results (versions, records) go to stdout so they can be captured by
//! scripts. Progress and diagnostics go through `tracing` to stderr.

pub mod logging;
pub mod output;
