//! core
//!
//! Core domain types, schemas, and pure operations for vmn.
//!
//! # Modules
//!
//! - [`version`] - Version tuples and the next-version generator
//! - [`template`] - Version-format templates
//! - [`naming`] - App names and the tag naming scheme
//! - [`types`] - Repository state types
//! - [`metadata`] - Stamp records and config documents
//! - [`app`] - App layout resolution
//! - [`config`] - Tool settings schema and loading
//! - [`ops`] - Stamping lock
//! - [`paths`] - Centralized path routing for vmn storage
//!
//! # Design Principles
//!
//! - Nothing in this layer talks to a VCS
//! - Strong typing keeps invalid names and versions unrepresentable
//! - Persisted formats are fixed; changing them breaks existing repositories

pub mod app;
pub mod config;
pub mod metadata;
pub mod naming;
pub mod ops;
pub mod paths;
pub mod template;
pub mod types;
pub mod version;
