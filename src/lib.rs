//! vmn - version stamping across repositories
//!
//! vmn records, for an app, the exact changeset of every repository it is
//! built from, and publishes that record as a commit and a set of tags. A
//! later `goto` uses the record to put every repository back where it was.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Stamping, dependency sync and the release gate
//! - [`core`] - Versions, templates, naming, stamp records and settings
//! - [`vcs`] - The version-control backends (git, mercurial, in-memory mock)
//! - [`ui`] - Output and logging
//!
//! # Correctness Invariants
//!
//! 1. Versioned tags are never overwritten
//! 2. A failed stamp leaves no commit or tag behind
//! 3. Stamping the same dependency state twice yields the same version

pub mod cli;
pub mod core;
pub mod engine;
pub mod ui;
pub mod vcs;
