//! engine
//!
//! Stamping, dependency sync and the release gate.
//!
//! # Architecture
//!
//! A stamp runs through a fixed pipeline:
//!
//! ```text
//! Scan -> Lock -> Match -> [Build -> Publish]* -> Unlock
//! ```
//!
//! 1. **Scan** ([`scan`]): record the state of every repository the app may
//!    depend on
//! 2. **Lock** ([`StampContext::acquire`]): serialize local stampers
//! 3. **Match** ([`matcher`]): reuse an earlier stamp whose provenance equals
//!    the current state
//! 4. **Build** ([`builder`]): compute the next version record
//! 5. **Publish** ([`publish`]): commit, tag and push; roll back on conflict
//!
//! Steps 4 and 5 repeat under the bounded retry policy in [`stamp`].
//!
//! [`goto`] restores a workspace to a recorded state and never takes the lock.
//!
//! # Invariants
//!
//! - A failed publish attempt leaves no commit or tag behind
//! - Versioned tags are never overwritten
//! - Every VCS access goes through [`VersionControl`]

pub mod builder;
pub mod goto;
pub mod init;
pub mod matcher;
pub mod publish;
pub mod release;
pub mod scan;
pub mod show;
pub mod stamp;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::app::LayoutError;
use crate::core::config::Config;
use crate::core::metadata::schema::MetadataError;
use crate::core::metadata::store::StoreError;
use crate::core::naming::NameError;
use crate::core::ops::{LockError, RepoLock};
use crate::core::paths::VmnPaths;
use crate::core::template::TemplateError;
use crate::core::version::VersionError;
use crate::vcs::{VcsError, VersionControl};

pub use goto::{goto, sync_dependencies, GotoRequest};
pub use init::{init, InitOutcome};
pub use matcher::find_matching_version;
pub use release::{release, ReleaseOutcome, ReleaseRequest};
pub use scan::scan_repos;
pub use show::{show, ShowFormat, ShowRequest};
pub use stamp::{stamp, StampOutcome, StampRequest};

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Name(#[from] NameError),

    /// A repository the app depends on is not present on disk.
    #[error(
        "dependency repository {key} is declared but does not exist at {}; clone it and rerun",
        path.display()
    )]
    MissingDependency { key: String, path: PathBuf },

    /// A tag of this attempt already existed.
    #[error("tag conflict: {message}")]
    TagConflict { message: String },

    /// The remote rejected this attempt.
    #[error("push conflict: {message}")]
    PushConflict { message: String },

    /// One or more repositories failed to sync.
    #[error("{}", summarize_failures(.failures))]
    PartialSyncFailure { failures: Vec<SyncFailure> },

    /// Uncommitted or unpushed work blocks the operation.
    #[error("{0}")]
    LocalEditGuard(String),

    /// Every stamping attempt failed.
    #[error("failed to stamp {app} after {attempts} attempt(s)")]
    StampingFailed { app: String, attempts: u32 },

    #[error("vmn tracking is not initialized in {}", .0.display())]
    NotInitialized(PathBuf),

    /// No stamp record behind the tag an app resolves to.
    #[error("no such app: {app} (tag {tag} not found)")]
    UnknownApp { app: String, tag: String },

    /// The release branch policy refused the operation.
    #[error("{0}")]
    ReleasePolicy(String),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One repository that failed to sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Repository key relative to the main repository.
    pub repo: String,
    pub reason: String,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.repo, self.reason)
    }
}

fn summarize_failures(failures: &[SyncFailure]) -> String {
    let mut out = format!("failed to sync {} repositor", failures.len());
    out.push_str(if failures.len() == 1 { "y" } else { "ies" });
    for failure in failures {
        out.push_str("\n  ");
        out.push_str(&failure.to_string());
    }
    out
}

/// Everything a stamp needs: the backend, settings and the held lock.
///
/// The lock is released when the context is dropped.
pub struct StampContext<'a> {
    pub vcs: &'a dyn VersionControl,
    pub config: &'a Config,
    pub paths: VmnPaths,
    lock: RepoLock,
}

impl<'a> StampContext<'a> {
    /// Block until the repository lock is free, then hold it.
    pub fn acquire(vcs: &'a dyn VersionControl, config: &'a Config) -> Result<Self, EngineError> {
        let paths = paths_of(vcs);
        let lock = RepoLock::wait(&paths)?;
        tracing::info!(lock = %lock.path().display(), "locked");

        Ok(Self {
            vcs,
            config,
            paths,
            lock,
        })
    }

    pub fn lock(&self) -> &RepoLock {
        &self.lock
    }
}

impl Drop for StampContext<'_> {
    fn drop(&mut self) {
        tracing::debug!(lock = %self.lock.path().display(), "releasing lock");
    }
}

/// Storage paths for the repository behind `vcs`.
pub fn paths_of(vcs: &dyn VersionControl) -> VmnPaths {
    VmnPaths::new(vcs.root().to_path_buf(), vcs.vcs_dir())
}

/// Fail with [`EngineError::NotInitialized`] unless `.vmn` exists.
pub fn ensure_initialized(paths: &VmnPaths) -> Result<(), EngineError> {
    if paths.is_initialized() {
        Ok(())
    } else {
        Err(EngineError::NotInitialized(paths.root.clone()))
    }
}

/// Refuse to continue if the working copy has local edits or unpushed work.
pub fn guard_local_edits(
    vcs: &dyn VersionControl,
    skip_detached_check: bool,
) -> Result<(), EngineError> {
    if let Some(pending) = vcs.pending_local_changes()? {
        return Err(EngineError::LocalEditGuard(pending));
    }
    if let Some(outgoing) = vcs.outgoing_unpushed_changes(skip_detached_check)? {
        return Err(EngineError::LocalEditGuard(outgoing));
    }
    Ok(())
}
