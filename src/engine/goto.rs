//! engine::goto
//!
//! Restore a workspace to a recorded stamp.
//!
//! # Phases
//!
//! 1. **Clone** (bounded pool): every dependency missing on disk is cloned
//!    from its recorded remote
//! 2. **Sync** (bounded pool): every dependency present on disk is pulled and
//!    moved to its pinned changeset, or to the tip of its active branch when
//!    unpinned
//!
//! # Invariants
//!
//! - Fail-slow: every repository is attempted; failures are collected and
//!   reported together as [`EngineError::PartialSyncFailure`]
//! - A repository with local edits or unpushed commits is left untouched
//! - A repository whose checkout fails after a pull is put back on the
//!   changeset it had before (best effort)
//! - A repository whose clone failed is not synced

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use super::matcher::MAIN_REPO_KEY;
use super::{ensure_initialized, guard_local_edits, paths_of, EngineError, SyncFailure};
use crate::core::app::normalize;
use crate::core::config::Config;
use crate::core::naming::{moving_tag_name, version_tag_name, AppName};
use crate::core::types::SyncTarget;
use crate::vcs::{Backend, VcsError, VersionControl};

/// Parameters of a goto.
#[derive(Debug, Clone, Default)]
pub struct GotoRequest {
    pub name: String,

    /// Formatted version to restore; `None` restores the branch tip.
    pub version: Option<String>,

    /// `name` is a root app; `version` is then its integer version.
    pub root: bool,
}

/// Restore the main repository and every dependency to the stamp `request`
/// names.
pub fn goto(
    vcs: &dyn VersionControl,
    config: &Config,
    request: &GotoRequest,
) -> Result<(), EngineError> {
    let paths = paths_of(vcs);
    ensure_initialized(&paths)?;
    guard_local_edits(vcs, true)?;

    let name = AppName::new(request.name.as_str())?;
    let tag = match &request.version {
        Some(version) => {
            if request.root && version.parse::<u64>().is_err() {
                return Err(EngineError::UnknownApp {
                    app: name.to_string(),
                    tag: version_tag_name(&name, version),
                });
            }
            version_tag_name(&name, version)
        }
        None => moving_tag_name(&name, &vcs.active_branch(false)?),
    };

    let info = vcs
        .version_info_of(&tag)?
        .ok_or_else(|| EngineError::UnknownApp {
            app: name.to_string(),
            tag: tag.clone(),
        })?;

    let pinned = request.version.is_some();
    let targets: BTreeMap<String, SyncTarget> = info
        .stamping
        .app
        .changesets
        .iter()
        .filter(|(key, _)| key.as_str() != MAIN_REPO_KEY)
        .map(|(key, state)| (key.clone(), SyncTarget::from_state(state, pinned)))
        .collect();

    if !targets.is_empty() {
        sync_dependencies(&paths.root, &targets, config)?;
    }

    if pinned {
        vcs.checkout(&tag)?;
        info!(app = %name, %tag, "checked out");
    } else {
        let rev = vcs.checkout_branch_tip()?;
        info!(app = %name, %rev, "updated to branch tip");
    }
    Ok(())
}

/// Clone and sync every repository in `targets`, keyed relative to `root`.
pub fn sync_dependencies(
    root: &Path,
    targets: &BTreeMap<String, SyncTarget>,
    config: &Config,
) -> Result<(), EngineError> {
    let remote_name = config.remote();
    let items: Vec<(String, PathBuf, &SyncTarget)> = targets
        .iter()
        .map(|(key, target)| (key.clone(), normalize(&root.join(key)), target))
        .collect();

    let mut failures = Vec::new();

    // Phase 1: clone what is missing.
    let missing: Vec<&(String, PathBuf, &SyncTarget)> =
        items.iter().filter(|(_, path, _)| !path.exists()).collect();
    let clone_results: Vec<(String, Result<(), String>)> =
        run_pool(missing.len(), config.clone_workers(), || {
            missing
                .par_iter()
                .map(|(key, path, target)| (key.clone(), clone_one(key, path, target)))
                .collect()
        })?;

    let mut failed_clones = Vec::new();
    for (key, result) in clone_results {
        if let Err(reason) = result {
            warn!(repo = %key, %reason, "clone failed");
            failed_clones.push(key.clone());
            failures.push(SyncFailure { repo: key, reason });
        }
    }

    // Phase 2: pull and check out everything that is on disk.
    let present: Vec<&(String, PathBuf, &SyncTarget)> = items
        .iter()
        .filter(|(key, _, _)| !failed_clones.contains(key))
        .collect();
    let sync_results: Vec<(String, Result<(), String>)> =
        run_pool(present.len(), config.pull_workers(), || {
            present
                .par_iter()
                .map(|(key, path, target)| {
                    (key.clone(), sync_one(key, path, target, &remote_name))
                })
                .collect()
        })?;

    for (key, result) in sync_results {
        if let Err(reason) = result {
            warn!(repo = %key, %reason, "sync failed");
            failures.push(SyncFailure { repo: key, reason });
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(EngineError::PartialSyncFailure { failures })
    }
}

/// Run `work` on a pool of `min(jobs, limit)` threads.
fn run_pool<T, F>(jobs: usize, limit: usize, work: F) -> Result<Vec<T>, EngineError>
where
    T: Send,
    F: FnOnce() -> Vec<T> + Send,
{
    if jobs == 0 {
        return Ok(Vec::new());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.min(limit).max(1))
        .build()?;
    Ok(pool.install(work))
}

fn clone_one(key: &str, path: &Path, target: &SyncTarget) -> Result<(), String> {
    let Some(remote) = &target.remote else {
        return Err("no remote recorded; cannot clone".to_string());
    };

    info!(repo = %key, %remote, "cloning");
    match Backend::clone_repo(target.vcs_type, remote, path) {
        Ok(()) | Err(VcsError::AlreadyExists { .. }) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

fn sync_one(key: &str, path: &Path, target: &SyncTarget, remote_name: &str) -> Result<(), String> {
    let backend = match Backend::open_exact(path) {
        Ok(Some(backend)) => backend.with_remote_name(remote_name),
        Ok(None) => {
            info!(repo = %key, "not a repository; skipping");
            return Ok(());
        }
        Err(e) => return Err(e.to_string()),
    };

    if let Some(pending) = backend.pending_local_changes().map_err(|e| e.to_string())? {
        return Err(pending);
    }
    if let Some(outgoing) = backend
        .outgoing_unpushed_changes(true)
        .map_err(|e| e.to_string())?
    {
        return Err(outgoing);
    }

    let before = backend.changeset().map_err(|e| e.to_string())?;

    info!(repo = %key, "pulling");
    let result = backend.pull().and_then(|()| match &target.hash {
        Some(hash) => backend.checkout(hash).map(|()| hash.clone()),
        None => backend.checkout_branch_tip(),
    });

    match result {
        Ok(rev) => {
            info!(repo = %key, %rev, "updated");
            Ok(())
        }
        Err(e) => {
            if let Err(restore) = backend.checkout(&before) {
                warn!(repo = %key, error = %restore, "failed to restore previous changeset");
            }
            Err(e.to_string())
        }
    }
}
