//! engine::init
//!
//! Start vmn tracking in a repository.

use std::fs;

use tracing::info;

use super::{guard_local_edits, paths_of, EngineError};
use crate::core::config::Config;
use crate::vcs::VersionControl;

/// Commit message of the tracking commit.
pub const INIT_COMMIT_MESSAGE: &str = "Initialized vmn tracking";

/// Result of an init.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// Tracking was started; carries the tracking commit.
    Initialized { changeset: String },

    /// `.vmn` already existed; nothing was done.
    AlreadyInitialized,
}

/// Create `.vmn`, commit it and push.
pub fn init(vcs: &dyn VersionControl, config: &Config) -> Result<InitOutcome, EngineError> {
    let paths = paths_of(vcs);
    guard_local_edits(vcs, false)?;

    if paths.is_initialized() {
        info!(root = %paths.root.display(), "vmn tracking is already initialized");
        return Ok(InitOutcome::AlreadyInitialized);
    }

    let marker = paths.init_marker_path(&vcs.changeset()?);
    let vmn_dir = paths.vmn_dir();
    fs::create_dir_all(&vmn_dir).map_err(|source| EngineError::Io {
        path: vmn_dir.clone(),
        source,
    })?;
    fs::write(&marker, "").map_err(|source| EngineError::Io {
        path: marker.clone(),
        source,
    })?;

    let changeset = vcs.commit(INIT_COMMIT_MESSAGE, &config.author(), &[vmn_dir])?;
    vcs.push(&[])?;

    info!(root = %paths.root.display(), %changeset, "initialized vmn tracking");
    Ok(InitOutcome::Initialized { changeset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::MockVcs;
    use tempfile::TempDir;

    #[test]
    fn creates_marker_and_commits() {
        let temp = TempDir::new().unwrap();
        let vcs = MockVcs::new(temp.path()).unwrap();
        let head = vcs.changeset().unwrap();

        let outcome = init(&vcs, &Config::default()).unwrap();

        assert!(matches!(outcome, InitOutcome::Initialized { .. }));
        assert!(temp.path().join(".vmn").join(&head).is_file());
        assert_eq!(vcs.head_message(), INIT_COMMIT_MESSAGE);
        assert_eq!(vcs.outgoing_unpushed_changes(false).unwrap(), None);
    }

    #[test]
    fn second_init_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let vcs = MockVcs::new(temp.path()).unwrap();
        init(&vcs, &Config::default()).unwrap();
        let commits = vcs.commit_count();

        let outcome = init(&vcs, &Config::default()).unwrap();

        assert_eq!(outcome, InitOutcome::AlreadyInitialized);
        assert_eq!(vcs.commit_count(), commits);
    }

    #[test]
    fn refuses_with_pending_changes() {
        let temp = TempDir::new().unwrap();
        let vcs = MockVcs::new(temp.path()).unwrap();
        vcs.set_pending_changes(Some("M src/lib.rs"));

        let err = init(&vcs, &Config::default()).unwrap_err();

        assert!(matches!(err, EngineError::LocalEditGuard(_)));
        assert!(!temp.path().join(".vmn").exists());
    }
}
