//! engine::scan
//!
//! Discovery of the caller's dependency-repository states.
//!
//! # Architecture
//!
//! For every [`ScanSpec`] of an app layout, each named entry (or every entry
//! when no names are given) that is itself a git or mercurial working tree is
//! opened and recorded under its path relative to the main repository root:
//! `.` for the main repository, `../lib` for a sibling.
//!
//! # Invariants
//!
//! - Scan is read-only
//! - Plain directories and unreadable repositories are skipped, never fatal;
//!   a missing dependency is reported later by the builder
//! - A repository reachable through several specs is recorded once

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::EngineError;
use crate::core::app::{relative_key, ScanSpec};
use crate::core::types::{RepoState, RepoStates};
use crate::vcs::{Backend, VersionControl};

/// Record the state of every repository found through `specs`.
pub fn scan_repos(specs: &[ScanSpec], root: &Path) -> Result<RepoStates, EngineError> {
    let mut states = RepoStates::new();

    for spec in specs {
        for candidate in candidates(spec)? {
            let key = relative_key(root, &candidate);
            if states.contains_key(&key) {
                continue;
            }

            match read_state(&candidate) {
                Ok(Some(state)) => {
                    debug!(repo = %key, hash = %state.hash, "found repository");
                    states.insert(key, state);
                }
                Ok(None) => {}
                Err(e) => warn!(path = %candidate.display(), error = %e, "skipping repository"),
            }
        }
    }

    Ok(states)
}

fn candidates(spec: &ScanSpec) -> Result<Vec<PathBuf>, EngineError> {
    if let Some(entries) = &spec.entries {
        return Ok(entries.iter().map(|name| spec.dir.join(name)).collect());
    }

    let read = match std::fs::read_dir(&spec.dir) {
        Ok(read) => read,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(EngineError::Io {
                path: spec.dir.clone(),
                source,
            })
        }
    };

    let mut dirs: Vec<PathBuf> = read
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn read_state(dir: &Path) -> Result<Option<RepoState>, crate::vcs::VcsError> {
    let Some(backend) = Backend::open_exact(dir)? else {
        return Ok(None);
    };
    Ok(Some(RepoState::new(
        backend.changeset()?,
        backend.remote()?,
        backend.kind(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn git_init(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .arg("-C")
                .arg(dir)
                .args(args)
                .status()
                .unwrap();
            assert!(status.success());
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "Test"]);
        run(&["commit", "-q", "--allow-empty", "-m", "initial"]);
    }

    #[test]
    fn finds_main_repo_and_siblings() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("main");
        git_init(&main);
        git_init(&temp.path().join("lib"));
        std::fs::create_dir_all(temp.path().join("plain")).unwrap();

        let specs = vec![ScanSpec {
            dir: main.join(".."),
            entries: None,
        }];
        let states = scan_repos(&specs, &main).unwrap();

        let keys: Vec<&str> = states.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![".", "../lib"]);
        assert_eq!(states["."].hash.len(), 40);
        assert!(states["."].remote.is_none());
    }

    #[test]
    fn named_entries_that_are_missing_are_skipped() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("main");
        git_init(&main);

        let specs = vec![ScanSpec {
            dir: main.join("../deps"),
            entries: Some(vec!["absent".into()]),
        }];
        let states = scan_repos(&specs, &main).unwrap();
        assert!(states.is_empty());
    }
}
