//! core::types
//!
//! Strong types for repository state.
//!
//! # Types
//!
//! - [`VcsKind`] - Which version-control system manages a repository
//! - [`RepoState`] - One repository's pinned changeset and origin
//! - [`RepoStates`] - Repository states keyed by path relative to the main repo
//! - [`SyncTarget`] - One repository to materialize during `goto`
//!
//! Relative paths use `.` for the main repository and `../<dir>` for its
//! siblings. The same keys appear in stamp records, so they are plain strings
//! rather than `PathBuf`s.
//!
//! # Example
//!
//! ```
//! use vmn::core::types::{RepoState, RepoStates, VcsKind};
//!
//! let mut states = RepoStates::new();
//! states.insert(
//!     ".".to_string(),
//!     RepoState::new("abc123", Some("git@host:repo".into()), VcsKind::Git),
//! );
//!
//! let yaml = serde_yaml::to_string(&states).unwrap();
//! assert!(yaml.contains("vcs_type: git"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown vcs type '{0}': expected git or mercurial")]
    UnknownVcsKind(String),
}

/// Version-control system managing a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Mercurial,
}

impl VcsKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VcsKind::Git => "git",
            VcsKind::Mercurial => "mercurial",
        }
    }

    /// Name of the metadata directory inside a working tree.
    pub fn metadata_dir(self) -> &'static str {
        match self {
            VcsKind::Git => ".git",
            VcsKind::Mercurial => ".hg",
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VcsKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(VcsKind::Git),
            "mercurial" | "hg" => Ok(VcsKind::Mercurial),
            other => Err(TypeError::UnknownVcsKind(other.to_string())),
        }
    }
}

/// A repository's state at stamp time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    /// Changeset identifier (full hash).
    pub hash: String,

    /// Default remote URL, if the repository has one.
    pub remote: Option<String>,

    pub vcs_type: VcsKind,
}

impl RepoState {
    pub fn new(hash: impl Into<String>, remote: Option<String>, vcs_type: VcsKind) -> Self {
        Self {
            hash: hash.into(),
            remote,
            vcs_type,
        }
    }
}

/// Repository states keyed by relative path.
pub type RepoStates = BTreeMap<String, RepoState>;

/// A repository that `goto` should bring to a recorded state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub remote: Option<String>,
    pub vcs_type: VcsKind,

    /// Changeset to check out; `None` means the tip of the active branch.
    pub hash: Option<String>,
}

impl SyncTarget {
    /// Build a target from a recorded state, optionally dropping the pin.
    pub fn from_state(state: &RepoState, pinned: bool) -> Self {
        Self {
            remote: state.remote.clone(),
            vcs_type: state.vcs_type,
            hash: pinned.then(|| state.hash.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vcs_kind_parse() {
        assert_eq!("git".parse::<VcsKind>().unwrap(), VcsKind::Git);
        assert_eq!("mercurial".parse::<VcsKind>().unwrap(), VcsKind::Mercurial);
        assert_eq!("hg".parse::<VcsKind>().unwrap(), VcsKind::Mercurial);
        assert!("svn".parse::<VcsKind>().is_err());
    }

    #[test]
    fn vcs_kind_serde_is_lowercase() {
        assert_eq!(serde_yaml::to_string(&VcsKind::Mercurial).unwrap().trim(), "mercurial");
    }

    #[test]
    fn metadata_dirs() {
        assert_eq!(VcsKind::Git.metadata_dir(), ".git");
        assert_eq!(VcsKind::Mercurial.metadata_dir(), ".hg");
    }

    #[test]
    fn sync_target_drops_pin() {
        let state = RepoState::new("abc", None, VcsKind::Git);
        assert_eq!(SyncTarget::from_state(&state, true).hash.as_deref(), Some("abc"));
        assert_eq!(SyncTarget::from_state(&state, false).hash, None);
    }
}
