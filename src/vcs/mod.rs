//! vcs
//!
//! Single interface for all version-control operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to git and mercurial. The engine talks
//! to repositories exclusively through the [`VersionControl`] trait; no other
//! module imports `git2` or spawns `git`/`hg`.
//!
//! Two concrete backends form a closed set, wrapped in [`Backend`]:
//!
//! - [`git::GitBackend`] - `git2` for local reads and writes, the `git`
//!   binary for clone, fetch, checkout and push
//! - [`mercurial::HgBackend`] - the `hg` binary
//!
//! [`mock::MockVcs`] is an in-memory implementation used by tests to inject
//! tag and push conflicts.
//!
//! # Invariants
//!
//! - Versioned tags are created without force; an existing tag is a
//!   [`VcsError::TagExists`], never an overwrite
//! - Moving tags are always force-updated
//! - `push` publishes the branch and all given tags as one atomic unit
//! - `revert` restores head and every tag recorded in a [`Checkpoint`]
//!
//! # Example
//!
//! ```no_run
//! use vmn::vcs::{Backend, VersionControl};
//! use std::path::Path;
//!
//! let backend = Backend::discover(Path::new(".")).unwrap();
//! println!("{} repository at {}", backend.kind(), backend.root().display());
//! for tag in backend.tags().unwrap() {
//!     println!("{}", tag);
//! }
//! ```

pub mod git;
pub mod mercurial;
pub mod mock;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use thiserror::Error;
use tracing::debug;

use crate::core::metadata::schema::VersionInfo;
pub use crate::core::types::VcsKind;

pub use git::GitBackend;
pub use mercurial::HgBackend;
pub use mock::MockVcs;

/// Errors from version-control operations.
#[derive(Debug, Error)]
pub enum VcsError {
    /// No repository found at or above the path.
    #[error("not a repository: {path}")]
    NotARepo { path: PathBuf },

    /// Repository has no working directory.
    #[error("bare repository not supported")]
    BareRepo,

    /// The working copy is not on a branch.
    #[error("working copy is in detached head state")]
    DetachedHead,

    /// A tag with this name already exists.
    #[error("tag already exists: {tag}")]
    TagExists { tag: String },

    /// The remote refused the push.
    #[error("push rejected: {message}")]
    PushRejected { message: String },

    /// The repository has no remote to push to or pull from.
    #[error("no remote configured for {path}")]
    NoRemote { path: PathBuf },

    /// Clone target already exists.
    #[error("destination already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// A VCS binary exited unsuccessfully.
    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// A VCS binary could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal { message: String },
}

impl From<git2::Error> for VcsError {
    fn from(err: git2::Error) -> Self {
        VcsError::Internal {
            message: err.message().to_string(),
        }
    }
}

/// Snapshot of the state a publish attempt may change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Working copy parent at checkpoint time.
    pub head: String,

    /// Previous target of every tag the attempt may touch (`None` if absent).
    pub tags: BTreeMap<String, Option<String>>,
}

/// The version-control operations vmn needs.
///
/// Methods take `&self`; backends that hold mutable state use interior
/// mutability. Implementations must be usable from one thread at a time
/// only; dependency sync opens one backend per worker.
pub trait VersionControl {
    fn kind(&self) -> VcsKind;

    /// Working tree root.
    fn root(&self) -> &Path;

    /// VCS metadata directory (`.git` or `.hg`).
    fn vcs_dir(&self) -> PathBuf;

    /// URL of the default remote, if any.
    fn remote(&self) -> Result<Option<String>, VcsError>;

    /// All tag names, in backend listing order.
    fn tags(&self) -> Result<Vec<String>, VcsError>;

    /// Tags pointing at the working copy parent.
    fn tags_at_head(&self) -> Result<Vec<String>, VcsError>;

    /// Stamp record carried by the commit `tag` points at.
    ///
    /// Returns `Ok(None)` if the tag does not exist or its commit message is
    /// not a stamp record.
    fn version_info_of(&self, tag: &str) -> Result<Option<VersionInfo>, VcsError>;

    /// Working copy parent.
    fn changeset(&self) -> Result<String, VcsError>;

    /// Nearest ancestor of the working copy not authored by the stamp author.
    fn last_user_changeset(&self) -> Result<String, VcsError>;

    /// Name of the active branch.
    ///
    /// When the working copy is detached and `raise_if_detached` is false,
    /// backends report the branch the working copy was left from, if they
    /// can tell; otherwise [`VcsError::DetachedHead`].
    fn active_branch(&self, raise_if_detached: bool) -> Result<String, VcsError>;

    /// Commit `include` paths (files or directories, relative to the root or
    /// absolute) and return the new changeset.
    fn commit(&self, message: &str, author: &str, include: &[PathBuf]) -> Result<String, VcsError>;

    /// Tag changeset `rev` as `name`.
    ///
    /// Without `force`, an existing tag fails with [`VcsError::TagExists`].
    fn create_tag(&self, name: &str, rev: &str, author: &str, force: bool) -> Result<(), VcsError>;

    /// Tag `rev` with every name in `names`, stopping at the first failure.
    fn create_tags(
        &self,
        names: &[String],
        rev: &str,
        author: &str,
        force: bool,
    ) -> Result<(), VcsError> {
        for name in names {
            self.create_tag(name, rev, author, force)?;
        }
        Ok(())
    }

    /// Push the active branch (if attached) and `tags` atomically.
    fn push(&self, tags: &[String]) -> Result<(), VcsError>;

    /// Push `tags` without the branch.
    fn push_tags(&self, tags: &[String]) -> Result<(), VcsError>;

    /// Fetch remote changes and fast-forward the active branch.
    fn pull(&self) -> Result<(), VcsError>;

    /// Update the working copy to a changeset or tag.
    fn checkout(&self, rev: &str) -> Result<(), VcsError>;

    /// Update the working copy to the tip of the active branch and return it.
    fn checkout_branch_tip(&self) -> Result<String, VcsError>;

    /// Description of uncommitted local edits, if any.
    fn pending_local_changes(&self) -> Result<Option<String>, VcsError>;

    /// Description of local commits missing from the remote, if any.
    fn outgoing_unpushed_changes(
        &self,
        skip_detached_check: bool,
    ) -> Result<Option<String>, VcsError>;

    /// Snapshot head and the current targets of `tags`.
    fn checkpoint(&self, tags: &[String]) -> Result<Checkpoint, VcsError>;

    /// Undo everything done since `checkpoint`: tags created since are
    /// deleted, moved tags restored, and the working copy reset to its head.
    fn revert(&self, checkpoint: &Checkpoint) -> Result<(), VcsError>;
}

/// A concrete backend, selected by the kind of repository found on disk.
#[derive(Debug)]
pub enum Backend {
    Git(GitBackend),
    Mercurial(HgBackend),
}

impl Backend {
    /// Open the repository containing `path`, searching upwards.
    ///
    /// The nearest directory holding `.git` or `.hg` wins.
    pub fn discover(path: &Path) -> Result<Self, VcsError> {
        for dir in path.ancestors() {
            if let Some(kind) = detect(dir) {
                return Self::open_as(kind, dir);
            }
        }
        Err(VcsError::NotARepo {
            path: path.to_path_buf(),
        })
    }

    /// Open `dir` only if it is itself a working tree root.
    pub fn open_exact(dir: &Path) -> Result<Option<Self>, VcsError> {
        match detect(dir) {
            Some(kind) => Self::open_as(kind, dir).map(Some),
            None => Ok(None),
        }
    }

    /// Open `dir` as a repository of the given kind.
    pub fn open_as(kind: VcsKind, dir: &Path) -> Result<Self, VcsError> {
        match kind {
            VcsKind::Git => GitBackend::open(dir).map(Backend::Git),
            VcsKind::Mercurial => HgBackend::open(dir).map(Backend::Mercurial),
        }
    }

    /// Clone `remote` into `path` with the given kind's tooling.
    pub fn clone_repo(kind: VcsKind, remote: &str, path: &Path) -> Result<(), VcsError> {
        if path.exists() && path.read_dir().map(|mut d| d.next().is_some()).unwrap_or(true) {
            return Err(VcsError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        match kind {
            VcsKind::Git => GitBackend::clone_repo(remote, path),
            VcsKind::Mercurial => HgBackend::clone_repo(remote, path),
        }
    }

    /// Set the author whose commits `last_user_changeset` skips.
    pub fn with_stamp_author(self, author: &str) -> Self {
        match self {
            Backend::Git(b) => Backend::Git(b.with_stamp_author(author)),
            Backend::Mercurial(b) => Backend::Mercurial(b.with_stamp_author(author)),
        }
    }

    /// Set the remote name used for fetch and push.
    pub fn with_remote_name(self, remote: &str) -> Self {
        match self {
            Backend::Git(b) => Backend::Git(b.with_remote_name(remote)),
            Backend::Mercurial(b) => Backend::Mercurial(b.with_remote_name(remote)),
        }
    }

    fn inner(&self) -> &dyn VersionControl {
        match self {
            Backend::Git(b) => b as &dyn VersionControl,
            Backend::Mercurial(b) => b,
        }
    }
}

/// Which VCS manages the working tree rooted exactly at `dir`.
pub fn detect(dir: &Path) -> Option<VcsKind> {
    [VcsKind::Git, VcsKind::Mercurial]
        .into_iter()
        .find(|kind| dir.join(kind.metadata_dir()).exists())
}

impl VersionControl for Backend {
    fn kind(&self) -> VcsKind {
        self.inner().kind()
    }

    fn root(&self) -> &Path {
        self.inner().root()
    }

    fn vcs_dir(&self) -> PathBuf {
        self.inner().vcs_dir()
    }

    fn remote(&self) -> Result<Option<String>, VcsError> {
        self.inner().remote()
    }

    fn tags(&self) -> Result<Vec<String>, VcsError> {
        self.inner().tags()
    }

    fn tags_at_head(&self) -> Result<Vec<String>, VcsError> {
        self.inner().tags_at_head()
    }

    fn version_info_of(&self, tag: &str) -> Result<Option<VersionInfo>, VcsError> {
        self.inner().version_info_of(tag)
    }

    fn changeset(&self) -> Result<String, VcsError> {
        self.inner().changeset()
    }

    fn last_user_changeset(&self) -> Result<String, VcsError> {
        self.inner().last_user_changeset()
    }

    fn active_branch(&self, raise_if_detached: bool) -> Result<String, VcsError> {
        self.inner().active_branch(raise_if_detached)
    }

    fn commit(&self, message: &str, author: &str, include: &[PathBuf]) -> Result<String, VcsError> {
        self.inner().commit(message, author, include)
    }

    fn create_tag(&self, name: &str, rev: &str, author: &str, force: bool) -> Result<(), VcsError> {
        self.inner().create_tag(name, rev, author, force)
    }

    fn create_tags(
        &self,
        names: &[String],
        rev: &str,
        author: &str,
        force: bool,
    ) -> Result<(), VcsError> {
        self.inner().create_tags(names, rev, author, force)
    }

    fn push(&self, tags: &[String]) -> Result<(), VcsError> {
        self.inner().push(tags)
    }

    fn push_tags(&self, tags: &[String]) -> Result<(), VcsError> {
        self.inner().push_tags(tags)
    }

    fn pull(&self) -> Result<(), VcsError> {
        self.inner().pull()
    }

    fn checkout(&self, rev: &str) -> Result<(), VcsError> {
        self.inner().checkout(rev)
    }

    fn checkout_branch_tip(&self) -> Result<String, VcsError> {
        self.inner().checkout_branch_tip()
    }

    fn pending_local_changes(&self) -> Result<Option<String>, VcsError> {
        self.inner().pending_local_changes()
    }

    fn outgoing_unpushed_changes(
        &self,
        skip_detached_check: bool,
    ) -> Result<Option<String>, VcsError> {
        self.inner().outgoing_unpushed_changes(skip_detached_check)
    }

    fn checkpoint(&self, tags: &[String]) -> Result<Checkpoint, VcsError> {
        self.inner().checkpoint(tags)
    }

    fn revert(&self, checkpoint: &Checkpoint) -> Result<(), VcsError> {
        self.inner().revert(checkpoint)
    }
}

/// Run a prepared VCS command, returning its output on success.
pub(crate) fn run(mut cmd: Command, shown: &str) -> Result<Output, VcsError> {
    debug!(command = shown, "running");
    let output = cmd.output().map_err(|e| VcsError::Spawn {
        command: shown.to_string(),
        source: e,
    })?;

    if !output.status.success() {
        return Err(VcsError::CommandFailed {
            command: shown.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

/// Trimmed UTF-8 stdout of a command output.
pub(crate) fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn detect_by_metadata_dir() {
        let temp = TempDir::new().unwrap();
        assert_eq!(detect(temp.path()), None);

        std::fs::create_dir(temp.path().join(".hg")).unwrap();
        assert_eq!(detect(temp.path()), Some(VcsKind::Mercurial));
    }

    #[test]
    fn discover_fails_outside_repos() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Backend::discover(temp.path()),
            Err(VcsError::NotARepo { .. })
        ));
    }

    #[test]
    fn open_exact_skips_plain_directories() {
        let temp = TempDir::new().unwrap();
        assert!(Backend::open_exact(temp.path()).unwrap().is_none());
    }

    #[test]
    fn clone_refuses_non_empty_destination() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("file"), "x").unwrap();
        assert!(matches!(
            Backend::clone_repo(VcsKind::Git, "unused", temp.path()),
            Err(VcsError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn run_reports_failures_with_the_shown_command() {
        let mut ok = Command::new("git");
        ok.arg("--version");
        let output = run(ok, "git --version").unwrap();
        assert!(stdout_of(&output).starts_with("git version"));

        let mut bad = Command::new("git");
        bad.arg("no-such-subcommand");
        match run(bad, "git no-such-subcommand") {
            Err(VcsError::CommandFailed { command, .. }) => {
                assert_eq!(command, "git no-such-subcommand")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
