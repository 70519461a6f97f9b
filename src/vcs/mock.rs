//! vcs::mock
//!
//! In-memory backend for deterministic testing.
//!
//! # Design
//!
//! `MockVcs` keeps a linear commit history, local and remote tag tables and a
//! remote branch tip in memory. Config documents are still written to a real
//! directory by the engine; the mock only stands in for the VCS.
//!
//! Conflicts are produced the same way a real remote produces them:
//!
//! - [`MockVcs::add_foreign_tag`] places a tag that carries no stamp record,
//!   so the matcher ignores it and the next create collides
//! - [`MockVcs::inject_remote_stamp`] publishes a stamp on the remote only;
//!   pushes are rejected until a pull brings it in
//! - [`MockVcs::fail_next_pushes`] rejects the next N pushes outright
//!
//! # Example
//!
//! ```
//! use vmn::vcs::{MockVcs, VersionControl};
//! use tempfile::TempDir;
//!
//! let temp = TempDir::new().unwrap();
//! let vcs = MockVcs::new(temp.path()).unwrap();
//!
//! vcs.create_tag("svc_0.0.1", "HEAD", "vmn", false).unwrap();
//! assert!(vcs.create_tag("svc_0.0.1", "HEAD", "vmn", false).is_err());
//! assert_eq!(vcs.tags().unwrap(), vec!["svc_0.0.1".to_string()]);
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{Checkpoint, VcsError, VersionControl};
use crate::core::config::DEFAULT_AUTHOR;
use crate::core::metadata::schema::{parse_version_info, VersionInfo};
use crate::core::naming::is_moving_tag;
use crate::core::types::VcsKind;

/// Directory standing in for `.git` under the mock root.
pub const MOCK_VCS_DIR: &str = ".mockvcs";

/// Mock backend for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockVcs {
    root: PathBuf,
    inner: Arc<Mutex<MockVcsInner>>,
}

#[derive(Debug, Clone)]
struct MockCommit {
    message: String,
    author: String,
    parent: Option<usize>,
}

#[derive(Debug)]
struct MockVcsInner {
    commits: Vec<MockCommit>,
    head: usize,
    branch: String,
    branch_tip: usize,
    tags: BTreeMap<String, usize>,
    remote_url: Option<String>,
    remote_tip: usize,
    remote_tags: BTreeMap<String, usize>,
    /// Commits published on the remote but not yet pulled.
    incoming: Vec<(MockCommit, Vec<String>)>,
    pending: Option<String>,
    push_failures: u32,
    stamp_author: String,
    operations: Vec<MockOperation>,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Commit { message: String },
    CreateTag { name: String, force: bool },
    Push {
        tags: Vec<String>,
        branch: bool,
        accepted: bool,
    },
    Pull,
    Checkout { rev: String },
    Revert,
}

fn hash_of(index: usize) -> String {
    format!("{:040x}", index + 1)
}

impl MockVcs {
    /// Create a mock repository rooted at `root` with one user commit on
    /// branch `main` that is already on the remote.
    pub fn new(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root.join(MOCK_VCS_DIR))?;

        let initial = MockCommit {
            message: "initial commit".into(),
            author: "user".into(),
            parent: None,
        };
        Ok(Self {
            root: root.to_path_buf(),
            inner: Arc::new(Mutex::new(MockVcsInner {
                commits: vec![initial],
                head: 0,
                branch: "main".into(),
                branch_tip: 0,
                tags: BTreeMap::new(),
                remote_url: Some("mock://origin".into()),
                remote_tip: 0,
                remote_tags: BTreeMap::new(),
                incoming: Vec::new(),
                pending: None,
                push_failures: 0,
                stamp_author: DEFAULT_AUTHOR.into(),
                operations: Vec::new(),
            })),
        })
    }

    /// Drop the remote; push and pull then fail with `NoRemote`.
    pub fn without_remote(self) -> Self {
        self.inner.lock().unwrap().remote_url = None;
        self
    }

    /// Add a commit by `author` on the branch and return its hash.
    pub fn user_commit(&self, message: &str, author: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.append(message, author)
    }

    /// Tag head with `name` without a stamp record behind it.
    pub fn add_foreign_tag(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        let head = inner.head;
        inner.tags.insert(name.to_string(), head);
    }

    /// Publish a stamp commit carrying `info` on the remote, tagged `tags`.
    ///
    /// Local state is untouched until the next pull; pushes are rejected
    /// until then.
    pub fn inject_remote_stamp(&self, info: &VersionInfo, tags: &[String]) {
        let message = info.to_message().unwrap();
        let mut inner = self.inner.lock().unwrap();
        let commit = MockCommit {
            message,
            author: DEFAULT_AUTHOR.into(),
            parent: None,
        };
        inner.incoming.push((commit, tags.to_vec()));
    }

    /// Reject the next `count` pushes.
    pub fn fail_next_pushes(&self, count: u32) {
        self.inner.lock().unwrap().push_failures = count;
    }

    /// Report (or clear) uncommitted local edits.
    pub fn set_pending_changes(&self, description: Option<&str>) {
        self.inner.lock().unwrap().pending = description.map(String::from);
    }

    /// Detach the working copy at `rev`.
    pub fn detach_at(&self, rev: &str) -> Result<(), VcsError> {
        let mut inner = self.inner.lock().unwrap();
        inner.head = inner.resolve(rev)?;
        Ok(())
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Number of commits in history, including reverted ones.
    pub fn commit_count(&self) -> usize {
        self.inner.lock().unwrap().commits.len()
    }

    /// Message of the working copy parent.
    pub fn head_message(&self) -> String {
        let inner = self.inner.lock().unwrap();
        inner.commits[inner.head].message.clone()
    }

    /// Tag table of the remote, as tag → commit hash.
    pub fn remote_tags(&self) -> BTreeMap<String, String> {
        let inner = self.inner.lock().unwrap();
        inner
            .remote_tags
            .iter()
            .map(|(name, &idx)| (name.clone(), hash_of(idx)))
            .collect()
    }

    /// Changeset the remote branch points at.
    pub fn remote_head(&self) -> String {
        hash_of(self.inner.lock().unwrap().remote_tip)
    }

    /// Local tag table, as tag → commit hash.
    pub fn tag_targets(&self) -> BTreeMap<String, String> {
        let inner = self.inner.lock().unwrap();
        inner
            .tags
            .iter()
            .map(|(name, &idx)| (name.clone(), hash_of(idx)))
            .collect()
    }

    /// Push `tags`, plus the attached branch when `with_branch` is set.
    fn push_refs(&self, tags: &[String], with_branch: bool) -> Result<(), VcsError> {
        let result = {
            let mut inner = self.inner.lock().unwrap();
            if inner.remote_url.is_none() {
                return Err(VcsError::NoRemote {
                    path: self.root.clone(),
                });
            }

            let collision = tags.iter().find(|tag| {
                !is_moving_tag(tag)
                    && matches!(
                        (inner.remote_tags.get(*tag), inner.tags.get(*tag)),
                        (Some(remote), Some(local)) if remote != local
                    )
            });

            if inner.push_failures > 0 {
                inner.push_failures -= 1;
                Err("injected push failure".to_string())
            } else if with_branch && !inner.incoming.is_empty() {
                Err("remote contains work that you do not have locally".to_string())
            } else if let Some(tag) = collision {
                Err(format!("tag {} already exists on remote", tag))
            } else {
                if with_branch && !inner.detached() {
                    inner.remote_tip = inner.branch_tip;
                }
                for tag in tags {
                    if let Some(&idx) = inner.tags.get(tag) {
                        inner.remote_tags.insert(tag.clone(), idx);
                    }
                }
                Ok(())
            }
        };

        self.record(MockOperation::Push {
            tags: tags.to_vec(),
            branch: with_branch,
            accepted: result.is_ok(),
        });
        result.map_err(|message| VcsError::PushRejected { message })
    }

    fn record(&self, op: MockOperation) {
        self.inner.lock().unwrap().operations.push(op);
    }
}

impl MockVcsInner {
    fn append(&mut self, message: &str, author: &str) -> String {
        self.commits.push(MockCommit {
            message: message.to_string(),
            author: author.to_string(),
            parent: Some(self.head),
        });
        let idx = self.commits.len() - 1;
        self.head = idx;
        self.branch_tip = idx;
        hash_of(idx)
    }

    fn resolve(&self, rev: &str) -> Result<usize, VcsError> {
        if rev == "HEAD" || rev == "." {
            return Ok(self.head);
        }
        if let Some(&idx) = self.tags.get(rev) {
            return Ok(idx);
        }
        (0..self.commits.len())
            .find(|&idx| hash_of(idx) == rev)
            .ok_or_else(|| VcsError::Internal {
                message: format!("unknown revision {}", rev),
            })
    }

    fn detached(&self) -> bool {
        self.head != self.branch_tip
    }
}

impl VersionControl for MockVcs {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn vcs_dir(&self) -> PathBuf {
        self.root.join(MOCK_VCS_DIR)
    }

    fn remote(&self) -> Result<Option<String>, VcsError> {
        Ok(self.inner.lock().unwrap().remote_url.clone())
    }

    fn tags(&self) -> Result<Vec<String>, VcsError> {
        Ok(self.inner.lock().unwrap().tags.keys().cloned().collect())
    }

    fn tags_at_head(&self) -> Result<Vec<String>, VcsError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tags
            .iter()
            .filter(|(_, &idx)| idx == inner.head)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn version_info_of(&self, tag: &str) -> Result<Option<VersionInfo>, VcsError> {
        let inner = self.inner.lock().unwrap();
        let Some(&idx) = inner.tags.get(tag) else {
            return Ok(None);
        };
        Ok(parse_version_info(&inner.commits[idx].message).ok())
    }

    fn changeset(&self) -> Result<String, VcsError> {
        Ok(hash_of(self.inner.lock().unwrap().head))
    }

    fn last_user_changeset(&self) -> Result<String, VcsError> {
        let inner = self.inner.lock().unwrap();
        let mut cursor = Some(inner.head);
        while let Some(idx) = cursor {
            let commit = &inner.commits[idx];
            if commit.author != inner.stamp_author {
                return Ok(hash_of(idx));
            }
            cursor = commit.parent;
        }
        Ok(hash_of(inner.head))
    }

    fn active_branch(&self, raise_if_detached: bool) -> Result<String, VcsError> {
        let inner = self.inner.lock().unwrap();
        if inner.detached() && raise_if_detached {
            return Err(VcsError::DetachedHead);
        }
        Ok(inner.branch.clone())
    }

    fn commit(&self, message: &str, author: &str, _include: &[PathBuf]) -> Result<String, VcsError> {
        let hash = self.inner.lock().unwrap().append(message, author);
        self.record(MockOperation::Commit {
            message: message.to_string(),
        });
        Ok(hash)
    }

    fn create_tag(&self, name: &str, rev: &str, _author: &str, force: bool) -> Result<(), VcsError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if !force && inner.tags.contains_key(name) {
                return Err(VcsError::TagExists {
                    tag: name.to_string(),
                });
            }
            let target = inner.resolve(rev)?;
            inner.tags.insert(name.to_string(), target);
        }
        self.record(MockOperation::CreateTag {
            name: name.to_string(),
            force,
        });
        Ok(())
    }

    fn push(&self, tags: &[String]) -> Result<(), VcsError> {
        self.push_refs(tags, true)
    }

    fn push_tags(&self, tags: &[String]) -> Result<(), VcsError> {
        self.push_refs(tags, false)
    }

    fn pull(&self) -> Result<(), VcsError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.remote_url.is_none() {
                return Err(VcsError::NoRemote {
                    path: self.root.clone(),
                });
            }

            let incoming = std::mem::take(&mut inner.incoming);
            for (commit, tags) in incoming {
                let parent = inner.branch_tip;
                inner.commits.push(MockCommit {
                    parent: Some(parent),
                    ..commit
                });
                let idx = inner.commits.len() - 1;
                let was_attached = !inner.detached();
                inner.branch_tip = idx;
                inner.remote_tip = idx;
                if was_attached {
                    inner.head = idx;
                }
                for tag in tags {
                    inner.tags.insert(tag.clone(), idx);
                    inner.remote_tags.insert(tag, idx);
                }
            }

            let remote_tags = inner.remote_tags.clone();
            inner.tags.extend(remote_tags);
        }
        self.record(MockOperation::Pull);
        Ok(())
    }

    fn checkout(&self, rev: &str) -> Result<(), VcsError> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.head = inner.resolve(rev)?;
        }
        self.record(MockOperation::Checkout {
            rev: rev.to_string(),
        });
        Ok(())
    }

    fn checkout_branch_tip(&self) -> Result<String, VcsError> {
        let mut inner = self.inner.lock().unwrap();
        inner.head = inner.branch_tip;
        Ok(hash_of(inner.head))
    }

    fn pending_local_changes(&self) -> Result<Option<String>, VcsError> {
        Ok(self.inner.lock().unwrap().pending.clone())
    }

    fn outgoing_unpushed_changes(
        &self,
        skip_detached_check: bool,
    ) -> Result<Option<String>, VcsError> {
        let inner = self.inner.lock().unwrap();
        if inner.detached() {
            return Ok((!skip_detached_check).then(|| "detached head".to_string()));
        }
        if inner.remote_url.is_some() && inner.remote_tip != inner.branch_tip {
            return Ok(Some(format!(
                "outgoing changes in {}: branch {} is ahead of remote",
                self.root.display(),
                inner.branch
            )));
        }
        Ok(None)
    }

    fn checkpoint(&self, tags: &[String]) -> Result<Checkpoint, VcsError> {
        let inner = self.inner.lock().unwrap();
        Ok(Checkpoint {
            head: hash_of(inner.head),
            tags: tags
                .iter()
                .map(|tag| (tag.clone(), inner.tags.get(tag).map(|&idx| hash_of(idx))))
                .collect(),
        })
    }

    fn revert(&self, checkpoint: &Checkpoint) -> Result<(), VcsError> {
        {
            let mut inner = self.inner.lock().unwrap();
            for (tag, previous) in &checkpoint.tags {
                match previous {
                    Some(hash) => {
                        let idx = inner.resolve(hash)?;
                        inner.tags.insert(tag.clone(), idx);
                    }
                    None => {
                        inner.tags.remove(tag);
                    }
                }
            }
            let head = inner.resolve(&checkpoint.head)?;
            inner.head = head;
            inner.branch_tip = head;
        }
        self.record(MockOperation::Revert);
        Ok(())
    }
}
