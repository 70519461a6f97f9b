//! vcs::git
//!
//! Git backend.
//!
//! Local reads and writes (tags, commits, refs, status) go through `git2`.
//! Operations that need transport or a working-tree update (clone, fetch,
//! merge, checkout, push) run the `git` binary, which honors the user's
//! credential helpers and SSH configuration.
//!
//! Tags are annotated; the tag message is the tag name. Stamp records are read
//! from the message of the commit a tag peels to.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{run, stdout_of, Checkpoint, VcsError, VersionControl};
use crate::core::app::normalize;
use crate::core::config::DEFAULT_AUTHOR;
use crate::core::metadata::schema::{parse_version_info, VersionInfo};
use crate::core::naming::is_moving_tag;
use crate::core::types::VcsKind;

/// A git working tree.
pub struct GitBackend {
    repo: git2::Repository,
    root: PathBuf,
    stamp_author: String,
    remote_name: String,
}

impl std::fmt::Debug for GitBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitBackend")
            .field("root", &self.root)
            .field("remote", &self.remote_name)
            .finish()
    }
}

impl GitBackend {
    /// Open the working tree rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self, VcsError> {
        let repo = git2::Repository::open(dir).map_err(|_| VcsError::NotARepo {
            path: dir.to_path_buf(),
        })?;
        if repo.is_bare() {
            return Err(VcsError::BareRepo);
        }
        let root = normalize(repo.workdir().ok_or(VcsError::BareRepo)?);

        Ok(Self {
            repo,
            root,
            stamp_author: DEFAULT_AUTHOR.to_string(),
            remote_name: "origin".to_string(),
        })
    }

    pub fn with_stamp_author(mut self, author: &str) -> Self {
        self.stamp_author = author.to_string();
        self
    }

    pub fn with_remote_name(mut self, remote: &str) -> Self {
        self.remote_name = remote.to_string();
        self
    }

    /// `git clone <remote> <path>`
    pub fn clone_repo(remote: &str, path: &Path) -> Result<(), VcsError> {
        let mut cmd = Command::new("git");
        cmd.env("GIT_TERMINAL_PROMPT", "0")
            .args(["clone", "--quiet", remote])
            .arg(path);
        run(cmd, &format!("git clone {}", remote))?;
        Ok(())
    }

    /// A `git` command running in this working tree.
    fn git_cmd(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.root);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.arg("-c").arg("advice.detachedHead=false");
        cmd
    }

    fn git(&self, args: &[&str]) -> Result<String, VcsError> {
        let mut cmd = self.git_cmd();
        cmd.args(args);
        let output = run(cmd, &format!("git {}", args.join(" ")))?;
        Ok(stdout_of(&output))
    }

    fn ensure_remote(&self) -> Result<(), VcsError> {
        match self.repo.find_remote(&self.remote_name) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Err(VcsError::NoRemote {
                path: self.root.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn head_commit(&self) -> Result<git2::Commit<'_>, VcsError> {
        Ok(self.repo.head()?.peel_to_commit()?)
    }

    fn tag_ref(tag: &str) -> String {
        format!("refs/tags/{}", tag)
    }

    fn signature(&self, author: &str) -> Result<git2::Signature<'static>, VcsError> {
        Ok(git2::Signature::now(author, &format!("{}@vmn", author))?)
    }

    /// Local branch whose upstream is configured, if HEAD is on one.
    fn attached_branch(&self) -> Result<Option<git2::Branch<'_>>, VcsError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if head.is_branch() {
            Ok(Some(git2::Branch::wrap(head)))
        } else {
            Ok(None)
        }
    }

    fn has_upstream(&self, branch: &str) -> bool {
        self.repo
            .find_branch(branch, git2::BranchType::Local)
            .and_then(|b| b.upstream())
            .is_ok()
    }

    /// Pathspec for `path` relative to the working tree root.
    /// `git push --atomic` of `tags`, plus the attached branch when
    /// `with_branch` is set. Moving tags are force-pushed.
    fn push_refs(&self, tags: &[String], with_branch: bool) -> Result<(), VcsError> {
        self.ensure_remote()?;

        let mut cmd = self.git_cmd();
        cmd.args(["push", "--atomic", "--quiet", &self.remote_name]);
        if with_branch {
            if let Some(branch) = self.attached_branch()? {
                if let Some(name) = branch.name()? {
                    cmd.arg(format!("HEAD:refs/heads/{}", name));
                }
            }
        }
        for tag in tags {
            let refspec = format!("{0}:{0}", Self::tag_ref(tag));
            if is_moving_tag(tag) {
                cmd.arg(format!("+{}", refspec));
            } else {
                cmd.arg(refspec);
            }
        }

        match run(cmd, "git push") {
            Ok(_) => Ok(()),
            Err(VcsError::CommandFailed { stderr, .. }) => {
                Err(VcsError::PushRejected { message: stderr })
            }
            Err(e) => Err(e),
        }
    }

    fn pathspec(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let spec = rel.to_string_lossy().replace('\\', "/");
        if spec.is_empty() {
            ".".to_string()
        } else {
            spec
        }
    }
}

impl VersionControl for GitBackend {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn vcs_dir(&self) -> PathBuf {
        self.repo.path().to_path_buf()
    }

    fn remote(&self) -> Result<Option<String>, VcsError> {
        match self.repo.find_remote(&self.remote_name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn tags(&self) -> Result<Vec<String>, VcsError> {
        let names = self.repo.tag_names(None)?;
        let mut tags: Vec<String> = names.iter().flatten().map(String::from).collect();
        tags.sort();
        Ok(tags)
    }

    fn tags_at_head(&self) -> Result<Vec<String>, VcsError> {
        let head = self.head_commit()?.id();
        let mut tags = Vec::new();
        for tag in self.tags()? {
            let reference = self.repo.find_reference(&Self::tag_ref(&tag))?;
            if reference.peel_to_commit().map(|c| c.id()).ok() == Some(head) {
                tags.push(tag);
            }
        }
        Ok(tags)
    }

    fn version_info_of(&self, tag: &str) -> Result<Option<VersionInfo>, VcsError> {
        let reference = match self.repo.find_reference(&Self::tag_ref(tag)) {
            Ok(r) => r,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let commit = reference.peel_to_commit()?;
        let message = String::from_utf8_lossy(commit.message_bytes());

        match parse_version_info(&message) {
            Ok(info) => Ok(Some(info)),
            Err(e) => {
                debug!(tag, error = %e, "tag does not carry a stamp record");
                Ok(None)
            }
        }
    }

    fn changeset(&self) -> Result<String, VcsError> {
        Ok(self.head_commit()?.id().to_string())
    }

    fn last_user_changeset(&self) -> Result<String, VcsError> {
        let mut walk = self.repo.revwalk()?;
        walk.push_head()?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL)?;

        for oid in walk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            if commit.author().name() != Some(self.stamp_author.as_str()) {
                return Ok(oid.to_string());
            }
        }

        self.changeset()
    }

    fn active_branch(&self, raise_if_detached: bool) -> Result<String, VcsError> {
        if let Some(branch) = self.attached_branch()? {
            return branch
                .name()?
                .map(String::from)
                .ok_or_else(|| VcsError::Internal {
                    message: "branch name is not valid UTF-8".into(),
                });
        }
        if raise_if_detached {
            return Err(VcsError::DetachedHead);
        }

        // Detached: pick the first local branch whose history contains HEAD.
        let head = self.head_commit()?.id();
        let mut candidates = Vec::new();
        for entry in self.repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = entry?;
            let (Some(name), Some(tip)) = (branch.name()?, branch.get().target()) else {
                continue;
            };
            if tip == head || self.repo.graph_descendant_of(tip, head)? {
                candidates.push(name.to_string());
            }
        }
        candidates.sort();
        candidates.into_iter().next().ok_or(VcsError::DetachedHead)
    }

    fn commit(&self, message: &str, author: &str, include: &[PathBuf]) -> Result<String, VcsError> {
        let specs: Vec<String> = include.iter().map(|p| self.pathspec(p)).collect();

        let mut index = self.repo.index()?;
        if !specs.is_empty() {
            index.add_all(specs.iter(), git2::IndexAddOption::DEFAULT, None)?;
            index.update_all(specs.iter(), None)?;
            index.write()?;
        }

        let tree = self.repo.find_tree(index.write_tree()?)?;
        let sig = self.signature(author)?;
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        debug!(commit = %oid, "committed");
        Ok(oid.to_string())
    }

    fn create_tag(&self, name: &str, rev: &str, author: &str, force: bool) -> Result<(), VcsError> {
        let target = self.repo.revparse_single(rev)?;
        let sig = self.signature(author)?;

        match self.repo.tag(name, &target, &sig, name, force) {
            Ok(_) => {
                debug!(tag = name, force, "tagged");
                Ok(())
            }
            Err(e) if e.code() == git2::ErrorCode::Exists => Err(VcsError::TagExists {
                tag: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn push(&self, tags: &[String]) -> Result<(), VcsError> {
        self.push_refs(tags, true)
    }

    fn push_tags(&self, tags: &[String]) -> Result<(), VcsError> {
        self.push_refs(tags, false)
    }

    fn pull(&self) -> Result<(), VcsError> {
        self.ensure_remote()?;
        self.git(&["fetch", "--quiet", "--tags", "--force", &self.remote_name])?;

        let branch = match self.attached_branch()? {
            Some(b) => b.name()?.map(String::from),
            None => None,
        };
        if let Some(branch) = branch {
            if self.has_upstream(&branch) {
                self.git(&["merge", "--ff-only", "--quiet", "@{upstream}"])?;
            }
        }
        Ok(())
    }

    fn checkout(&self, rev: &str) -> Result<(), VcsError> {
        self.git(&["checkout", "--quiet", rev])?;
        Ok(())
    }

    fn checkout_branch_tip(&self) -> Result<String, VcsError> {
        let branch = self.active_branch(false)?;
        self.git(&["checkout", "--quiet", &branch])?;
        if self.has_upstream(&branch) {
            self.git(&["merge", "--ff-only", "--quiet", "@{upstream}"])?;
        }
        self.changeset()
    }

    fn pending_local_changes(&self) -> Result<Option<String>, VcsError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;

        let changed: Vec<String> = statuses
            .iter()
            .filter(|entry| entry.status() != git2::Status::CURRENT)
            .filter_map(|entry| entry.path().map(String::from))
            .collect();

        if changed.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "pending changes in {}: {}",
            self.root.display(),
            changed.join(", ")
        )))
    }

    fn outgoing_unpushed_changes(
        &self,
        skip_detached_check: bool,
    ) -> Result<Option<String>, VcsError> {
        let Some(branch) = self.attached_branch()? else {
            if skip_detached_check {
                return Ok(None);
            }
            return Ok(Some(format!(
                "detached head in {}",
                self.root.display()
            )));
        };

        let Ok(upstream) = branch.upstream() else {
            return Ok(None);
        };
        let (Some(local), Some(remote)) = (branch.get().target(), upstream.get().target()) else {
            return Ok(None);
        };

        let (ahead, _) = self.repo.graph_ahead_behind(local, remote)?;
        if ahead == 0 {
            return Ok(None);
        }
        Ok(Some(format!(
            "outgoing changes in {}: {} commit(s) not pushed",
            self.root.display(),
            ahead
        )))
    }

    fn checkpoint(&self, tags: &[String]) -> Result<Checkpoint, VcsError> {
        let head = self.changeset()?;
        let tags = tags
            .iter()
            .map(|tag| {
                let target = self
                    .repo
                    .find_reference(&Self::tag_ref(tag))
                    .ok()
                    .and_then(|r| r.target())
                    .map(|oid| oid.to_string());
                (tag.clone(), target)
            })
            .collect();

        Ok(Checkpoint { head, tags })
    }

    fn revert(&self, checkpoint: &Checkpoint) -> Result<(), VcsError> {
        for (tag, previous) in &checkpoint.tags {
            let refname = Self::tag_ref(tag);
            let current = self.repo.find_reference(&refname).ok();
            let current_target = current
                .as_ref()
                .and_then(|r| r.target())
                .map(|oid| oid.to_string());

            match (previous, current) {
                (None, Some(mut reference)) => {
                    debug!(tag, "deleting tag");
                    reference.delete()?;
                }
                (Some(old), _) if current_target.as_deref() != Some(old.as_str()) => {
                    debug!(tag, target = %old, "restoring tag");
                    let oid = git2::Oid::from_str(old)?;
                    self.repo.reference(&refname, oid, true, "vmn: restore tag")?;
                }
                _ => {}
            }
        }

        if self.changeset()? != checkpoint.head {
            debug!(head = %checkpoint.head, "resetting stamp commit");
            let target = self.repo.revparse_single(&checkpoint.head)?;
            self.repo.reset(&target, git2::ResetType::Hard, None)?;
        }

        Ok(())
    }
}
