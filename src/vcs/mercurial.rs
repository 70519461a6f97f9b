//! vcs::mercurial
//!
//! Mercurial backend driving the `hg` binary.
//!
//! Mercurial tags live in `.hgtags`, so every tag operation creates a commit.
//! Tags are always placed on an explicit revision (the stamp commit), and
//! rolling back strips every changeset created after the checkpoint, which
//! restores `.hgtags` along with the stamp commit.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{run, stdout_of, Checkpoint, VcsError, VersionControl};
use crate::core::app::normalize;
use crate::core::config::DEFAULT_AUTHOR;
use crate::core::metadata::schema::{parse_version_info, VersionInfo};
use crate::core::types::VcsKind;

/// A mercurial working tree.
#[derive(Debug)]
pub struct HgBackend {
    root: PathBuf,
    stamp_author: String,
    remote_name: String,
}

impl HgBackend {
    /// Open the working tree rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self, VcsError> {
        let mut cmd = Command::new("hg");
        cmd.arg("--cwd").arg(dir).arg("root");
        let output = run(cmd, "hg root").map_err(|_| VcsError::NotARepo {
            path: dir.to_path_buf(),
        })?;

        Ok(Self {
            root: normalize(Path::new(&stdout_of(&output))),
            stamp_author: DEFAULT_AUTHOR.to_string(),
            remote_name: "default".to_string(),
        })
    }

    pub fn with_stamp_author(mut self, author: &str) -> Self {
        self.stamp_author = author.to_string();
        self
    }

    /// Mercurial calls the default path `default`; `origin` maps onto it.
    pub fn with_remote_name(mut self, remote: &str) -> Self {
        self.remote_name = match remote {
            "origin" => "default".to_string(),
            other => other.to_string(),
        };
        self
    }

    /// `hg clone <remote> <path>`
    pub fn clone_repo(remote: &str, path: &Path) -> Result<(), VcsError> {
        let mut cmd = Command::new("hg");
        cmd.args(["clone", "--quiet", remote]).arg(path);
        run(cmd, &format!("hg clone {}", remote))?;
        Ok(())
    }

    fn hg_cmd(&self) -> Command {
        let mut cmd = Command::new("hg");
        cmd.arg("--cwd").arg(&self.root);
        cmd.env("HGPLAIN", "1");
        cmd
    }

    fn hg(&self, args: &[&str]) -> Result<String, VcsError> {
        let mut cmd = self.hg_cmd();
        cmd.args(args);
        let output = run(cmd, &format!("hg {}", args.join(" ")))?;
        Ok(stdout_of(&output))
    }

    /// Node of the changeset tagged `tag`, if the tag exists.
    fn tag_node(&self, tag: &str) -> Result<Option<String>, VcsError> {
        let revset = format!("tag('{}')", tag);
        match self.hg(&["log", "-r", &revset, "-T", "{node}"]) {
            Ok(node) if !node.is_empty() => Ok(Some(node)),
            Ok(_) => Ok(None),
            // tag() aborts on unknown names
            Err(VcsError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl VersionControl for HgBackend {
    fn kind(&self) -> VcsKind {
        VcsKind::Mercurial
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn vcs_dir(&self) -> PathBuf {
        self.root.join(".hg")
    }

    fn remote(&self) -> Result<Option<String>, VcsError> {
        match self.hg(&["paths", &self.remote_name]) {
            Ok(url) if !url.is_empty() => Ok(Some(url)),
            Ok(_) | Err(VcsError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn tags(&self) -> Result<Vec<String>, VcsError> {
        let out = self.hg(&["tags", "--quiet"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|t| !t.is_empty() && *t != "tip")
            .map(String::from)
            .collect())
    }

    fn tags_at_head(&self) -> Result<Vec<String>, VcsError> {
        let out = self.hg(&["log", "-r", ".", "-T", "{join(tags, '\\n')}"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|t| !t.is_empty() && *t != "tip")
            .map(String::from)
            .collect())
    }

    fn version_info_of(&self, tag: &str) -> Result<Option<VersionInfo>, VcsError> {
        let Some(node) = self.tag_node(tag)? else {
            return Ok(None);
        };
        let message = self.hg(&["log", "-r", &node, "-T", "{desc}"])?;

        match parse_version_info(&message) {
            Ok(info) => Ok(Some(info)),
            Err(e) => {
                debug!(tag, error = %e, "tag does not carry a stamp record");
                Ok(None)
            }
        }
    }

    fn changeset(&self) -> Result<String, VcsError> {
        self.hg(&["log", "-r", ".", "-T", "{node}"])
    }

    fn last_user_changeset(&self) -> Result<String, VcsError> {
        let revset = format!(
            "last(ancestors(.) and not user('literal:{}'))",
            self.stamp_author
        );
        let node = self.hg(&["log", "-r", &revset, "-T", "{node}"])?;
        if node.is_empty() {
            return self.changeset();
        }
        Ok(node)
    }

    fn active_branch(&self, _raise_if_detached: bool) -> Result<String, VcsError> {
        self.hg(&["branch"])
    }

    fn commit(&self, message: &str, author: &str, include: &[PathBuf]) -> Result<String, VcsError> {
        let mut cmd = self.hg_cmd();
        cmd.args(["commit", "--addremove", "--config", "ui.allowemptycommit=True"])
            .args(["-u", author, "-m", message]);
        for path in include {
            cmd.arg(path);
        }
        run(cmd, "hg commit")?;
        self.changeset()
    }

    fn create_tag(&self, name: &str, rev: &str, author: &str, force: bool) -> Result<(), VcsError> {
        let mut args = vec!["tag", "-u", author, "-r", rev];
        if force {
            args.push("-f");
        }
        args.push(name);

        match self.hg(&args) {
            Ok(_) => Ok(()),
            Err(VcsError::CommandFailed { stderr, .. }) if stderr.contains("already exists") => {
                Err(VcsError::TagExists {
                    tag: name.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn create_tags(
        &self,
        names: &[String],
        rev: &str,
        author: &str,
        force: bool,
    ) -> Result<(), VcsError> {
        if names.is_empty() {
            return Ok(());
        }
        let mut args = vec!["tag", "-u", author, "-r", rev];
        if force {
            args.push("-f");
        }
        args.extend(names.iter().map(String::as_str));

        match self.hg(&args) {
            Ok(_) => Ok(()),
            Err(VcsError::CommandFailed { stderr, .. }) if stderr.contains("already exists") => {
                Err(VcsError::TagExists {
                    tag: names.join(", "),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn push(&self, _tags: &[String]) -> Result<(), VcsError> {
        // Tags travel inside .hgtags commits; pushing the branch head pushes them.
        let mut cmd = self.hg_cmd();
        cmd.args(["push", "-r", ".", &self.remote_name]);
        let output = cmd.output().map_err(|e| VcsError::Spawn {
            command: "hg push".into(),
            source: e,
        })?;

        // Exit code 1 means there was nothing to push.
        match output.status.code() {
            Some(0) | Some(1) => Ok(()),
            _ => Err(VcsError::PushRejected {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    /// Tags are commits to `.hgtags`, so they cannot travel without the
    /// branch head.
    fn push_tags(&self, tags: &[String]) -> Result<(), VcsError> {
        self.push(tags)
    }

    fn pull(&self) -> Result<(), VcsError> {
        self.hg(&["pull", "--update", &self.remote_name])?;
        Ok(())
    }

    fn checkout(&self, rev: &str) -> Result<(), VcsError> {
        self.hg(&["update", "-r", rev])?;
        Ok(())
    }

    fn checkout_branch_tip(&self) -> Result<String, VcsError> {
        let branch = self.active_branch(false)?;
        self.hg(&["update", &branch])?;
        self.changeset()
    }

    fn pending_local_changes(&self) -> Result<Option<String>, VcsError> {
        let out = self.hg(&["status", "-mard"])?;
        if out.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "pending changes in {}: {}",
            self.root.display(),
            out.lines().collect::<Vec<_>>().join(", ")
        )))
    }

    fn outgoing_unpushed_changes(
        &self,
        _skip_detached_check: bool,
    ) -> Result<Option<String>, VcsError> {
        let mut cmd = self.hg_cmd();
        cmd.args(["outgoing", "--quiet", &self.remote_name]);
        let output = cmd.output().map_err(|e| VcsError::Spawn {
            command: "hg outgoing".into(),
            source: e,
        })?;

        // 0: outgoing changesets exist, 1: none, anything else: no usable remote.
        match output.status.code() {
            Some(0) => {
                let count = stdout_of(&output).lines().count();
                Ok(Some(format!(
                    "outgoing changes in {}: {} changeset(s) not pushed",
                    self.root.display(),
                    count
                )))
            }
            _ => Ok(None),
        }
    }

    fn checkpoint(&self, tags: &[String]) -> Result<Checkpoint, VcsError> {
        let head = self.changeset()?;
        let mut recorded = std::collections::BTreeMap::new();
        for tag in tags {
            recorded.insert(tag.clone(), self.tag_node(tag)?);
        }
        Ok(Checkpoint {
            head,
            tags: recorded,
        })
    }

    fn revert(&self, checkpoint: &Checkpoint) -> Result<(), VcsError> {
        let revset = format!("descendants({0}) - {0}", checkpoint.head);
        let created = self.hg(&["log", "-r", &revset, "-T", "{node}\\n"])?;

        if !created.is_empty() {
            debug!(head = %checkpoint.head, "stripping stamp changesets");
            self.hg(&[
                "--config",
                "extensions.strip=",
                "strip",
                "--no-backup",
                "-r",
                &revset,
            ])?;
        }
        self.hg(&["update", "--clean", "-r", &checkpoint.head])?;

        Ok(())
    }
}
