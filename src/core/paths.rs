//! core::paths
//!
//! Centralized path routing for vmn storage locations.
//!
//! # Storage Layout
//!
//! Tracked data lives under `<root>/.vmn/`:
//! - `<changeset>` - empty marker written by `init`
//! - `config.toml` - repository-scoped tool settings
//! - `<app>/conf.yml` - app config document
//! - `<root app>/root_conf.yml` - root app config document
//!
//! Untracked process state lives in the VCS metadata directory:
//! - `<vcs dir>/vmn.lock` - inter-process stamping lock
//!
//! **Hard rule:** no code outside this module computes `.vmn` paths.
//!
//! # Example
//!
//! ```
//! use vmn::core::naming::AppName;
//! use vmn::core::paths::VmnPaths;
//! use std::path::PathBuf;
//!
//! let paths = VmnPaths::new(PathBuf::from("/work/repo"), PathBuf::from("/work/repo/.git"));
//! let app = AppName::new("sys/svc").unwrap();
//!
//! assert_eq!(
//!     paths.app_conf_path(&app),
//!     PathBuf::from("/work/repo/.vmn/sys/svc/conf.yml")
//! );
//! assert_eq!(paths.lock_path(), PathBuf::from("/work/repo/.git/vmn.lock"));
//! ```

use std::path::{Path, PathBuf};

use super::naming::AppName;

/// Name of the tracked vmn directory at the repository root.
pub const VMN_DIR: &str = ".vmn";

/// Centralized path routing for vmn storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmnPaths {
    /// Working tree root of the main repository.
    pub root: PathBuf,

    /// VCS metadata directory (`.git` or `.hg`), never tracked.
    pub vcs_dir: PathBuf,
}

impl VmnPaths {
    pub fn new(root: PathBuf, vcs_dir: PathBuf) -> Self {
        Self { root, vcs_dir }
    }

    /// `<root>/.vmn`
    pub fn vmn_dir(&self) -> PathBuf {
        self.root.join(VMN_DIR)
    }

    /// Whether `init` has been run in this repository.
    pub fn is_initialized(&self) -> bool {
        self.vmn_dir().is_dir()
    }

    /// `<root>/.vmn/<changeset>`, the marker file created by `init`.
    pub fn init_marker_path(&self, changeset: &str) -> PathBuf {
        self.vmn_dir().join(changeset)
    }

    /// `<root>/.vmn/config.toml`
    pub fn repo_config_path(&self) -> PathBuf {
        self.vmn_dir().join("config.toml")
    }

    /// `<root>/.vmn/<app>/conf.yml`
    pub fn app_conf_path(&self, app: &AppName) -> PathBuf {
        self.vmn_dir().join(app.as_str()).join("conf.yml")
    }

    /// `<root>/.vmn/<root app>/root_conf.yml`
    pub fn root_conf_path(&self, root_app: &AppName) -> PathBuf {
        self.vmn_dir().join(root_app.as_str()).join("root_conf.yml")
    }

    /// `<vcs dir>/vmn.lock`
    pub fn lock_path(&self) -> PathBuf {
        self.vcs_dir.join("vmn.lock")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> VmnPaths {
        VmnPaths::new(PathBuf::from("/repo"), PathBuf::from("/repo/.hg"))
    }

    #[test]
    fn vmn_dir() {
        assert_eq!(paths().vmn_dir(), PathBuf::from("/repo/.vmn"));
    }

    #[test]
    fn init_marker_path() {
        assert_eq!(
            paths().init_marker_path("abc"),
            PathBuf::from("/repo/.vmn/abc")
        );
    }

    #[test]
    fn repo_config_path() {
        assert_eq!(
            paths().repo_config_path(),
            PathBuf::from("/repo/.vmn/config.toml")
        );
    }

    #[test]
    fn root_conf_path() {
        let root = AppName::new("sys").unwrap();
        assert_eq!(
            paths().root_conf_path(&root),
            PathBuf::from("/repo/.vmn/sys/root_conf.yml")
        );
    }

    #[test]
    fn lock_lives_in_vcs_dir() {
        assert_eq!(paths().lock_path(), PathBuf::from("/repo/.hg/vmn.lock"));
    }

    #[test]
    fn not_initialized_without_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let paths = VmnPaths::new(temp.path().to_path_buf(), temp.path().join(".git"));
        assert!(!paths.is_initialized());
        std::fs::create_dir_all(paths.vmn_dir()).unwrap();
        assert!(paths.is_initialized());
    }
}
