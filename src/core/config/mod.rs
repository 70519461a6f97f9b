//! core::config
//!
//! Tool settings schema and loading.
//!
//! # Overview
//!
//! vmn has two settings scopes:
//! - **Global**: user-level settings
//! - **Repo**: settings tracked with the repository in `.vmn/config.toml`
//!
//! These are tool settings (author, retry policy, worker counts). Per-app
//! configuration lives in the YAML documents handled by
//! [`crate::core::metadata::store`].
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags and environment (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order, first hit wins:
//! 1. `$VMN_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/vmn/config.toml`
//! 3. `~/.vmn/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use vmn::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/repo/.vmn/config.toml"))).unwrap();
//! println!("author: {}", config.author());
//! println!("attempts: {}", config.max_attempts());
//! ```

pub mod schema;

pub use schema::{ConfigFile, GotoSettings, ReleaseSettings, StampSettings};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Default author of stamp commits and tags.
pub const DEFAULT_AUTHOR: &str = "vmn";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence automatically: repo overrides global,
/// global overrides defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: ConfigFile,
    pub repo: ConfigFile,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the global locations and, if given, the
    /// repository settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// holds invalid values. Missing files are not an error.
    pub fn load(repo_config: Option<&Path>) -> Result<Config, ConfigError> {
        let global_path = Self::find_global();
        let repo_path = repo_config.filter(|p| p.is_file()).map(Path::to_path_buf);
        Self::from_files(global_path.as_deref(), repo_path.as_deref())
    }

    /// Load configuration from explicit file paths.
    pub fn from_files(global: Option<&Path>, repo: Option<&Path>) -> Result<Config, ConfigError> {
        let config = Config {
            global: global.map(Self::read_file).transpose()?.unwrap_or_default(),
            repo: repo.map(Self::read_file).transpose()?.unwrap_or_default(),
            global_path: global.map(Path::to_path_buf),
            repo_path: repo.map(Path::to_path_buf),
        };

        config.global.validate()?;
        config.repo.validate()?;
        config.validate_merged()?;

        Ok(config)
    }

    /// Build configuration from in-memory repo-scoped settings.
    pub fn from_settings(repo: ConfigFile) -> Result<Config, ConfigError> {
        repo.validate()?;
        let config = Config {
            repo,
            ..Config::default()
        };
        config.validate_merged()?;
        Ok(config)
    }

    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("VMN_CONFIG") {
            let path = PathBuf::from(path);
            if path.is_file() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("vmn/config.toml");
            if path.is_file() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".vmn/config.toml"))
            .filter(|path| path.is_file())
    }

    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Checks that only hold across scopes (a global minimum with a repo maximum).
    fn validate_merged(&self) -> Result<(), ConfigError> {
        let (min, max) = self.backoff_secs();
        if min > max {
            return Err(ConfigError::InvalidValue(format!(
                "stamp backoff range {}..={} is empty",
                min, max
            )));
        }
        Ok(())
    }

    fn pick<T: Clone>(&self, get: impl Fn(&ConfigFile) -> Option<T>) -> Option<T> {
        get(&self.repo).or_else(|| get(&self.global))
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Author of stamp commits and tags. Defaults to "vmn".
    pub fn author(&self) -> String {
        self.pick(|f| f.author.clone())
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string())
    }

    /// Remote name. Defaults to "origin".
    pub fn remote(&self) -> String {
        self.pick(|f| f.remote.clone())
            .unwrap_or_else(|| "origin".to_string())
    }

    /// Publish attempts per stamp. Defaults to 3.
    pub fn max_attempts(&self) -> u32 {
        self.pick(|f| f.stamp.as_ref().and_then(|s| s.max_attempts))
            .unwrap_or(3)
    }

    /// Inclusive push-conflict backoff range in seconds. Defaults to 1..=5.
    pub fn backoff_secs(&self) -> (u64, u64) {
        let min = self
            .pick(|f| f.stamp.as_ref().and_then(|s| s.backoff_min_secs))
            .unwrap_or(1);
        let max = self
            .pick(|f| f.stamp.as_ref().and_then(|s| s.backoff_max_secs))
            .unwrap_or(5);
        (min, max)
    }

    /// Backoff range as durations.
    pub fn backoff_range(&self) -> (Duration, Duration) {
        let (min, max) = self.backoff_secs();
        (Duration::from_secs(min), Duration::from_secs(max))
    }

    /// Clone pool size limit. Defaults to 10.
    pub fn clone_workers(&self) -> usize {
        self.pick(|f| f.goto.as_ref().and_then(|g| g.clone_workers))
            .unwrap_or(10)
    }

    /// Pull/checkout pool size limit. Defaults to 20.
    pub fn pull_workers(&self) -> usize {
        self.pick(|f| f.goto.as_ref().and_then(|g| g.pull_workers))
            .unwrap_or(20)
    }

    /// Branches `release` may run on. Empty allows any branch.
    pub fn release_branches(&self) -> Vec<String> {
        self.pick(|f| f.release.as_ref().and_then(|r| r.branches.clone()))
            .unwrap_or_default()
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}
