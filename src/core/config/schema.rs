//! core::config::schema
//!
//! Settings file schema.
//!
//! The same schema is used for the global file and the repository file; every
//! key is optional so a file only needs to name what it overrides.
//!
//! # Example
//!
//! ```toml
//! author = "vmn"
//! remote = "origin"
//!
//! [stamp]
//! max_attempts = 3
//! backoff_min_secs = 1
//! backoff_max_secs = 5
//!
//! [goto]
//! clone_workers = 10
//! pull_workers = 20
//!
//! [release]
//! branches = ["main"]
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// One settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Author name recorded on stamp commits and tags
    pub author: Option<String>,

    /// Remote name used for fetch and push (default: "origin")
    pub remote: Option<String>,

    pub stamp: Option<StampSettings>,
    pub goto: Option<GotoSettings>,
    pub release: Option<ReleaseSettings>,
}

impl ConfigFile {
    /// Validate the values present in this file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(author) = &self.author {
            if author.trim().is_empty() {
                return Err(ConfigError::InvalidValue("author cannot be empty".into()));
            }
        }

        if let Some(remote) = &self.remote {
            if remote.is_empty() {
                return Err(ConfigError::InvalidValue("remote cannot be empty".into()));
            }
        }

        if let Some(stamp) = &self.stamp {
            stamp.validate()?;
        }

        if let Some(goto) = &self.goto {
            goto.validate()?;
        }

        Ok(())
    }
}

/// Stamping retry settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StampSettings {
    /// Publish attempts before giving up
    pub max_attempts: Option<u32>,

    /// Lower bound of the randomized push-conflict backoff
    pub backoff_min_secs: Option<u64>,

    /// Upper bound of the randomized push-conflict backoff
    pub backoff_max_secs: Option<u64>,
}

impl StampSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue(
                "stamp.max_attempts must be at least 1".into(),
            ));
        }
        if let (Some(min), Some(max)) = (self.backoff_min_secs, self.backoff_max_secs) {
            if min > max {
                return Err(ConfigError::InvalidValue(format!(
                    "stamp.backoff_min_secs ({}) exceeds stamp.backoff_max_secs ({})",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

/// Dependency sync worker pool sizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GotoSettings {
    pub clone_workers: Option<usize>,
    pub pull_workers: Option<usize>,
}

impl GotoSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("goto.clone_workers", self.clone_workers),
            ("goto.pull_workers", self.pull_workers),
        ] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be at least 1",
                    key
                )));
            }
        }
        Ok(())
    }
}

/// Release branch policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseSettings {
    /// Branches `release` may run on; empty allows any branch
    pub branches: Option<Vec<String>>,
}
