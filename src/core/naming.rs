//! core::naming
//!
//! Tag naming scheme and app name validation.
//!
//! Tag names are persisted in every repository that vmn stamps, so the scheme
//! is fixed:
//!
//! - versioned tag: `<app>_<formatted version>`
//! - moving tag: `_-<app>_<branch>`
//!
//! where `<app>` is the app name with every `/` replaced by `-`.
//!
//! # Example
//!
//! ```
//! use vmn::core::naming::{moving_tag_name, version_tag_name, version_tag_prefix, AppName};
//!
//! let app = AppName::new("sys/svc").unwrap();
//! assert_eq!(version_tag_name(&app, "1.2.3"), "sys-svc_1.2.3");
//! assert_eq!(version_tag_prefix(&app), "sys-svc_");
//! assert_eq!(moving_tag_name(&app, "main"), "_-sys-svc_main");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix reserved for moving tags. App names may not start with it.
pub const MOVING_TAG_PREFIX: &str = "_-";

/// Errors from app name validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("app name cannot be empty")]
    Empty,

    #[error("app name cannot start with {MOVING_TAG_PREFIX}")]
    ReservedPrefix,

    #[error("app name '{0}' contains an invalid path component")]
    InvalidComponent(String),

    #[error("app name '{name}' cannot contain '{ch}'")]
    InvalidChar { name: String, ch: char },
}

/// A validated app name.
///
/// Names may be hierarchical (`sys/svc`); everything before the last `/`
/// names the root app the app belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppName(String);

impl AppName {
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), NameError> {
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name.starts_with(MOVING_TAG_PREFIX) {
            return Err(NameError::ReservedPrefix);
        }
        for component in name.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(NameError::InvalidComponent(name.to_string()));
            }
        }

        // Characters git refuses in tag names.
        const INVALID_CHARS: [char; 9] = [' ', '~', '^', ':', '\\', '?', '*', '[', '@'];
        for ch in name.chars() {
            if INVALID_CHARS.contains(&ch) || ch.is_ascii_control() {
                return Err(NameError::InvalidChar {
                    name: name.to_string(),
                    ch,
                });
            }
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as used inside tag names (`/` replaced by `-`).
    pub fn tag_component(&self) -> String {
        self.0.replace('/', "-")
    }

    /// The root app implied by a hierarchical name, if any.
    ///
    /// ```
    /// use vmn::core::naming::AppName;
    ///
    /// let app = AppName::new("a/b/c").unwrap();
    /// assert_eq!(app.parent().unwrap().as_str(), "a/b");
    /// assert!(AppName::new("solo").unwrap().parent().is_none());
    /// ```
    pub fn parent(&self) -> Option<AppName> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| AppName(parent.to_string()))
    }
}

impl TryFrom<String> for AppName {
    type Error = NameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AppName> for String {
    fn from(name: AppName) -> Self {
        name.0
    }
}

impl AsRef<str> for AppName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the immutable tag for one stamped version.
pub fn version_tag_name(app: &AppName, formatted_version: &str) -> String {
    format!("{}_{}", app.tag_component(), formatted_version)
}

/// Prefix shared by every versioned tag of `app`.
pub fn version_tag_prefix(app: &AppName) -> String {
    format!("{}_", app.tag_component())
}

/// Name of the tag that follows the latest stamp of `app` on `branch`.
pub fn moving_tag_name(app: &AppName, branch: &str) -> String {
    format!("{}{}_{}", MOVING_TAG_PREFIX, app.tag_component(), branch)
}

/// Whether a tag name belongs to the moving-tag namespace.
pub fn is_moving_tag(tag: &str) -> bool {
    tag.starts_with(MOVING_TAG_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(AppName::new("svc").is_ok());
        assert!(AppName::new("sys/svc").is_ok());
        assert!(AppName::new("my_app-2").is_ok());
    }

    #[test]
    fn rejects_reserved_prefix() {
        assert_eq!(AppName::new("_-svc"), Err(NameError::ReservedPrefix));
    }

    #[test]
    fn rejects_bad_components() {
        assert!(matches!(AppName::new("a//b"), Err(NameError::InvalidComponent(_))));
        assert!(matches!(AppName::new("/a"), Err(NameError::InvalidComponent(_))));
        assert!(matches!(AppName::new("a/.."), Err(NameError::InvalidComponent(_))));
    }

    #[test]
    fn rejects_invalid_chars() {
        assert!(matches!(
            AppName::new("a b"),
            Err(NameError::InvalidChar { ch: ' ', .. })
        ));
        assert_eq!(AppName::new(""), Err(NameError::Empty));
    }

    #[test]
    fn tag_names() {
        let app = AppName::new("svc").unwrap();
        assert_eq!(version_tag_name(&app, "0.0.1"), "svc_0.0.1");
        assert_eq!(moving_tag_name(&app, "main"), "_-svc_main");
        assert!(is_moving_tag(&moving_tag_name(&app, "main")));
        assert!(!is_moving_tag(&version_tag_name(&app, "0.0.1")));
    }

    #[test]
    fn version_tags_start_with_prefix() {
        let app = AppName::new("a/b").unwrap();
        assert!(version_tag_name(&app, "1.0.0").starts_with(&version_tag_prefix(&app)));
    }

    #[test]
    fn serde_validates() {
        let name: AppName = serde_yaml::from_str("svc").unwrap();
        assert_eq!(name.as_str(), "svc");
        assert!(serde_yaml::from_str::<AppName>("_-svc").is_err());
    }
}
