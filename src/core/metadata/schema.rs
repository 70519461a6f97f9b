//! core::metadata::schema
//!
//! Stamp record and config document schemas.
//!
//! # Stamp Records
//!
//! Every stamp commit carries a [`VersionInfo`] serialized as YAML in its
//! commit message. The record is self-describing through
//! `vmn_info.description_message_version`; [`parse_version_info`] checks it
//! before parsing the rest, the same way any other versioned envelope would be
//! dispatched.
//!
//! # Config Documents
//!
//! - [`AppConfDoc`] - `.vmn/<app>/conf.yml`
//! - [`RootConfDoc`] - `.vmn/<root app>/root_conf.yml`
//!
//! # Example
//!
//! ```
//! use vmn::core::metadata::schema::parse_version_info;
//!
//! let message = r#"
//! vmn_info:
//!   description_message_version: '1'
//!   vmn_version: 0.3.0
//! stamping:
//!   msg: 'svc: update to version 0.0.1.0'
//!   app:
//!     name: svc
//!     version: 0.0.1
//!     _version: 0.0.1.0
//!     release_mode: patch
//!     previous_version: 0.0.0.0
//!     changesets:
//!       .:
//!         hash: abc
//!         remote: null
//!         vcs_type: git
//!     info: {}
//!   root_app: {}
//! "#;
//!
//! let info = parse_version_info(message).unwrap();
//! assert_eq!(info.stamping.app.version, "0.0.1");
//! assert!(info.stamping.root_app.is_none());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::naming::AppName;
use crate::core::template::DEFAULT_TEMPLATE;
use crate::core::types::{RepoStates, VcsKind};
use crate::core::version::{ReleaseMode, Version};

/// Stamp record format produced by this crate.
pub const DESCRIPTION_MESSAGE_VERSION: &str = "1";

/// Errors from parsing stamp records and config documents.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to parse stamp record: {0}")]
    ParseError(String),

    #[error("unsupported stamp record version '{0}', supported: {DESCRIPTION_MESSAGE_VERSION}")]
    UnsupportedVersion(String),

    #[error("failed to serialize stamp record: {0}")]
    SerializeError(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    vmn_info: VmnInfo,
}

/// Parse a stamp commit message.
///
/// # Errors
///
/// - [`MetadataError::ParseError`] if the message is not a stamp record
/// - [`MetadataError::UnsupportedVersion`] for an unknown record version
pub fn parse_version_info(message: &str) -> Result<VersionInfo, MetadataError> {
    let envelope: Envelope =
        serde_yaml::from_str(message).map_err(|e| MetadataError::ParseError(e.to_string()))?;

    match envelope.vmn_info.description_message_version.as_str() {
        DESCRIPTION_MESSAGE_VERSION => serde_yaml::from_str(message)
            .map_err(|e| MetadataError::ParseError(e.to_string())),
        other => Err(MetadataError::UnsupportedVersion(other.to_string())),
    }
}

/// A complete stamp record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub vmn_info: VmnInfo,
    pub stamping: Stamping,
}

impl VersionInfo {
    pub fn new(app: AppRecord, root_app: Option<RootAppRecord>) -> Self {
        let msg = format!("{}: update to version {}", app.name, app.raw_version);
        Self {
            vmn_info: VmnInfo::current(),
            stamping: Stamping { msg, app, root_app },
        }
    }

    /// Serialize to the commit message form.
    pub fn to_message(&self) -> Result<String, MetadataError> {
        serde_yaml::to_string(self).map_err(|e| MetadataError::SerializeError(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmnInfo {
    pub description_message_version: String,
    pub vmn_version: String,
}

impl VmnInfo {
    pub fn current() -> Self {
        Self {
            description_message_version: DESCRIPTION_MESSAGE_VERSION.to_string(),
            vmn_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamping {
    pub msg: String,
    pub app: AppRecord,

    /// Serialized as `{}` when the app has no root app.
    #[serde(with = "empty_map_as_none")]
    pub root_app: Option<RootAppRecord>,
}

/// The `app` section of a stamp record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppRecord {
    pub name: AppName,

    /// Version rendered through the app's template.
    pub version: String,

    /// Four-octet raw version.
    #[serde(rename = "_version")]
    pub raw_version: Version,

    pub release_mode: ReleaseMode,
    pub previous_version: Version,
    pub changesets: RepoStates,

    #[serde(default)]
    pub info: AppInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    /// Process environment at stamp time, when `extra_info` is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

/// The `root_app` section of a stamp record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootAppRecord {
    pub name: AppName,
    pub version: u64,

    /// The app whose stamp produced this root version.
    pub latest_service: AppName,

    /// Last raw version stamped for each child app.
    pub services: BTreeMap<String, Version>,

    #[serde(default)]
    pub external_services: BTreeMap<String, serde_yaml::Value>,
}

mod empty_map_as_none {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serde_yaml::Mapping::new().serialize(serializer),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: DeserializeOwned,
        D: Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        match &value {
            serde_yaml::Value::Null => Ok(None),
            serde_yaml::Value::Mapping(m) if m.is_empty() => Ok(None),
            _ => serde_yaml::from_value(value)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// One declared dependency repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDecl {
    #[serde(default)]
    pub remote: Option<String>,
    pub vcs_type: VcsKind,
}

/// Declared dependencies: declaring directory → repo directory name → decl.
pub type DependencyDecls = BTreeMap<String, BTreeMap<String, DependencyDecl>>;

/// Contents of `.vmn/<app>/conf.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfDoc {
    pub conf: AppConf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConf {
    #[serde(default = "default_template")]
    pub template: String,

    #[serde(default)]
    pub deps: DependencyDecls,

    #[serde(default)]
    pub extra_info: bool,
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl Default for AppConf {
    fn default() -> Self {
        Self {
            template: default_template(),
            deps: DependencyDecls::new(),
            extra_info: false,
        }
    }
}

impl AppConfDoc {
    pub fn new(conf: AppConf) -> Self {
        Self { conf }
    }
}

/// Contents of `.vmn/<root app>/root_conf.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootConfDoc {
    pub conf: RootConf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootConf {
    #[serde(default)]
    pub external_services: BTreeMap<String, serde_yaml::Value>,
}
