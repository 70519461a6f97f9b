//! core::version
//!
//! Version tuples and the pure next-version generator.
//!
//! # Versions
//!
//! A [`Version`] is always held as four octets (major, minor, patch, micro).
//! Parsing accepts three or four dot-separated octets; a missing micro octet
//! defaults to `0`. The canonical string form (the "raw" version recorded in
//! stamps) always has four octets.
//!
//! # Release Modes
//!
//! | mode    | effect                                   |
//! |---------|------------------------------------------|
//! | `major` | major + 1, minor/patch/micro reset to 0  |
//! | `minor` | minor + 1, patch/micro reset to 0        |
//! | `patch` | patch + 1, micro reset to 0              |
//! | `micro` | micro + 1                                |
//!
//! # Example
//!
//! ```
//! use vmn::core::version::{ReleaseMode, Version};
//!
//! let v: Version = "0.0.0".parse().unwrap();
//! let v = v.next(ReleaseMode::Patch).unwrap();
//! assert_eq!(v.to_string(), "0.0.1.0");
//! assert_eq!(v.next(ReleaseMode::Micro).unwrap().to_string(), "0.0.1.1");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from version parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version '{0}': expected 3 or 4 dot-separated octets")]
    OctetCount(String),

    #[error("invalid version '{version}': octet '{octet}' is not a non-negative integer")]
    NotNumeric { version: String, octet: String },

    #[error("unknown release mode '{0}': expected major, minor, patch or micro")]
    UnknownReleaseMode(String),

    #[error("version {version} has no {mode} successor: octet overflow")]
    Overflow { version: String, mode: ReleaseMode },

    #[error("root app version {0} has no successor")]
    RootOverflow(u64),
}

/// How far a stamp moves the version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseMode {
    Major,
    Minor,
    Patch,
    Micro,
}

impl ReleaseMode {
    /// All modes, from the largest bump to the smallest.
    pub const ALL: [ReleaseMode; 4] = [
        ReleaseMode::Major,
        ReleaseMode::Minor,
        ReleaseMode::Patch,
        ReleaseMode::Micro,
    ];

    /// Index of the octet this mode increments.
    pub fn octet_index(self) -> usize {
        match self {
            ReleaseMode::Major => 0,
            ReleaseMode::Minor => 1,
            ReleaseMode::Patch => 2,
            ReleaseMode::Micro => 3,
        }
    }

    /// The mode that increments the octet at `index` (clamped to micro).
    pub fn for_octet(index: usize) -> Self {
        Self::ALL[index.min(3)]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseMode::Major => "major",
            ReleaseMode::Minor => "minor",
            ReleaseMode::Patch => "patch",
            ReleaseMode::Micro => "micro",
        }
    }
}

impl fmt::Display for ReleaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseMode {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(ReleaseMode::Major),
            "minor" => Ok(ReleaseMode::Minor),
            "patch" => Ok(ReleaseMode::Patch),
            "micro" => Ok(ReleaseMode::Micro),
            other => Err(VersionError::UnknownReleaseMode(other.to_string())),
        }
    }
}

/// A four-octet version.
///
/// Ordering is lexicographic over (major, minor, patch, micro).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    octets: [u64; 4],
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64, micro: u64) -> Self {
        Self {
            octets: [major, minor, patch, micro],
        }
    }

    pub fn major(&self) -> u64 {
        self.octets[0]
    }

    pub fn minor(&self) -> u64 {
        self.octets[1]
    }

    pub fn patch(&self) -> u64 {
        self.octets[2]
    }

    pub fn micro(&self) -> u64 {
        self.octets[3]
    }

    pub fn octets(&self) -> [u64; 4] {
        self.octets
    }

    /// Compute the version that follows `self` under `mode`.
    ///
    /// The octet selected by the mode is incremented and every lower octet is
    /// reset to zero. Fails when the selected octet is already `u64::MAX`.
    pub fn next(&self, mode: ReleaseMode) -> Result<Version, VersionError> {
        let idx = mode.octet_index();
        let mut octets = self.octets;
        octets[idx] = octets[idx]
            .checked_add(1)
            .ok_or_else(|| VersionError::Overflow {
                version: self.to_string(),
                mode,
            })?;
        for octet in octets.iter_mut().skip(idx + 1) {
            *octet = 0;
        }
        Ok(Version { octets })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(VersionError::OctetCount(s.to_string()));
        }

        let mut octets = [0u64; 4];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| VersionError::NotNumeric {
                version: s.to_string(),
                octet: part.to_string(),
            })?;
        }

        Ok(Version { octets })
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
