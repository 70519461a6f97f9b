//! engine::release
//!
//! The release gate: tag the current changeset as a release, optionally
//! with a dedicated release commit.
//!
//! # Version source
//!
//! With an explicit version, that version is released. Otherwise head must
//! carry a pre-release tag such as `svc_1.2.0-rc1`, and the release promotes
//! it to its final tag `svc_1.2.0`: the suffix starting at the first `-` of
//! the version part is dropped. A head with only final tags is refused.
//!
//! # Push
//!
//! Only the release tag is pushed, except with a release commit, when the
//! branch goes along with it.
//!
//! # Branch policy
//!
//! When a list of release branches is configured, releasing from any other
//! branch is refused before anything is touched.

use tracing::{info, warn};

use super::EngineError;
use crate::core::config::Config;
use crate::core::naming::is_moving_tag;
use crate::vcs::{VcsError, VersionControl};

/// Parameters of a release.
#[derive(Debug, Clone, Default)]
pub struct ReleaseRequest {
    /// Create a `Release <version>` commit before tagging.
    pub stamp: bool,

    /// Version to release; derived from the tags at head when `None`.
    pub version: Option<String>,

    /// Resolve everything, change nothing.
    pub dry_run: bool,

    /// Branches releases may come from. Empty falls back to the
    /// `release.branches` setting.
    pub allowed_branches: Vec<String>,
}

/// Result of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub version: String,
    pub branch: String,

    /// Changeset carrying the release tag; `None` on dry runs.
    pub changeset: Option<String>,
}

/// Release the working copy parent of `vcs`.
pub fn release(
    vcs: &dyn VersionControl,
    config: &Config,
    request: &ReleaseRequest,
) -> Result<ReleaseOutcome, EngineError> {
    if request.stamp && request.version.is_some() {
        return Err(EngineError::ReleasePolicy(
            "--stamp cannot be combined with an explicit version".into(),
        ));
    }

    let branch = match vcs.active_branch(true) {
        Ok(branch) => branch,
        Err(VcsError::DetachedHead) => "HEAD".to_string(),
        Err(e) => return Err(e.into()),
    };

    let allowed = if request.allowed_branches.is_empty() {
        config.release_branches()
    } else {
        request.allowed_branches.clone()
    };
    if !allowed.is_empty() && !allowed.contains(&branch) {
        return Err(EngineError::ReleasePolicy(format!(
            "branch {} is not a release branch (allowed: {})",
            branch,
            allowed.join(", ")
        )));
    }

    let version = match &request.version {
        Some(version) => version.clone(),
        None => version_from_head(vcs)?,
    };

    if request.dry_run {
        info!(%version, %branch, "dry run; nothing released");
        return Ok(ReleaseOutcome {
            version,
            branch,
            changeset: None,
        });
    }

    let author = config.author();
    let tags = vec![version.clone()];
    let checkpoint = vcs.checkpoint(&tags)?;

    let result = (|| -> Result<String, VcsError> {
        let changeset = if request.stamp {
            vcs.commit(&format!("Release {}", version), &author, &[])?
        } else {
            vcs.changeset()?
        };
        vcs.create_tag(&version, &changeset, &author, false)?;
        if request.stamp {
            vcs.push(&tags)?;
        } else {
            vcs.push_tags(&tags)?;
        }
        Ok(changeset)
    })();

    match result {
        Ok(changeset) => {
            info!(%version, %branch, %changeset, "released");
            Ok(ReleaseOutcome {
                version,
                branch,
                changeset: Some(changeset),
            })
        }
        Err(e) => {
            warn!(error = %e, %version, "release failed; reverting");
            if let Err(revert) = vcs.revert(&checkpoint) {
                warn!(error = %revert, "failed to revert release");
            }
            Err(e.into())
        }
    }
}

fn version_from_head(vcs: &dyn VersionControl) -> Result<String, EngineError> {
    let tags = vcs.tags_at_head()?;
    let mut versioned = tags.iter().filter(|tag| !is_moving_tag(tag)).peekable();
    if versioned.peek().is_none() {
        return Err(EngineError::ReleasePolicy(
            "no version given and no tag points at the current changeset".into(),
        ));
    }

    versioned
        .find_map(|tag| final_tag_of(tag))
        .map(String::from)
        .ok_or_else(|| {
            EngineError::ReleasePolicy(format!(
                "no pre-release tag at the current changeset (found: {})",
                tags.join(", ")
            ))
        })
}

/// `svc_1.2.0-rc1` → `svc_1.2.0`; `None` for tags without a pre-release
/// suffix.
fn final_tag_of(tag: &str) -> Option<&str> {
    let start = tag.rfind('_').map_or(0, |idx| idx + 1);
    match tag[start..].find('-') {
        Some(0) | None => None,
        Some(dash) => Some(&tag[..start + dash]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ConfigFile, ReleaseSettings};
    use crate::vcs::mock::MockOperation;
    use crate::vcs::MockVcs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, MockVcs) {
        let temp = TempDir::new().unwrap();
        let vcs = MockVcs::new(&temp.path().join("main")).unwrap();
        (temp, vcs)
    }

    #[test]
    fn final_tag_drops_pre_release_suffix() {
        assert_eq!(final_tag_of("app_0.0.1-rc1"), Some("app_0.0.1"));
        assert_eq!(final_tag_of("sys-app_1.2.0-beta-2"), Some("sys-app_1.2.0"));
        assert_eq!(final_tag_of("app_0.0.1"), None);
        assert_eq!(final_tag_of("sys-app_0.0.1"), None);
        assert_eq!(final_tag_of("app_-rc1"), None);
    }

    #[test]
    fn stamp_promotes_pre_release_with_release_commit() {
        let (_temp, vcs) = setup();
        vcs.add_foreign_tag("app_0.0.1-rc1");

        let outcome = release(
            &vcs,
            &Config::default(),
            &ReleaseRequest {
                stamp: true,
                ..Default::default()
            },
        )
        .unwrap();

        let changeset = outcome.changeset.clone().unwrap();
        assert_eq!(outcome.version, "app_0.0.1");
        assert_eq!(vcs.head_message(), "Release app_0.0.1");
        assert_eq!(vcs.tag_targets()["app_0.0.1"], changeset);
        assert!(vcs.remote_tags().contains_key("app_0.0.1"));
        assert_eq!(vcs.remote_head(), changeset);
    }

    #[test]
    fn release_without_commit_pushes_only_the_tag() {
        let (_temp, vcs) = setup();
        let pushed = vcs.remote_head();
        let head = vcs.user_commit("feature", "alice");
        vcs.add_foreign_tag("app_0.2.0-rc3");

        let outcome = release(&vcs, &Config::default(), &ReleaseRequest::default()).unwrap();

        assert_eq!(outcome.version, "app_0.2.0");
        assert_eq!(outcome.changeset, Some(head.clone()));
        assert_eq!(vcs.remote_tags()["app_0.2.0"], head);
        assert_eq!(vcs.remote_head(), pushed);
        assert!(vcs.operations().contains(&MockOperation::Push {
            tags: vec!["app_0.2.0".into()],
            branch: false,
            accepted: true,
        }));
    }

    #[test]
    fn final_tag_at_head_is_refused() {
        let (_temp, vcs) = setup();
        vcs.add_foreign_tag("app_0.0.1");

        let err = release(
            &vcs,
            &Config::default(),
            &ReleaseRequest {
                stamp: true,
                ..Default::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::ReleasePolicy(_)));
        assert_eq!(vcs.commit_count(), 1);
        assert!(vcs.operations().is_empty());
    }

    #[test]
    fn explicit_version_tags_head_without_commit() {
        let (_temp, vcs) = setup();
        let head = vcs.changeset().unwrap();

        let outcome = release(
            &vcs,
            &Config::default(),
            &ReleaseRequest {
                version: Some("1.2.0".into()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(outcome.changeset, Some(head.clone()));
        assert_eq!(vcs.commit_count(), 1);
        assert_eq!(vcs.tag_targets()["1.2.0"], head);
    }

    #[test]
    fn dry_run_changes_nothing() {
        let (_temp, vcs) = setup();
        vcs.add_foreign_tag("app_0.0.1-rc1");
        let before = vcs.tag_targets();

        let outcome = release(
            &vcs,
            &Config::default(),
            &ReleaseRequest {
                stamp: true,
                dry_run: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(outcome.version, "app_0.0.1");
        assert!(outcome.changeset.is_none());
        assert_eq!(vcs.tag_targets(), before);
        assert_eq!(vcs.commit_count(), 1);
        assert!(vcs.operations().is_empty());
    }

    #[test]
    fn push_failure_rolls_back_commit_and_tag() {
        let (_temp, vcs) = setup();
        vcs.add_foreign_tag("app_0.0.1-rc1");
        vcs.fail_next_pushes(1);
        let head = vcs.changeset().unwrap();

        let err = release(
            &vcs,
            &Config::default(),
            &ReleaseRequest {
                stamp: true,
                ..Default::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::Vcs(VcsError::PushRejected { .. })));
        assert_eq!(vcs.changeset().unwrap(), head);
        assert!(!vcs.tag_targets().contains_key("app_0.0.1"));
        assert!(vcs
            .operations()
            .iter()
            .any(|op| matches!(op, MockOperation::Revert)));
    }

    #[test]
    fn branch_outside_policy_is_refused() {
        let (_temp, vcs) = setup();
        vcs.add_foreign_tag("app_0.0.1-rc1");

        let err = release(
            &vcs,
            &Config::default(),
            &ReleaseRequest {
                allowed_branches: vec!["release".into(), "hotfix".into()],
                ..Default::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::ReleasePolicy(_)));
        assert!(vcs.operations().is_empty());
    }

    #[test]
    fn configured_branches_apply_without_override() {
        let (_temp, vcs) = setup();
        let config = Config::from_settings(ConfigFile {
            release: Some(ReleaseSettings {
                branches: Some(vec!["main".into()]),
            }),
            ..Default::default()
        })
        .unwrap();

        let outcome = release(
            &vcs,
            &config,
            &ReleaseRequest {
                version: Some("2.0.0".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(outcome.branch, "main");
    }

    #[test]
    fn stamp_with_version_is_refused() {
        let (_temp, vcs) = setup();
        let err = release(
            &vcs,
            &Config::default(),
            &ReleaseRequest {
                stamp: true,
                version: Some("1.0.0".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ReleasePolicy(_)));
    }

    #[test]
    fn untagged_head_without_version_is_refused() {
        let (_temp, vcs) = setup();
        vcs.add_foreign_tag("_-app_main");
        let err = release(&vcs, &Config::default(), &ReleaseRequest::default()).unwrap_err();
        assert!(matches!(err, EngineError::ReleasePolicy(_)));
    }
}
