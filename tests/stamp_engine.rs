//! Stamping behavior against the in-memory backend.
//!
//! These tests drive the stamp loop directly so that conflicts and push
//! failures can be injected deterministically.

use std::path::Path;

use tempfile::TempDir;

use vmn::core::app::AppLayout;
use vmn::core::config::{Config, ConfigFile, StampSettings};
use vmn::core::types::{RepoState, RepoStates, VcsKind};
use vmn::core::version::{ReleaseMode, Version};
use vmn::engine::stamp::drive_stamping;
use vmn::engine::{stamp, EngineError, StampContext, StampOutcome, StampRequest};
use vmn::vcs::{MockVcs, VersionControl};

// =============================================================================
// Test Fixtures
// =============================================================================

struct Fixture {
    _dir: TempDir,
    vcs: MockVcs,
    config: Config,
}

impl Fixture {
    /// A tracked mock repository with zero backoff.
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let vcs = mock_repo(&dir.path().join("main"));
        Self {
            _dir: dir,
            vcs,
            config: fast_config(),
        }
    }

    fn stamp(&self, app: &str, mode: ReleaseMode) -> Result<StampOutcome, EngineError> {
        self.stamp_with(app, mode, false)
    }

    fn stamp_with(
        &self,
        app: &str,
        mode: ReleaseMode,
        pull: bool,
    ) -> Result<StampOutcome, EngineError> {
        stamp_in(&self.vcs, &self.config, app, mode, pull)
    }
}

fn mock_repo(root: &Path) -> MockVcs {
    let vcs = MockVcs::new(root).expect("failed to create mock repo");
    std::fs::create_dir_all(root.join(".vmn")).unwrap();
    vcs
}

fn fast_config() -> Config {
    Config::from_settings(ConfigFile {
        stamp: Some(StampSettings {
            max_attempts: Some(3),
            backoff_min_secs: Some(0),
            backoff_max_secs: Some(0),
        }),
        ..Default::default()
    })
    .unwrap()
}

fn stamp_in(
    vcs: &MockVcs,
    config: &Config,
    app: &str,
    mode: ReleaseMode,
    pull: bool,
) -> Result<StampOutcome, EngineError> {
    let ctx = StampContext::acquire(vcs, config)?;
    let layout = AppLayout::resolve(&ctx.paths, app, false)?;

    let mut states = RepoStates::new();
    states.insert(
        ".".into(),
        RepoState::new(vcs.changeset()?, vcs.remote()?, VcsKind::Git),
    );

    let request = StampRequest {
        name: app.to_string(),
        release_mode: mode,
        starting_version: Version::default(),
        pull,
    };
    drive_stamping(&ctx, &layout, &request, &states)
}

// =============================================================================
// Versions
// =============================================================================

#[test]
fn first_patch_then_micro() {
    let f = Fixture::new();

    let first = f.stamp("svc", ReleaseMode::Patch).unwrap();
    assert_eq!(first.version, "0.0.1");
    assert!(first.created);

    f.vcs.user_commit("feature", "alice");
    let second = f.stamp("svc", ReleaseMode::Micro).unwrap();
    assert_eq!(second.version, "0.0.1.1");
}

#[test]
fn stamping_unchanged_state_is_idempotent() {
    let f = Fixture::new();

    let first = f.stamp("svc", ReleaseMode::Patch).unwrap();
    let commits = f.vcs.commit_count();
    let tags = f.vcs.tag_targets();

    let second = f.stamp("svc", ReleaseMode::Patch).unwrap();

    assert_eq!(second.version, first.version);
    assert!(!second.created);
    assert_eq!(second.attempts, 0);
    assert_eq!(f.vcs.commit_count(), commits);
    assert_eq!(f.vcs.tag_targets(), tags);
}

#[test]
fn versions_increase_and_reset_lower_octets() {
    let f = Fixture::new();
    let mut seen = Vec::new();

    for (i, mode) in [
        ReleaseMode::Patch,
        ReleaseMode::Micro,
        ReleaseMode::Micro,
        ReleaseMode::Micro,
        ReleaseMode::Patch,
        ReleaseMode::Minor,
        ReleaseMode::Major,
    ]
    .into_iter()
    .enumerate()
    {
        f.vcs.user_commit(&format!("change {i}"), "alice");
        seen.push(f.stamp("svc", mode).unwrap().version);
    }

    assert_eq!(
        seen,
        vec!["0.0.1", "0.0.1.1", "0.0.1.2", "0.0.1.3", "0.0.2", "0.1.0", "1.0.0"]
    );
}

#[test]
fn stamp_record_carries_provenance() {
    let f = Fixture::new();
    let user = f.vcs.user_commit("feature", "alice");

    f.stamp("svc", ReleaseMode::Minor).unwrap();

    let info = f.vcs.version_info_of("svc_0.1.0").unwrap().unwrap();
    assert_eq!(info.stamping.msg, "svc: update to version 0.1.0.0");
    assert_eq!(info.stamping.app.changesets["."].hash, user);
    assert_eq!(
        info.stamping.app.changesets["."].remote.as_deref(),
        Some("mock://origin")
    );
    assert!(info.stamping.root_app.is_none());
}

// =============================================================================
// Root apps
// =============================================================================

#[test]
fn root_app_counts_every_service_stamp() {
    let f = Fixture::new();

    f.stamp("sys/svc", ReleaseMode::Patch).unwrap();
    f.vcs.user_commit("web work", "alice");
    f.stamp("sys/web", ReleaseMode::Minor).unwrap();

    let info = f.vcs.version_info_of("_-sys_main").unwrap().unwrap();
    let root = info.stamping.root_app.unwrap();
    assert_eq!(root.version, 2);
    assert_eq!(root.latest_service.as_str(), "sys/web");
    assert_eq!(root.services.len(), 2);
    assert!(f.vcs.tag_targets().contains_key("sys_1"));
    assert!(f.vcs.tag_targets().contains_key("sys_2"));
}

// =============================================================================
// Conflicts and rollback
// =============================================================================

#[test]
fn tag_conflict_retries_with_micro_bump() {
    let f = Fixture::new();
    f.vcs.add_foreign_tag("svc_0.0.1");

    let outcome = f.stamp("svc", ReleaseMode::Patch).unwrap();

    assert_eq!(outcome.version, "0.0.1.1");
    assert_eq!(outcome.attempts, 2);
    assert!(f.vcs.remote_tags().contains_key("svc_0.0.1.1"));
}

#[test]
fn push_conflict_without_pull_fails_and_rolls_back() {
    let f = Fixture::new();
    f.vcs.fail_next_pushes(1);
    let head = f.vcs.changeset().unwrap();
    let tags = f.vcs.tag_targets();

    let err = f.stamp("svc", ReleaseMode::Patch).unwrap_err();

    assert!(matches!(err, EngineError::PushConflict { .. }));
    assert_eq!(f.vcs.changeset().unwrap(), head);
    assert_eq!(f.vcs.tag_targets(), tags);
}

#[test]
fn push_conflict_with_pull_retries() {
    let f = Fixture::new();
    f.vcs.fail_next_pushes(1);

    let outcome = f.stamp_with("svc", ReleaseMode::Patch, true).unwrap();

    assert_eq!(outcome.version, "0.0.1");
    assert_eq!(outcome.attempts, 2);
}

#[test]
fn exhausted_attempts_leave_no_trace() {
    let f = Fixture::new();
    f.vcs.fail_next_pushes(3);
    let head = f.vcs.changeset().unwrap();
    let tags = f.vcs.tag_targets();

    let err = f.stamp_with("svc", ReleaseMode::Patch, true).unwrap_err();

    match err {
        EngineError::StampingFailed { app, attempts } => {
            assert_eq!(app, "svc");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(f.vcs.changeset().unwrap(), head);
    assert_eq!(f.vcs.tag_targets(), tags);
    assert!(f.vcs.remote_tags().is_empty());
}

#[test]
fn pulls_remote_stamp_before_building() {
    let temp = TempDir::new().unwrap();
    let config = fast_config();

    let other = mock_repo(&temp.path().join("other"));
    stamp_in(&other, &config, "svc", ReleaseMode::Patch, false).unwrap();
    let info = other.version_info_of("_-svc_main").unwrap().unwrap();

    let vcs = mock_repo(&temp.path().join("main"));
    vcs.user_commit("local work", "alice");
    vcs.inject_remote_stamp(&info, &["svc_0.0.1".into(), "_-svc_main".into()]);

    let outcome = stamp_in(&vcs, &config, "svc", ReleaseMode::Patch, true).unwrap();

    assert_eq!(outcome.version, "0.0.2");
    assert_eq!(outcome.attempts, 1);
}

// =============================================================================
// Preconditions
// =============================================================================

fn request(app: &str) -> StampRequest {
    StampRequest {
        name: app.into(),
        release_mode: ReleaseMode::Patch,
        starting_version: Version::default(),
        pull: false,
    }
}

#[test]
fn refuses_uninitialized_repository() {
    let temp = TempDir::new().unwrap();
    let vcs = MockVcs::new(temp.path()).unwrap();

    let err = stamp(&vcs, &fast_config(), &request("svc")).unwrap_err();
    assert!(matches!(err, EngineError::NotInitialized(_)));
}

#[test]
fn refuses_pending_changes() {
    let f = Fixture::new();
    f.vcs.set_pending_changes(Some("M src/main.rs"));

    let err = stamp(&f.vcs, &f.config, &request("svc")).unwrap_err();

    assert!(matches!(err, EngineError::LocalEditGuard(_)));
    assert!(f.vcs.operations().is_empty());
}
