//! engine::builder
//!
//! Assembly of the version record for one stamp attempt.
//!
//! # Architecture
//!
//! [`StampBuilder::build`] produces a [`StampPlan`]: the full
//! [`VersionInfo`] to embed in the stamp commit, plus the tags and files the
//! publish step will touch. Building has one side effect: the app config
//! document (and the root config document, for apps with a root app) is
//! created or rewritten with the resolved dependency declarations, so the
//! stamp commit carries them.
//!
//! # Baselines
//!
//! - App: the raw version recorded behind the app's moving tag on the current
//!   branch, else the caller's starting version
//! - Root app: the integer version behind the root app's moving tag, else 0
//!
//! Both can be overridden by the retry loop through [`BuildOverrides`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::matcher::MAIN_REPO_KEY;
use super::EngineError;
use crate::core::app::{declared_dependency_keys, normalize, AppLayout};
use crate::core::metadata::schema::{
    AppConf, AppConfDoc, AppInfo, AppRecord, DependencyDecl, RootAppRecord, VersionInfo,
};
use crate::core::metadata::store::ConfStore;
use crate::core::naming::{moving_tag_name, version_tag_name};
use crate::core::paths::VmnPaths;
use crate::core::types::RepoStates;
use crate::core::version::{ReleaseMode, Version, VersionError};
use crate::vcs::VersionControl;

/// Directory, relative to the main repository root, that holds the main
/// repository in dependency declarations.
pub const MAIN_REPO_DECL_DIR: &str = "../";

/// Values the retry loop substitutes for the computed ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOverrides {
    pub release_mode: Option<ReleaseMode>,

    /// App version to bump from instead of the recorded one.
    pub baseline: Option<Version>,

    /// Root app version to increment instead of the recorded one.
    pub root_baseline: Option<u64>,
}

/// Everything one publish attempt needs.
#[derive(Debug, Clone)]
pub struct StampPlan {
    pub info: VersionInfo,
    pub branch: String,

    /// Versioned tags: the app's, then the root app's.
    pub tags: Vec<String>,

    /// Moving tags: the app's, then the root app's.
    pub moving_tags: Vec<String>,

    /// Config documents the stamp commit includes.
    pub include: Vec<PathBuf>,
}

impl StampPlan {
    pub fn app(&self) -> &AppRecord {
        &self.info.stamping.app
    }

    pub fn root_app(&self) -> Option<&RootAppRecord> {
        self.info.stamping.root_app.as_ref()
    }

    /// Every tag the attempt creates or moves.
    pub fn all_tags(&self) -> Vec<String> {
        self.tags.iter().chain(&self.moving_tags).cloned().collect()
    }
}

/// Builds stamp plans for one app.
pub struct StampBuilder<'a> {
    vcs: &'a dyn VersionControl,
    paths: &'a VmnPaths,
    layout: &'a AppLayout,
    release_mode: ReleaseMode,
    starting_version: Version,
}

impl<'a> StampBuilder<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        paths: &'a VmnPaths,
        layout: &'a AppLayout,
        release_mode: ReleaseMode,
        starting_version: Version,
    ) -> Self {
        Self {
            vcs,
            paths,
            layout,
            release_mode,
            starting_version,
        }
    }

    /// Build the app record and, if the app has one, the root app record.
    pub fn build(
        &self,
        states: &RepoStates,
        overrides: &BuildOverrides,
    ) -> Result<StampPlan, EngineError> {
        let branch = self.vcs.active_branch(true)?;
        let app = self.build_app(&branch, states, overrides)?;
        let root_app = self.build_root_app(&branch, &app, overrides.root_baseline)?;

        let mut tags = vec![version_tag_name(&app.name, &app.version)];
        let mut moving_tags = vec![moving_tag_name(&app.name, &branch)];
        let mut include = vec![self.layout.conf_path.clone()];

        if let Some(root) = &root_app {
            tags.push(version_tag_name(&root.name, &root.version.to_string()));
            moving_tags.push(moving_tag_name(&root.name, &branch));
            include.extend(self.layout.root_conf_path.clone());
        }

        Ok(StampPlan {
            info: VersionInfo::new(app, root_app),
            branch,
            tags,
            moving_tags,
            include,
        })
    }

    /// Compute the next app version and record its provenance.
    pub fn build_app(
        &self,
        branch: &str,
        states: &RepoStates,
        overrides: &BuildOverrides,
    ) -> Result<AppRecord, EngineError> {
        let name = &self.layout.name;

        let previous = match self.vcs.version_info_of(&moving_tag_name(name, branch))? {
            Some(info) => info.stamping.app.raw_version,
            None => self.starting_version,
        };
        let baseline = overrides.baseline.unwrap_or(previous);
        let mode = overrides.release_mode.unwrap_or(self.release_mode);
        let raw_version = baseline.next(mode)?;
        debug!(app = %name, %baseline, %mode, next = %raw_version, "computed version");

        let keys = self.resolve_dependencies()?;

        let mut changesets = RepoStates::new();
        for key in keys {
            let Some(state) = states.get(&key) else {
                return Err(EngineError::MissingDependency {
                    path: normalize(&self.paths.root.join(&key)),
                    key,
                });
            };
            let mut state = state.clone();
            if key == MAIN_REPO_KEY {
                state.hash = self.vcs.last_user_changeset()?;
            }
            changesets.insert(key, state);
        }

        let info = AppInfo {
            env: self
                .layout
                .extra_info
                .then(|| std::env::vars().collect::<BTreeMap<_, _>>()),
        };

        Ok(AppRecord {
            name: name.clone(),
            version: self.layout.template.format_version(&raw_version),
            raw_version,
            release_mode: self.release_mode,
            previous_version: previous,
            changesets,
            info,
        })
    }

    /// Compute the next root app version, if the app has a root app.
    pub fn build_root_app(
        &self,
        branch: &str,
        app: &AppRecord,
        root_baseline: Option<u64>,
    ) -> Result<Option<RootAppRecord>, EngineError> {
        let Some(root) = &self.layout.root_app else {
            return Ok(None);
        };

        let doc = ConfStore::new(self.paths).ensure_root(root)?;

        let previous = self
            .vcs
            .version_info_of(&moving_tag_name(root, branch))?
            .and_then(|info| info.stamping.root_app);

        let (previous_version, mut services) = match previous {
            Some(record) => (record.version, record.services),
            None => (0, BTreeMap::new()),
        };
        services.insert(app.name.to_string(), app.raw_version);

        let base = root_baseline.unwrap_or(previous_version);
        let version = base
            .checked_add(1)
            .ok_or(VersionError::RootOverflow(base))?;
        debug!(root_app = %root, version, "computed root app version");

        Ok(Some(RootAppRecord {
            name: root.clone(),
            version,
            latest_service: app.name.clone(),
            services,
            external_services: doc.conf.external_services,
        }))
    }

    /// Ensure the app config document declares the main repository, rewrite
    /// it, and return the keys of every declared dependency.
    fn resolve_dependencies(&self) -> Result<Vec<String>, EngineError> {
        let store = ConfStore::new(self.paths);
        let name = &self.layout.name;

        let mut doc = match store.read_app(name)? {
            Some(doc) => doc,
            None => AppConfDoc::new(AppConf {
                template: self.layout.template.as_str().to_string(),
                extra_info: self.layout.extra_info,
                ..Default::default()
            }),
        };

        let root = self.paths.root();
        let mut keys = declared_dependency_keys(root, &doc.conf.deps);

        let main_decl = DependencyDecl {
            remote: self.vcs.remote()?,
            vcs_type: self.vcs.kind(),
        };
        let siblings = doc
            .conf
            .deps
            .entry(MAIN_REPO_DECL_DIR.to_string())
            .or_default();
        if !siblings.contains_key(&main_dir_name(root)) {
            siblings.insert(main_dir_name(root), main_decl);
        }
        if !keys.iter().any(|k| k == MAIN_REPO_KEY) {
            keys.push(MAIN_REPO_KEY.to_string());
        }

        store.write_app(name, &doc)?;
        Ok(keys)
    }
}

fn main_dir_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| MAIN_REPO_KEY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::naming::AppName;
    use crate::core::types::{RepoState, VcsKind};
    use crate::vcs::MockVcs;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        vcs: MockVcs,
        paths: VmnPaths,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("main");
        std::fs::create_dir_all(root.join(".vmn")).unwrap();
        let vcs = MockVcs::new(&root).unwrap();
        let paths = VmnPaths::new(root, vcs.vcs_dir());
        Fixture {
            _temp: temp,
            vcs,
            paths,
        }
    }

    fn main_state(vcs: &MockVcs) -> RepoStates {
        let mut states = RepoStates::new();
        states.insert(
            ".".into(),
            RepoState::new(vcs.changeset().unwrap(), None, VcsKind::Git),
        );
        states
    }

    #[test]
    fn first_stamp_uses_starting_version() {
        let f = fixture();
        let layout = AppLayout::resolve(&f.paths, "svc", false).unwrap();
        let builder = StampBuilder::new(
            &f.vcs,
            &f.paths,
            &layout,
            ReleaseMode::Patch,
            Version::default(),
        );

        let plan = builder
            .build(&main_state(&f.vcs), &BuildOverrides::default())
            .unwrap();

        assert_eq!(plan.app().version, "0.0.1");
        assert_eq!(plan.app().previous_version, Version::default());
        assert_eq!(plan.tags, vec!["svc_0.0.1".to_string()]);
        assert_eq!(plan.moving_tags, vec!["_-svc_main".to_string()]);
        assert!(plan.root_app().is_none());
        assert_eq!(plan.include, vec![layout.conf_path.clone()]);
    }

    #[test]
    fn conf_document_gains_main_repo_declaration() {
        let f = fixture();
        let layout = AppLayout::resolve(&f.paths, "svc", false).unwrap();
        let builder = StampBuilder::new(
            &f.vcs,
            &f.paths,
            &layout,
            ReleaseMode::Patch,
            Version::default(),
        );
        builder
            .build(&main_state(&f.vcs), &BuildOverrides::default())
            .unwrap();

        let doc = ConfStore::new(&f.paths)
            .read_app(&layout.name)
            .unwrap()
            .unwrap();
        let decl = &doc.conf.deps["../"]["main"];
        assert_eq!(decl.remote.as_deref(), Some("mock://origin"));
        assert_eq!(decl.vcs_type, VcsKind::Git);
    }

    #[test]
    fn main_repo_hash_is_last_user_changeset() {
        let f = fixture();
        let user = f.vcs.changeset().unwrap();
        f.vcs.commit("stamp", "vmn", &[]).unwrap();

        let layout = AppLayout::resolve(&f.paths, "svc", false).unwrap();
        let builder = StampBuilder::new(
            &f.vcs,
            &f.paths,
            &layout,
            ReleaseMode::Patch,
            Version::default(),
        );
        let plan = builder
            .build(&main_state(&f.vcs), &BuildOverrides::default())
            .unwrap();

        assert_eq!(plan.app().changesets["."].hash, user);
    }

    #[test]
    fn declared_but_absent_dependency_is_fatal() {
        let f = fixture();
        let name = AppName::new("svc").unwrap();
        let mut doc = AppConfDoc::new(AppConf::default());
        doc.conf.deps.entry("../".into()).or_default().insert(
            "lib".into(),
            DependencyDecl {
                remote: None,
                vcs_type: VcsKind::Git,
            },
        );
        ConfStore::new(&f.paths).write_app(&name, &doc).unwrap();

        let layout = AppLayout::resolve(&f.paths, "svc", false).unwrap();
        let builder = StampBuilder::new(
            &f.vcs,
            &f.paths,
            &layout,
            ReleaseMode::Patch,
            Version::default(),
        );
        let err = builder
            .build(&main_state(&f.vcs), &BuildOverrides::default())
            .unwrap_err();

        match err {
            EngineError::MissingDependency { key, .. } => assert_eq!(key, "../lib"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn overrides_replace_baseline_and_mode() {
        let f = fixture();
        let layout = AppLayout::resolve(&f.paths, "svc", false).unwrap();
        let builder = StampBuilder::new(
            &f.vcs,
            &f.paths,
            &layout,
            ReleaseMode::Patch,
            Version::default(),
        );
        let overrides = BuildOverrides {
            release_mode: Some(ReleaseMode::Micro),
            baseline: Some(Version::new(0, 0, 1, 0)),
            root_baseline: None,
        };
        let plan = builder.build(&main_state(&f.vcs), &overrides).unwrap();

        assert_eq!(plan.app().raw_version, Version::new(0, 0, 1, 1));
        assert_eq!(plan.app().release_mode, ReleaseMode::Patch);
    }

    #[test]
    fn child_app_builds_root_record() {
        let f = fixture();
        let layout = AppLayout::resolve(&f.paths, "sys/svc", false).unwrap();
        let builder = StampBuilder::new(
            &f.vcs,
            &f.paths,
            &layout,
            ReleaseMode::Minor,
            Version::default(),
        );
        let plan = builder
            .build(&main_state(&f.vcs), &BuildOverrides::default())
            .unwrap();

        let root = plan.root_app().unwrap();
        assert_eq!(root.version, 1);
        assert_eq!(root.latest_service.as_str(), "sys/svc");
        assert_eq!(root.services["sys/svc"], Version::new(0, 1, 0, 0));
        assert_eq!(
            plan.tags,
            vec!["sys-svc_0.1.0".to_string(), "sys_1".to_string()]
        );
        assert_eq!(
            plan.moving_tags,
            vec!["_-sys-svc_main".to_string(), "_-sys_main".to_string()]
        );
        assert!(f.paths.root.join(".vmn/sys/root_conf.yml").is_file());
    }

    #[test]
    fn saturated_starting_version_is_rejected() {
        let f = fixture();
        let layout = AppLayout::resolve(&f.paths, "svc", false).unwrap();
        let builder = StampBuilder::new(
            &f.vcs,
            &f.paths,
            &layout,
            ReleaseMode::Patch,
            Version::new(0, 0, u64::MAX, 0),
        );

        let err = builder
            .build(&main_state(&f.vcs), &BuildOverrides::default())
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Version(VersionError::Overflow { .. })
        ));
    }

    #[test]
    fn saturated_root_version_is_rejected() {
        let f = fixture();
        let layout = AppLayout::resolve(&f.paths, "sys/svc", false).unwrap();
        let builder = StampBuilder::new(
            &f.vcs,
            &f.paths,
            &layout,
            ReleaseMode::Patch,
            Version::default(),
        );
        let overrides = BuildOverrides {
            root_baseline: Some(u64::MAX),
            ..Default::default()
        };

        let err = builder.build(&main_state(&f.vcs), &overrides).unwrap_err();

        assert!(matches!(
            err,
            EngineError::Version(VersionError::RootOverflow(u64::MAX))
        ));
    }
}
