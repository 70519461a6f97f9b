//! core::app
//!
//! Resolution of an app name into its on-disk layout.
//!
//! # Layout
//!
//! For app `sys/svc` in repository root `/work/main`:
//!
//! | item              | value                                   |
//! |-------------------|-----------------------------------------|
//! | config document   | `/work/main/.vmn/sys/svc/conf.yml`      |
//! | root app          | `sys`                                   |
//! | root config       | `/work/main/.vmn/sys/root_conf.yml`     |
//! | scanned for repos | every entry of `/work`, plus declared deps |
//!
//! Template and extra-info come from the config document when it exists and
//! fall back to defaults otherwise.
//!
//! # Dependency keys
//!
//! Repositories are keyed by their path relative to the main repository root,
//! normalized lexically: `.` for the main repository itself, `../lib` for a
//! sibling. [`dependency_key`] computes these keys from a declaring directory
//! and a repository directory name as they appear in config documents.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use super::metadata::schema::DependencyDecls;
use super::metadata::store::{ConfStore, StoreError};
use super::naming::{AppName, NameError};
use super::paths::VmnPaths;
use super::template::{Template, TemplateError};

/// Errors from layout resolution.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A directory to scan for repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSpec {
    pub dir: PathBuf,

    /// Entry names to inspect; `None` inspects every entry of `dir`.
    pub entries: Option<Vec<String>>,
}

/// Everything needed to stamp, show or restore one app.
#[derive(Debug, Clone)]
pub struct AppLayout {
    pub name: AppName,

    /// Root app this app reports to. With `--root` this is the app itself.
    pub root_app: Option<AppName>,

    pub conf_path: PathBuf,
    pub root_conf_path: Option<PathBuf>,
    pub template: Template,
    pub extra_info: bool,

    /// Directories holding the caller's dependency repositories.
    pub scan: Vec<ScanSpec>,
}

impl AppLayout {
    /// Resolve the layout of `name` inside the repository at `paths.root`.
    ///
    /// With `root` set, `name` is treated as a root app name.
    pub fn resolve(paths: &VmnPaths, name: &str, root: bool) -> Result<Self, LayoutError> {
        let name = AppName::new(name)?;
        let root_app = if root {
            Some(name.clone())
        } else {
            name.parent()
        };

        let mut layout = AppLayout {
            conf_path: paths.app_conf_path(&name),
            root_conf_path: root_app.as_ref().map(|r| paths.root_conf_path(r)),
            root_app,
            template: Template::default(),
            extra_info: false,
            scan: vec![ScanSpec {
                dir: paths.root.join(".."),
                entries: None,
            }],
            name,
        };

        let Some(doc) = ConfStore::new(paths).read_app(&layout.name)? else {
            return Ok(layout);
        };

        layout.template = Template::parse(&doc.conf.template)?;
        layout.extra_info = doc.conf.extra_info;
        layout.scan.extend(doc.conf.deps.iter().map(|(dir, repos)| ScanSpec {
            dir: paths.root.join(dir),
            entries: Some(repos.keys().cloned().collect()),
        }));

        Ok(layout)
    }

    /// Whether this app aggregates into a root app.
    pub fn has_root_app(&self) -> bool {
        self.root_app.is_some()
    }
}

/// Keys of every repository declared in `deps`, relative to `root`.
pub fn declared_dependency_keys(root: &Path, deps: &DependencyDecls) -> Vec<String> {
    deps.iter()
        .flat_map(|(dir, repos)| repos.keys().map(move |repo| dependency_key(root, dir, repo)))
        .collect()
}

/// Key of repository `repo` declared under directory `dir`, relative to `root`.
///
/// ```
/// use vmn::core::app::dependency_key;
/// use std::path::Path;
///
/// let root = Path::new("/work/main");
/// assert_eq!(dependency_key(root, "../", "main"), ".");
/// assert_eq!(dependency_key(root, "../", "lib"), "../lib");
/// assert_eq!(dependency_key(root, "vendor", "dep"), "vendor/dep");
/// ```
pub fn dependency_key(root: &Path, dir: &str, repo: &str) -> String {
    relative_key(root, &root.join(dir).join(repo))
}

/// Path of `target` relative to `root` after lexical normalization.
pub fn relative_key(root: &Path, target: &Path) -> String {
    let root = normalize(root);
    let target = normalize(target);
    match pathdiff::diff_paths(&target, &root) {
        Some(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Some(rel) => rel.to_string_lossy().replace('\\', "/"),
        None => target.to_string_lossy().into_owned(),
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::schema::{AppConf, AppConfDoc, DependencyDecl};
    use crate::core::types::VcsKind;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn setup() -> (TempDir, VmnPaths) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("main");
        std::fs::create_dir_all(&root).unwrap();
        let paths = VmnPaths::new(root.clone(), root.join(".git"));
        (temp, paths)
    }

    #[test]
    fn resolve_without_config() {
        let (_temp, paths) = setup();
        let layout = AppLayout::resolve(&paths, "sys/svc", false).unwrap();

        assert_eq!(layout.root_app.as_ref().unwrap().as_str(), "sys");
        assert_eq!(layout.conf_path, paths.root.join(".vmn/sys/svc/conf.yml"));
        assert_eq!(
            layout.root_conf_path,
            Some(paths.root.join(".vmn/sys/root_conf.yml"))
        );
        assert_eq!(layout.template, Template::default());
        assert!(!layout.extra_info);
        assert_eq!(layout.scan.len(), 1);
        assert_eq!(layout.scan[0].entries, None);
    }

    #[test]
    fn flat_name_has_no_root_app() {
        let (_temp, paths) = setup();
        let layout = AppLayout::resolve(&paths, "svc", false).unwrap();
        assert!(!layout.has_root_app());
        assert!(layout.root_conf_path.is_none());
    }

    #[test]
    fn root_flag_makes_app_its_own_root() {
        let (_temp, paths) = setup();
        let layout = AppLayout::resolve(&paths, "sys", true).unwrap();
        assert_eq!(layout.root_app.unwrap().as_str(), "sys");
    }

    #[test]
    fn resolve_reads_config_document() {
        let (_temp, paths) = setup();
        let app = AppName::new("svc").unwrap();

        let mut repos = BTreeMap::new();
        repos.insert(
            "lib".to_string(),
            DependencyDecl {
                remote: None,
                vcs_type: VcsKind::Git,
            },
        );
        let mut deps = DependencyDecls::new();
        deps.insert("../".to_string(), repos);

        let doc = AppConfDoc::new(AppConf {
            template: "v{0}.{1}".into(),
            deps,
            extra_info: true,
        });
        ConfStore::new(&paths).write_app(&app, &doc).unwrap();

        let layout = AppLayout::resolve(&paths, "svc", false).unwrap();
        assert_eq!(layout.template.octet_count(), 2);
        assert!(layout.extra_info);
        assert_eq!(layout.scan.len(), 2);
        assert_eq!(layout.scan[1].entries, Some(vec!["lib".to_string()]));
    }

    #[test]
    fn bad_template_in_config_fails() {
        let (_temp, paths) = setup();
        let app = AppName::new("svc").unwrap();
        let doc = AppConfDoc::new(AppConf {
            template: "no placeholder".into(),
            ..Default::default()
        });
        ConfStore::new(&paths).write_app(&app, &doc).unwrap();

        assert!(matches!(
            AppLayout::resolve(&paths, "svc", false),
            Err(LayoutError::Template(_))
        ));
    }

    #[test]
    fn invalid_name_fails() {
        let (_temp, paths) = setup();
        assert!(matches!(
            AppLayout::resolve(&paths, "_-svc", false),
            Err(LayoutError::Name(_))
        ));
    }

    #[test]
    fn normalize_collapses_parent_dirs() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
    }

    #[test]
    fn declared_keys() {
        let root = Path::new("/w/main");
        let mut repos = BTreeMap::new();
        for name in ["main", "lib"] {
            repos.insert(
                name.to_string(),
                DependencyDecl {
                    remote: None,
                    vcs_type: VcsKind::Git,
                },
            );
        }
        let mut deps = DependencyDecls::new();
        deps.insert("../".to_string(), repos);

        let keys = declared_dependency_keys(root, &deps);
        assert_eq!(keys, vec!["../lib".to_string(), ".".to_string()]);
    }
}
