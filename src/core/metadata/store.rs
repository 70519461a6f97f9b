//! core::metadata::store
//!
//! Reading and writing the YAML config documents under `.vmn/`.
//!
//! Documents are written atomically (temp file, then rename) with a leading
//! comment header. Missing documents are created with defaults on demand, so a
//! first stamp works without any prior configuration.
//!
//! # Example
//!
//! ```no_run
//! use vmn::core::metadata::store::ConfStore;
//! use vmn::core::naming::AppName;
//! use vmn::core::paths::VmnPaths;
//! use std::path::PathBuf;
//!
//! let paths = VmnPaths::new(PathBuf::from("."), PathBuf::from(".git"));
//! let store = ConfStore::new(&paths);
//! let app = AppName::new("svc").unwrap();
//!
//! let doc = store.ensure_app(&app).unwrap();
//! println!("template: {}", doc.conf.template);
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::schema::{AppConfDoc, RootConfDoc};
use crate::core::naming::AppName;
use crate::core::paths::VmnPaths;

/// Header written at the top of app config documents.
pub const APP_CONF_HEADER: &str = "# Autogenerated by vmn. You can edit this configuration file\n";

/// Header written at the top of root app config documents.
pub const ROOT_CONF_HEADER: &str = "# Autogenerated by vmn\n";

/// Errors from config document storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize '{path}': {message}")]
    SerializeError { path: PathBuf, message: String },
}

/// Config document store rooted at one repository's `.vmn/` directory.
pub struct ConfStore<'a> {
    paths: &'a VmnPaths,
}

impl<'a> ConfStore<'a> {
    pub fn new(paths: &'a VmnPaths) -> Self {
        Self { paths }
    }

    /// Read an app's config document, if it exists.
    pub fn read_app(&self, app: &AppName) -> Result<Option<AppConfDoc>, StoreError> {
        read_yaml(&self.paths.app_conf_path(app))
    }

    /// Write an app's config document.
    pub fn write_app(&self, app: &AppName, doc: &AppConfDoc) -> Result<PathBuf, StoreError> {
        let path = self.paths.app_conf_path(app);
        write_yaml(&path, APP_CONF_HEADER, doc)?;
        Ok(path)
    }

    /// Read an app's config document, creating a default one if absent.
    pub fn ensure_app(&self, app: &AppName) -> Result<AppConfDoc, StoreError> {
        if let Some(doc) = self.read_app(app)? {
            return Ok(doc);
        }
        let doc = AppConfDoc::new(Default::default());
        self.write_app(app, &doc)?;
        Ok(doc)
    }

    /// Read a root app's config document, if it exists.
    pub fn read_root(&self, root_app: &AppName) -> Result<Option<RootConfDoc>, StoreError> {
        read_yaml(&self.paths.root_conf_path(root_app))
    }

    /// Write a root app's config document.
    pub fn write_root(&self, root_app: &AppName, doc: &RootConfDoc) -> Result<PathBuf, StoreError> {
        let path = self.paths.root_conf_path(root_app);
        write_yaml(&path, ROOT_CONF_HEADER, doc)?;
        Ok(path)
    }

    /// Read a root app's config document, creating a default one if absent.
    pub fn ensure_root(&self, root_app: &AppName) -> Result<RootConfDoc, StoreError> {
        if let Some(doc) = self.read_root(root_app)? {
            return Ok(doc);
        }
        let doc = RootConfDoc::default();
        self.write_root(root_app, &doc)?;
        Ok(doc)
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.is_file() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|e| StoreError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|e| StoreError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn write_yaml<T: Serialize>(path: &Path, header: &str, doc: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error(path))?;
    }

    let body = serde_yaml::to_string(doc).map_err(|e| StoreError::SerializeError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let temp_path = path.with_extension("yml.tmp");
    let mut file = fs::File::create(&temp_path).map_err(write_error(&temp_path))?;
    file.write_all(header.as_bytes())
        .and_then(|_| file.write_all(body.as_bytes()))
        .and_then(|_| file.sync_all())
        .map_err(write_error(&temp_path))?;

    fs::rename(&temp_path, path).map_err(write_error(path))?;

    Ok(())
}

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::WriteError { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::schema::DependencyDecl;
    use crate::core::types::VcsKind;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn setup() -> (TempDir, VmnPaths) {
        let temp = TempDir::new().unwrap();
        let paths = VmnPaths::new(temp.path().to_path_buf(), temp.path().join(".git"));
        (temp, paths)
    }

    #[test]
    fn missing_document_reads_as_none() {
        let (_temp, paths) = setup();
        let store = ConfStore::new(&paths);
        let app = AppName::new("svc").unwrap();
        assert!(store.read_app(&app).unwrap().is_none());
    }

    #[test]
    fn ensure_app_creates_default_with_header() {
        let (_temp, paths) = setup();
        let store = ConfStore::new(&paths);
        let app = AppName::new("sys/svc").unwrap();

        let doc = store.ensure_app(&app).unwrap();
        assert!(doc.conf.deps.is_empty());

        let raw = fs::read_to_string(paths.app_conf_path(&app)).unwrap();
        assert!(raw.starts_with(APP_CONF_HEADER));
        assert!(raw.contains("template:"));
        assert!(!paths.app_conf_path(&app).with_extension("yml.tmp").exists());
    }

    #[test]
    fn write_then_read_app() {
        let (_temp, paths) = setup();
        let store = ConfStore::new(&paths);
        let app = AppName::new("svc").unwrap();

        let mut doc = store.ensure_app(&app).unwrap();
        let mut siblings = BTreeMap::new();
        siblings.insert(
            "repo".to_string(),
            DependencyDecl {
                remote: Some("url".into()),
                vcs_type: VcsKind::Git,
            },
        );
        doc.conf.deps.insert("../".into(), siblings);
        store.write_app(&app, &doc).unwrap();

        assert_eq!(store.read_app(&app).unwrap(), Some(doc));
    }

    #[test]
    fn ensure_root_creates_default() {
        let (_temp, paths) = setup();
        let store = ConfStore::new(&paths);
        let root = AppName::new("sys").unwrap();

        let doc = store.ensure_root(&root).unwrap();
        assert!(doc.conf.external_services.is_empty());

        let raw = fs::read_to_string(paths.root_conf_path(&root)).unwrap();
        assert!(raw.starts_with(ROOT_CONF_HEADER));
        assert!(raw.contains("external_services: {}"));
    }

    #[test]
    fn malformed_document_fails() {
        let (_temp, paths) = setup();
        let store = ConfStore::new(&paths);
        let app = AppName::new("svc").unwrap();
        let path = paths.app_conf_path(&app);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "conf: [not, a, map]").unwrap();

        assert!(matches!(
            store.read_app(&app),
            Err(StoreError::ParseError { .. })
        ));
    }
}
