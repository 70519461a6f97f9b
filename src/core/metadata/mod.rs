//! core::metadata
//!
//! Stamp records and config documents.
//!
//! # Modules
//!
//! - [`schema`] - Stamp record (`VersionInfo`) and config document types
//! - [`store`] - Config document storage under `.vmn/`
//!
//! Stamp records live in commit messages and are read through the VCS
//! backend; config documents are plain files tracked in the repository.

pub mod schema;
pub mod store;

pub use schema::{
    parse_version_info, AppConf, AppConfDoc, AppInfo, AppRecord, DependencyDecl,
    DependencyDecls, MetadataError, RootAppRecord, RootConf, RootConfDoc, Stamping, VersionInfo,
    VmnInfo, DESCRIPTION_MESSAGE_VERSION,
};
pub use store::{ConfStore, StoreError, APP_CONF_HEADER, ROOT_CONF_HEADER};
