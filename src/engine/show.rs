//! engine::show
//!
//! Report the latest stamp of an app on the active branch.

use super::{ensure_initialized, paths_of, EngineError};
use crate::core::metadata::schema::MetadataError;
use crate::core::naming::{moving_tag_name, AppName};
use crate::vcs::VersionControl;

/// What `show` prints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShowFormat {
    /// Version rendered through the app's template.
    #[default]
    Version,

    /// Raw four-octet version.
    Raw,

    /// The whole record section as YAML.
    Verbose,

    /// The whole record section as JSON.
    Json,
}

/// Parameters of a show.
#[derive(Debug, Clone, Default)]
pub struct ShowRequest {
    pub name: String,

    /// Show the root app record instead of the app record.
    pub root: bool,

    pub format: ShowFormat,
}

/// Render the latest stamp of `request.name` on the active branch.
pub fn show(vcs: &dyn VersionControl, request: &ShowRequest) -> Result<String, EngineError> {
    let paths = paths_of(vcs);
    ensure_initialized(&paths)?;

    let name = AppName::new(request.name.as_str())?;
    let tag = moving_tag_name(&name, &vcs.active_branch(false)?);
    let unknown = || EngineError::UnknownApp {
        app: name.to_string(),
        tag: tag.clone(),
    };

    let info = vcs.version_info_of(&tag)?.ok_or_else(unknown)?;

    if request.root {
        let root = info.stamping.root_app.ok_or_else(unknown)?;
        return match request.format {
            ShowFormat::Verbose => to_yaml(&root),
            ShowFormat::Json => to_json(&root),
            ShowFormat::Raw | ShowFormat::Version => Ok(root.version.to_string()),
        };
    }

    let app = info.stamping.app;
    match request.format {
        ShowFormat::Verbose => to_yaml(&app),
        ShowFormat::Json => to_json(&app),
        ShowFormat::Raw => Ok(app.raw_version.to_string()),
        ShowFormat::Version => Ok(app.version),
    }
}

fn to_yaml<T: serde::Serialize>(value: &T) -> Result<String, EngineError> {
    serde_yaml::to_string(value)
        .map_err(|e| EngineError::Metadata(MetadataError::SerializeError(e.to_string())))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| EngineError::Metadata(MetadataError::SerializeError(e.to_string())))
}
