//! engine::matcher
//!
//! Idempotent re-stamp detection.
//!
//! A stamp matches when every repository it recorded is present in the
//! caller's state with the same hash. The main repository (`.`) is compared
//! against the backend's last user changeset instead of the scanned hash, since
//! the working copy itself sits on a stamp commit after every stamp.
//!
//! Tags are visited in backend listing order; the first match wins.

use tracing::debug;

use super::EngineError;
use crate::core::metadata::schema::AppRecord;
use crate::core::naming::{version_tag_prefix, AppName};
use crate::core::types::RepoStates;
use crate::vcs::VersionControl;

/// Key of the main repository in state maps.
pub const MAIN_REPO_KEY: &str = ".";

/// Find an earlier stamp of `app` whose provenance equals `states`.
pub fn find_matching_version(
    vcs: &dyn VersionControl,
    app: &AppName,
    states: &RepoStates,
) -> Result<Option<AppRecord>, EngineError> {
    let prefix = version_tag_prefix(app);
    let mut user_changeset = None;

    for tag in vcs.tags()? {
        if !tag.starts_with(&prefix) {
            continue;
        }
        let Some(info) = vcs.version_info_of(&tag)? else {
            continue;
        };
        let record = info.stamping.app;
        if &record.name != app {
            continue;
        }

        let mut matched = true;
        for (key, recorded) in &record.changesets {
            let Some(current) = states.get(key) else {
                matched = false;
                break;
            };
            let current_hash = if key == MAIN_REPO_KEY {
                if user_changeset.is_none() {
                    user_changeset = Some(vcs.last_user_changeset()?);
                }
                user_changeset.as_deref().unwrap_or_default()
            } else {
                current.hash.as_str()
            };
            if recorded.hash != current_hash {
                matched = false;
                break;
            }
        }

        if matched {
            debug!(tag = %tag, "found matching stamp");
            return Ok(Some(record));
        }
    }

    Ok(None)
}
