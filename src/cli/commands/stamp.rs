//! stamp command - Stamp a new version of an app

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::version::{ReleaseMode, Version};
use crate::engine::{self, StampRequest};
use crate::ui::output;

/// Stamp `name`, printing the resulting version.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `name` - App name
/// * `release_mode` - Octet to bump
/// * `starting_version` - Baseline for an app never stamped on this branch
/// * `pull` - Pull first and retry push conflicts after pulling
pub fn stamp(
    ctx: &Context,
    name: &str,
    release_mode: ReleaseMode,
    starting_version: &str,
    pull: bool,
) -> Result<()> {
    let starting_version: Version = starting_version
        .parse()
        .with_context(|| format!("invalid starting version '{}'", starting_version))?;
    let (vcs, config) = ctx.open_repo()?;

    let request = StampRequest {
        name: name.to_string(),
        release_mode,
        starting_version,
        pull,
    };
    let outcome = engine::stamp(&vcs, &config, &request)
        .with_context(|| format!("failed to stamp {}", name))?;

    output::print(&outcome.version, ctx.verbosity());
    Ok(())
}
