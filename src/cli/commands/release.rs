//! release command - Tag the current changeset as a release

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::engine::{self, ReleaseRequest};
use crate::ui::output;

pub fn release(
    ctx: &Context,
    stamp: bool,
    version: Option<String>,
    dry_run: bool,
    release_branches: Vec<String>,
) -> Result<()> {
    let (vcs, config) = ctx.open_repo()?;

    let request = ReleaseRequest {
        stamp,
        version,
        dry_run,
        allowed_branches: release_branches
            .into_iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect(),
    };
    let outcome = engine::release(&vcs, &config, &request).context("release failed")?;

    if dry_run {
        output::print(
            format!("Would release {} from {}", outcome.version, outcome.branch),
            ctx.verbosity(),
        );
    } else {
        output::success(
            format!("Released {} from {}", outcome.version, outcome.branch),
            ctx.verbosity(),
        );
    }
    Ok(())
}
