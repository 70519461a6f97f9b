//! init command - Start vmn tracking in this repository

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::engine::{self, InitOutcome};
use crate::ui::output;
use crate::vcs::VersionControl;

/// Start vmn tracking in the repository containing the working directory.
pub fn init(ctx: &Context) -> Result<()> {
    let (vcs, config) = ctx.open_repo()?;

    let outcome = engine::init(&vcs, &config).context("failed to initialize vmn tracking")?;
    match outcome {
        InitOutcome::Initialized { .. } => output::success(
            format!("Initialized vmn tracking on {}", vcs.root().display()),
            ctx.verbosity(),
        ),
        InitOutcome::AlreadyInitialized => output::print(
            format!("vmn tracking is already initialized in {}", vcs.root().display()),
            ctx.verbosity(),
        ),
    }
    Ok(())
}
