//! goto command - Restore the workspace to a stamped version

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::engine::{self, GotoRequest};
use crate::ui::output;

pub fn goto(ctx: &Context, name: &str, version: Option<&str>, root: bool) -> Result<()> {
    let (vcs, config) = ctx.open_repo()?;

    let request = GotoRequest {
        name: name.to_string(),
        version: version.map(String::from),
        root,
    };
    engine::goto(&vcs, &config, &request).with_context(|| match version {
        Some(version) => format!("failed to go to {} version {}", name, version),
        None => format!("failed to go to the latest {}", name),
    })?;

    let message = match version {
        Some(version) => format!("You are at version {} of {}", version, name),
        None => format!("You are at the tip of {}", name),
    };
    output::success(message, ctx.verbosity());
    Ok(())
}
