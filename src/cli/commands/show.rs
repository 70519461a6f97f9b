//! show command - Print the latest version of an app

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::engine::{self, ShowFormat, ShowRequest};
use crate::ui::output;

pub fn show(ctx: &Context, name: &str, root: bool, format: ShowFormat) -> Result<()> {
    let (vcs, _config) = ctx.open_repo()?;

    let request = ShowRequest {
        name: name.to_string(),
        root,
        format,
    };
    let text = engine::show(&vcs, &request).with_context(|| format!("failed to show {}", name))?;

    output::print(text.trim_end(), ctx.verbosity());
    Ok(())
}
