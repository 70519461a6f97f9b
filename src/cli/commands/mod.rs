//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the repository and loads settings
//! 2. Calls the engine to execute the command
//! 3. Formats and displays output
//!
//! Handlers do NOT perform repository mutations directly.

mod completion;
mod goto;
mod init;
mod release;
mod show;
mod stamp;

pub use completion::completion;
pub use goto::goto;
pub use init::init;
pub use release::release;
pub use show::show;
pub use stamp::stamp;

use anyhow::Result;

use crate::cli::args::Command;
use crate::cli::Context;
use crate::engine::ShowFormat;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init => init::init(ctx),
        Command::Show {
            name,
            root,
            verbose,
            raw,
            json,
        } => {
            let format = if verbose {
                ShowFormat::Verbose
            } else if raw {
                ShowFormat::Raw
            } else if json {
                ShowFormat::Json
            } else {
                ShowFormat::Version
            };
            show::show(ctx, &name, root, format)
        }
        Command::Stamp {
            name,
            release_mode,
            starting_version,
            pull,
        } => stamp::stamp(ctx, &name, release_mode.into(), &starting_version, pull),
        Command::Goto {
            name,
            version,
            root,
        } => goto::goto(ctx, &name, version.as_deref(), root),
        Command::Release {
            stamp,
            version,
            dry_run,
            release_branches,
        } => release::release(ctx, stamp, version, dry_run, release_branches),
        Command::Completion { shell } => completion::completion(shell),
    }
}
