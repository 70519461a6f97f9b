//! cli
//!
//! Command-line interface layer for vmn.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install logging
//! - Open the repository and load settings
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`] for execution. Handlers never touch the repository
//! directly.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::core::config::Config;
use crate::core::paths::VmnPaths;
use crate::ui::{self, output::Verbosity};
use crate::vcs::{Backend, VersionControl};

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub cwd: Option<PathBuf>,
    pub debug: bool,
    pub quiet: bool,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }

    /// Open the repository containing the working directory, with settings
    /// loaded from the global and repository files.
    pub fn open_repo(&self) -> Result<(Backend, Config)> {
        let cwd = match &self.cwd {
            Some(path) => path.clone(),
            None => std::env::current_dir().context("failed to read the current directory")?,
        };
        let cwd = cwd
            .canonicalize()
            .with_context(|| format!("cannot access {}", cwd.display()))?;

        let backend = Backend::discover(&cwd)
            .with_context(|| format!("{} is not inside a git or mercurial repository", cwd.display()))?;
        let paths = VmnPaths::new(backend.root().to_path_buf(), backend.vcs_dir());
        let config = Config::load(Some(&paths.repo_config_path()))
            .context("failed to load vmn settings")?;

        let backend = backend
            .with_stamp_author(&config.author())
            .with_remote_name(&config.remote());
        Ok((backend, config))
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let ctx = Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };

    ui::logging::init(ctx.verbosity());
    commands::dispatch(cli.command, &ctx)
}
