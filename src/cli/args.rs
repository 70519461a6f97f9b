//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory (also `VMN_WORKING_DIR`)
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::version::ReleaseMode;

/// vmn - version stamping across repositories
#[derive(Parser, Debug)]
#[command(name = "vmn")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if vmn was started in this directory
    #[arg(long, global = true, env = "VMN_WORKING_DIR")]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start vmn tracking in this repository
    #[command(
        long_about = "Start vmn tracking in this repository.\n\n\
            Creates the .vmn directory, commits it and pushes. Refuses to run \
            with uncommitted or unpushed changes.",
        after_help = "\
EXAMPLES:
    vmn init"
    )]
    Init,

    /// Show the latest version of an app on the current branch
    #[command(after_help = "\
EXAMPLES:
    # Formatted version
    vmn show my_app

    # Raw four-octet version
    vmn show --raw my_app

    # The whole stamp record
    vmn show --verbose my_app

    # Integer version of a root app
    vmn show --root my_root")]
    Show {
        /// App name (may contain '/', e.g. root/service)
        name: String,

        /// NAME is a root app
        #[arg(long)]
        root: bool,

        /// Print the whole record as YAML
        #[arg(long, conflicts_with_all = ["raw", "json"])]
        verbose: bool,

        /// Print the raw four-octet version
        #[arg(long, conflicts_with = "json")]
        raw: bool,

        /// Print the whole record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stamp a new version of an app
    #[command(
        long_about = "Stamp a new version of an app.\n\n\
            Records the current changeset of every repository the app depends on. \
            If an earlier stamp recorded exactly the same state, its version is \
            reported and nothing is published. Otherwise the next version is \
            committed, tagged and pushed.",
        after_help = "\
EXAMPLES:
    # First stamp, starting from 0.0.0
    vmn stamp -r patch my_app

    # Start from an existing version line
    vmn stamp -r minor -s 1.4.0 my_app

    # Pull first and retry on concurrent pushes
    vmn stamp -r patch --pull my_app"
    )]
    Stamp {
        /// App name (may contain '/', e.g. root/service)
        name: String,

        /// Octet to bump
        #[arg(short = 'r', long = "release-mode", value_enum)]
        release_mode: ReleaseModeArg,

        /// Baseline for an app never stamped on this branch
        #[arg(short = 's', long = "starting-version", default_value = "0.0.0.0")]
        starting_version: String,

        /// Pull before stamping and after push conflicts
        #[arg(long)]
        pull: bool,
    },

    /// Restore the workspace to a stamped version
    #[command(
        long_about = "Restore the workspace to a stamped version.\n\n\
            Without a version, every repository is moved to the tip of its branch. \
            With a version, every repository is moved to the changeset recorded by \
            that stamp. Missing repositories are cloned.",
        after_help = "\
EXAMPLES:
    # Latest state of the current branch
    vmn goto my_app

    # A specific version
    vmn goto -v 1.2.3 my_app

    # A root app version
    vmn goto --root -v 5 my_root"
    )]
    Goto {
        /// App name (may contain '/', e.g. root/service)
        name: String,

        /// Version to restore
        #[arg(short = 'v', long = "version")]
        version: Option<String>,

        /// NAME is a root app
        #[arg(long)]
        root: bool,
    },

    /// Tag the current changeset as a release
    #[command(
        long_about = "Tag the current changeset as a release.\n\n\
            The version comes from -v, or from a pre-release tag at the current \
            changeset: <app>_1.2.0-rc1 is released as <app>_1.2.0. When release \
            branches are configured, other branches are refused.",
        after_help = "\
EXAMPLES:
    # Promote the pre-release tagged at HEAD with a release commit
    vmn release --stamp

    # Release an explicit version
    vmn release -v 1.2.0

    # See what would be released
    vmn release --dry-run"
    )]
    Release {
        /// Create a release commit before tagging
        #[arg(long, conflicts_with = "version")]
        stamp: bool,

        /// Version to release
        #[arg(short = 'v', long = "version")]
        version: Option<String>,

        /// Show what would be released without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Branches releases may come from
        #[arg(
            long = "release-branches",
            env = "RELEASE_BRANCHES",
            value_delimiter = ',',
            hide = true
        )]
        release_branches: Vec<String>,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Release mode argument
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseModeArg {
    Major,
    Minor,
    Patch,
    Micro,
}

impl From<ReleaseModeArg> for ReleaseMode {
    fn from(arg: ReleaseModeArg) -> Self {
        match arg {
            ReleaseModeArg::Major => ReleaseMode::Major,
            ReleaseModeArg::Minor => ReleaseMode::Minor,
            ReleaseModeArg::Patch => ReleaseMode::Patch,
            ReleaseModeArg::Micro => ReleaseMode::Micro,
        }
    }
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn stamp_defaults_starting_version() {
        let cli = Cli::try_parse_from(["vmn", "stamp", "-r", "patch", "svc"]).unwrap();
        match cli.command {
            Command::Stamp {
                name,
                release_mode,
                starting_version,
                pull,
            } => {
                assert_eq!(name, "svc");
                assert_eq!(release_mode, ReleaseModeArg::Patch);
                assert_eq!(starting_version, "0.0.0.0");
                assert!(!pull);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn stamp_requires_release_mode() {
        assert!(Cli::try_parse_from(["vmn", "stamp", "svc"]).is_err());
    }

    #[test]
    fn release_stamp_conflicts_with_version() {
        assert!(Cli::try_parse_from(["vmn", "release", "--stamp", "-v", "1.0.0"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["vmn", "show", "svc", "-q", "--debug"]).unwrap();
        assert!(cli.quiet);
        assert!(cli.debug);
    }
}
