//! engine::stamp
//!
//! The stamp command: match, build, publish, retry.
//!
//! # Retry policy
//!
//! Each attempt builds a fresh plan and publishes it. A failed attempt has
//! already been rolled back by [`publish`] when its error arrives here.
//!
//! | outcome          | next attempt                                          |
//! |------------------|-------------------------------------------------------|
//! | tag conflict     | bump from the attempted version by the smallest step  |
//! |                  | the template renders (micro for 4-octet templates)    |
//! | push conflict    | with `pull`: random backoff, pull, original baseline  |
//! |                  | without `pull`: fail                                  |
//! | any other error  | fail                                                  |
//!
//! Exhausting `stamp.max_attempts` fails with
//! [`EngineError::StampingFailed`].

use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use super::builder::{BuildOverrides, StampBuilder};
use super::matcher::find_matching_version;
use super::publish::publish;
use super::scan::scan_repos;
use super::{ensure_initialized, guard_local_edits, paths_of, EngineError, StampContext};
use crate::core::app::AppLayout;
use crate::core::config::Config;
use crate::core::template::Template;
use crate::core::types::RepoStates;
use crate::core::version::{ReleaseMode, Version};
use crate::vcs::VersionControl;

/// Parameters of one stamp.
#[derive(Debug, Clone)]
pub struct StampRequest {
    pub name: String,
    pub release_mode: ReleaseMode,

    /// Baseline for an app that has never been stamped on this branch.
    pub starting_version: Version,

    /// Pull before matching and after push conflicts.
    pub pull: bool,
}

/// Result of a stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampOutcome {
    /// Version rendered through the app's template.
    pub version: String,

    /// False when an existing stamp matched and nothing was published.
    pub created: bool,

    /// Publish attempts made.
    pub attempts: u32,
}

/// Stamp the app named in `request` in the repository behind `vcs`.
///
/// Refuses to run on an uninitialized repository or with local edits. The
/// dependency state is scanned before the repository lock is taken.
pub fn stamp(
    vcs: &dyn VersionControl,
    config: &Config,
    request: &StampRequest,
) -> Result<StampOutcome, EngineError> {
    let paths = paths_of(vcs);
    ensure_initialized(&paths)?;
    guard_local_edits(vcs, false)?;

    let layout = AppLayout::resolve(&paths, &request.name, false)?;
    let states = scan_repos(&layout.scan, &paths.root)?;

    let ctx = StampContext::acquire(vcs, config)?;
    drive_stamping(&ctx, &layout, request, &states)
}

/// Match or publish a new version of `layout` for the given dependency
/// states, retrying on conflicts.
pub fn drive_stamping(
    ctx: &StampContext<'_>,
    layout: &AppLayout,
    request: &StampRequest,
    states: &RepoStates,
) -> Result<StampOutcome, EngineError> {
    if request.pull {
        ctx.vcs.pull()?;
    }

    if let Some(record) = find_matching_version(ctx.vcs, &layout.name, states)? {
        let version = layout.template.format_version(&record.raw_version);
        info!(app = %layout.name, %version, "found existing version");
        return Ok(StampOutcome {
            version,
            created: false,
            attempts: 0,
        });
    }

    let builder = StampBuilder::new(
        ctx.vcs,
        &ctx.paths,
        layout,
        request.release_mode,
        request.starting_version,
    );
    let author = ctx.config.author();
    let max_attempts = ctx.config.max_attempts();
    let mut overrides = BuildOverrides::default();

    for attempt in 1..=max_attempts {
        let plan = builder.build(states, &overrides)?;
        info!(app = %layout.name, version = %plan.app().version, attempt, "stamping");

        match publish(ctx.vcs, &plan, &author) {
            Ok(()) => {
                return Ok(StampOutcome {
                    version: plan.app().version.clone(),
                    created: true,
                    attempts: attempt,
                });
            }
            Err(EngineError::TagConflict { message }) => {
                let bump = conflict_bump(&layout.template);
                let attempted = plan.app().raw_version;
                warn!(
                    %message,
                    from = %attempted,
                    %bump,
                    "tag conflict; auto-increasing"
                );
                overrides = BuildOverrides {
                    release_mode: Some(bump),
                    baseline: Some(attempted),
                    root_baseline: plan.root_app().map(|root| root.version),
                };
            }
            Err(EngineError::PushConflict { message }) => {
                if !request.pull {
                    return Err(EngineError::PushConflict { message });
                }
                let delay = backoff(ctx.config);
                warn!(%message, delay_ms = delay.as_millis() as u64, "push conflict; pulling and retrying");
                std::thread::sleep(delay);
                ctx.vcs.pull()?;
                overrides = BuildOverrides::default();
            }
            Err(other) => return Err(other),
        }
    }

    Err(EngineError::StampingFailed {
        app: layout.name.to_string(),
        attempts: max_attempts,
    })
}

/// Smallest bump `template` can render.
pub fn conflict_bump(template: &Template) -> ReleaseMode {
    ReleaseMode::for_octet(template.octet_count().saturating_sub(1))
}

fn backoff(config: &Config) -> Duration {
    let (min, max) = config.backoff_range();
    let millis = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}
