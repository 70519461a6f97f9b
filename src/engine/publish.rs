//! engine::publish
//!
//! One all-or-nothing publish attempt.
//!
//! # Sequence
//!
//! ```text
//! checkpoint -> commit -> versioned tags -> moving tags (forced) -> push
//! ```
//!
//! The checkpoint records head and the current target of every tag the
//! attempt touches. Any failure after it reverts to the checkpoint before the
//! error is returned, so a failed attempt leaves the repository exactly as it
//! found it.
//!
//! # Outcomes
//!
//! - `Ok(())` - commit, tags and push all succeeded
//! - [`EngineError::TagConflict`] - a versioned tag already existed
//! - [`EngineError::PushConflict`] - the remote rejected the push
//! - anything else - a non-retryable failure, also rolled back

use tracing::{info, warn};

use super::builder::StampPlan;
use super::EngineError;
use crate::vcs::{Checkpoint, VcsError, VersionControl};

/// Commit, tag and push `plan` as `author`, rolling back on any failure.
pub fn publish(
    vcs: &dyn VersionControl,
    plan: &StampPlan,
    author: &str,
) -> Result<(), EngineError> {
    let all_tags = plan.all_tags();
    let checkpoint = vcs.checkpoint(&all_tags)?;

    match apply(vcs, plan, author, &all_tags) {
        Ok(()) => {
            info!(tags = ?plan.tags, "published");
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "publish failed; reverting");
            rollback(vcs, &checkpoint);
            Err(err)
        }
    }
}

fn apply(
    vcs: &dyn VersionControl,
    plan: &StampPlan,
    author: &str,
    all_tags: &[String],
) -> Result<(), EngineError> {
    let message = plan.info.to_message()?;
    let commit = vcs.commit(&message, author, &plan.include)?;

    vcs.create_tags(&plan.tags, &commit, author, false)
        .map_err(|e| match e {
            VcsError::TagExists { tag } => EngineError::TagConflict {
                message: format!("tag {} already exists", tag),
            },
            other => EngineError::Vcs(other),
        })?;
    vcs.create_tags(&plan.moving_tags, &commit, author, true)?;

    vcs.push(all_tags).map_err(|e| match e {
        VcsError::PushRejected { message } => EngineError::PushConflict { message },
        other => EngineError::Vcs(other),
    })
}

fn rollback(vcs: &dyn VersionControl, checkpoint: &Checkpoint) {
    if let Err(e) = vcs.revert(checkpoint) {
        warn!(error = %e, head = %checkpoint.head, "failed to revert publish attempt");
    }
}
