//! The conflict-resolution decision function.
//!
//! Before a stage may mutate the flags of an MS, it must consult
//! [`decide`]: given the last-flushed version history, the stage's markers,
//! and the stage's rewind policy, exactly one of three decisions comes back.
//! The function is pure and total; it does no I/O and every input maps to
//! exactly one decision. Translating a decision into flag-manager commands
//! is [`crate::gate`]'s job.
//!
//! The conflicts it detects all have the same root cause: re-running a
//! stage whose markers are already in the history would silently produce
//! an ambiguous or lossy record of which flags came from where.

use serde::{Deserialize, Serialize};

use crate::config::{RewindMode, RewindSpec};
use crate::history::History;
use crate::types::{StageMarkers, VersionName};

/// Why a stage was refused permission to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// The stage's before-marker is already recorded, no rewind was
    /// requested, and overwriting is not allowed. Re-running would clobber
    /// the previous run's bracket.
    WouldOverwriteBefore,
    /// The requested rewind target sits *after* this stage's own previous
    /// before-marker, so rewinding would not actually undo the previous
    /// run, yet the stage is about to mutate flags again.
    RewindTooLittle,
    /// The requested rewind target is not in the history at all.
    RewindToNonExisting,
}

impl ConflictReason {
    /// The stable token used in logs and error reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictReason::WouldOverwriteBefore => "would_overwrite_before",
            ConflictReason::RewindTooLittle => "rewind_too_little",
            ConflictReason::RewindToNonExisting => "rewind_to_non_existing",
        }
    }
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The gating decision for one stage on one MS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Safe to record the before-marker and run.
    Proceed,
    /// Restore the MS to `target`, discard everything recorded after it,
    /// then record the before-marker (unless `target` *is* the
    /// before-marker) and run.
    ProceedWithRewind { target: VersionName },
    /// Abort the pipeline run; the operator must reconfigure.
    FatalConflict { reason: ConflictReason },
}

/// Decides whether a stage may mutate an MS, and how.
///
/// `history` must be the last *flushed* history of the MS. Decisions made
/// against queued-but-unflushed state are unsound; see the two-phase
/// contract on [`crate::gate::StageGate`].
pub fn decide(history: &History, markers: &StageMarkers, spec: &RewindSpec) -> Decision {
    if !spec.enable {
        return if history.contains(&markers.before) && !spec.overwrite {
            Decision::FatalConflict {
                reason: ConflictReason::WouldOverwriteBefore,
            }
        } else {
            Decision::Proceed
        };
    }

    // A reset is forgiving about a missing target (the stage simply has not
    // run yet); an explicit rewind is not.
    let (target, stop_if_missing) = match &spec.mode {
        RewindMode::ResetStage => (markers.before.clone(), false),
        RewindMode::ToVersion(target) => (target.resolve(markers), true),
    };

    if let Some(target_index) = history.index_of(&target) {
        let rewinds_past_own_run = history
            .index_of(&markers.before)
            .is_some_and(|before_index| before_index < target_index);
        if rewinds_past_own_run && !spec.overwrite {
            Decision::FatalConflict {
                reason: ConflictReason::RewindTooLittle,
            }
        } else {
            Decision::ProceedWithRewind { target }
        }
    } else if stop_if_missing {
        Decision::FatalConflict {
            reason: ConflictReason::RewindToNonExisting,
        }
    } else {
        Decision::Proceed
    }
}
