//! The stage gate: bracketing, gating, and the command plan.
//!
//! A stage wraps every MS it mutates in a `enter` / `exit` bracket:
//!
//! 1. [`StageGate::enter`] reads the MS's last-flushed history, asks
//!    [`crate::resolver::decide`] for a decision, and either plans the
//!    commands that decision calls for or aborts with a [`ConflictError`].
//! 2. The stage queues its actual flagging/calibration jobs.
//! 3. [`StageGate::exit`] plans the after-marker save.
//! 4. The driver runs the external job batch and calls
//!    [`StageGate::flush`], which commits the plan in order.
//!
//! # The two-phase contract
//!
//! `enter` decides against the last *flushed* history. Planned commands do
//! not become visible to later decisions until they are flushed, so a
//! caller that needs a second decision depending on an earlier plan (for
//! example, gating the same MS twice within one stage) must flush in
//! between. Skipping that flush means deciding on stale history.
//!
//! Conflicts are detected before anything is planned for the stage, so a
//! conflict never leaves an MS half-mutated by this crate. Exactly one
//! gate (and behind it, one stage) owns an MS's history at a time; the
//! `&mut self` receivers make a second concurrent writer unrepresentable
//! without interior mutability.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info};

use crate::commands::{CommandQueue, FlagCommand, FlagExecutor, PlannedCommand};
use crate::config::RewindSpec;
use crate::resolver::{decide, ConflictReason, Decision};
use crate::store::{ApplyOutcome, StoreError, VersionStore};
use crate::types::{DeleteTarget, MsName, Stage, StageMarkers, VersionName};

pub mod remediation;

#[cfg(test)]
mod gate_tests;

/// A refused gating decision, with everything needed to tell the operator
/// how to proceed.
///
/// The [`std::fmt::Display`] form is the full multi-line remediation
/// message; programmatic callers should match on [`ConflictError::reason`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictError {
    pub ms: MsName,
    pub stage: Stage,
    pub markers: StageMarkers,
    pub reason: ConflictReason,
    /// The history the decision was made against, oldest first.
    pub history: Vec<VersionName>,
    /// The resolved rewind target, when a rewind was requested.
    pub requested: Option<VersionName>,
}

impl std::fmt::Display for ConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", remediation::render(self))
    }
}

impl std::error::Error for ConflictError {}

/// Errors raised by the gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// The stage may not run; see the remediation message.
    #[error(transparent)]
    Conflict(Box<ConflictError>),

    /// Reading or committing state failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a flush committed.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// One outcome per committed command, in plan order.
    pub outcomes: Vec<(PlannedCommand, ApplyOutcome)>,
}

impl FlushReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Gates stages' access to MS flag histories and owns the command plan.
#[derive(Debug)]
pub struct StageGate {
    store: VersionStore,
    queue: CommandQueue,
    /// Per-MS job-label counter, assigned on first `enter` of each MS and
    /// stable for the lifetime of the gate.
    ms_iters: HashMap<MsName, usize>,
}

impl StageGate {
    /// A gate over the pipeline's MS directory.
    pub fn new(msdir: impl Into<PathBuf>) -> Self {
        StageGate::with_store(VersionStore::new(msdir))
    }

    pub fn with_store(store: VersionStore) -> Self {
        StageGate {
            store,
            queue: CommandQueue::new(),
            ms_iters: HashMap::new(),
        }
    }

    /// The underlying store, e.g. for listing histories.
    pub fn store_mut(&mut self) -> &mut VersionStore {
        &mut self.store
    }

    /// The commands planned but not yet flushed.
    pub fn pending(&self) -> &[PlannedCommand] {
        self.queue.pending()
    }

    /// Gates a stage's entry to one MS.
    ///
    /// On a proceed decision the gate plans the commands that bracket the
    /// stage's run; on a conflict nothing is planned and the error carries
    /// the remediation message. Reads the last-flushed history only.
    pub fn enter(
        &mut self,
        ms: &MsName,
        stage: &Stage,
        spec: &RewindSpec,
    ) -> Result<Decision, GateError> {
        let markers = StageMarkers::for_stage(stage);
        let history = self.store.history(ms)?.clone();
        let decision = decide(&history, &markers, spec);
        let iter = self.iter_for(ms);

        match &decision {
            Decision::FatalConflict { reason } => {
                let conflict = ConflictError {
                    ms: ms.clone(),
                    stage: stage.clone(),
                    requested: spec.resolved_target(&markers),
                    markers,
                    reason: *reason,
                    history: history.list().to_vec(),
                };
                error!(ms = %ms, stage = %stage, reason = %reason, "flag version conflict");
                return Err(GateError::Conflict(Box::new(conflict)));
            }
            Decision::ProceedWithRewind { target } => {
                self.queue.plan(
                    format!("version-{}-ms{}", target, iter),
                    FlagCommand::Restore {
                        ms: ms.clone(),
                        name: target.clone(),
                    },
                );
                if let Some(next) = history.successor_of(target) {
                    self.queue.plan(
                        format!("delete-flag_versions-after-{}-ms{}", target, iter),
                        FlagCommand::Delete {
                            ms: ms.clone(),
                            target: DeleteTarget::Version(next.clone()),
                        },
                    );
                }
                if *target != markers.before {
                    self.queue.plan(
                        format!("save-{}-ms{}", markers.before, iter),
                        FlagCommand::Save {
                            ms: ms.clone(),
                            name: markers.before.clone(),
                            overwrite: spec.overwrite,
                        },
                    );
                }
            }
            Decision::Proceed => {
                self.queue.plan(
                    format!("save-{}-ms{}", markers.before, iter),
                    FlagCommand::Save {
                        ms: ms.clone(),
                        name: markers.before.clone(),
                        overwrite: spec.overwrite,
                    },
                );
            }
        }

        info!(ms = %ms, stage = %stage, ?decision, "stage gated in");
        Ok(decision)
    }

    /// Closes a stage's bracket on one MS by planning the after-marker
    /// save.
    pub fn exit(&mut self, ms: &MsName, stage: &Stage, spec: &RewindSpec) {
        let markers = StageMarkers::for_stage(stage);
        let iter = self.iter_for(ms);
        self.queue.plan(
            format!("save-{}-ms{}", markers.after, iter),
            FlagCommand::Save {
                ms: ms.clone(),
                name: markers.after.clone(),
                overwrite: spec.overwrite,
            },
        );
    }

    /// Commits the plan, in order, through the executor.
    ///
    /// Stops at the first failure; commands already committed stay
    /// committed (there is no rollback) and the rest of the plan is
    /// discarded, since the pipeline run is over either way.
    pub fn flush<E: FlagExecutor>(&mut self, executor: &mut E) -> Result<FlushReport, GateError> {
        let mut report = FlushReport::default();
        for planned in self.queue.drain() {
            info!(label = %planned.label, command = %planned.command, "flushing flag command");
            let outcome = self.store.apply(&planned.command, executor)?;
            report.outcomes.push((planned, outcome));
        }
        Ok(report)
    }

    fn iter_for(&mut self, ms: &MsName) -> usize {
        let next = self.ms_iters.len();
        *self.ms_iters.entry(ms.clone()).or_insert(next)
    }
}
