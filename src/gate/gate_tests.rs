//! End-to-end gating scenarios: enter, exit, flush, re-run, rewind.

use tempfile::{tempdir, TempDir};

use crate::commands::executor::{RecordedOp, RecordingExecutor};
use crate::commands::FlagCommand;
use crate::config::RewindSpec;
use crate::gate::{GateError, StageGate};
use crate::resolver::{ConflictReason, Decision};
use crate::store::manifest;
use crate::types::{MsName, RewindTarget, Stage, VersionName};

fn name(s: &str) -> VersionName {
    VersionName::new(s)
}

struct Fixture {
    _dir: TempDir,
    gate: StageGate,
    exec: RecordingExecutor,
    ms: MsName,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let gate = StageGate::new(dir.path());
        Fixture {
            _dir: dir,
            gate,
            exec: RecordingExecutor::new(),
            ms: MsName::new("obs.ms"),
        }
    }

    /// Runs a full stage bracket and flushes it.
    fn run_stage(&mut self, stage: &Stage, spec: &RewindSpec) -> Decision {
        let decision = self.gate.enter(&self.ms, stage, spec).unwrap();
        self.gate.exit(&self.ms, stage, spec);
        self.gate.flush(&mut self.exec).unwrap();
        decision
    }

    fn list(&mut self) -> Vec<VersionName> {
        self.gate.store_mut().list(&self.ms).unwrap()
    }
}

fn stage(name: &str) -> Stage {
    Stage::new("p", name)
}

// ─── Scenario A: fresh run ───

#[test]
fn fresh_run_brackets_the_stage() {
    let mut fx = Fixture::new();
    let decision = fx.run_stage(&stage("flag"), &RewindSpec::disabled());

    assert_eq!(decision, Decision::Proceed);
    assert_eq!(fx.list(), [name("p_flag_before"), name("p_flag_after")]);
}

// ─── Scenario B: naive re-run ───

#[test]
fn naive_rerun_conflicts_and_plans_nothing() {
    let mut fx = Fixture::new();
    fx.run_stage(&stage("flag"), &RewindSpec::disabled());

    let err = fx
        .gate
        .enter(&fx.ms.clone(), &stage("flag"), &RewindSpec::disabled())
        .unwrap_err();

    let GateError::Conflict(conflict) = err else {
        panic!("expected a conflict");
    };
    assert_eq!(conflict.reason, ConflictReason::WouldOverwriteBefore);
    assert_eq!(
        conflict.history,
        [name("p_flag_before"), name("p_flag_after")]
    );
    // Nothing was planned for the refused stage.
    assert!(fx.gate.pending().is_empty());

    // The message tells the operator what to do.
    let msg = conflict.to_string();
    assert!(msg.contains("rewind_flags"));
    assert!(msg.contains("obs.ms"));
}

// ─── Scenario C: valid rewind ───

#[test]
fn rewind_to_own_before_marker_truncates_later_stages() {
    let mut fx = Fixture::new();
    fx.run_stage(&stage("flag"), &RewindSpec::disabled());
    fx.run_stage(&stage("selfcal"), &RewindSpec::disabled());
    assert_eq!(fx.list().len(), 4);

    let spec = RewindSpec::rewind_to(RewindTarget::Named(name("p_flag_before")));
    let decision = fx
        .gate
        .enter(&fx.ms.clone(), &stage("flag"), &spec)
        .unwrap();
    assert_eq!(
        decision,
        Decision::ProceedWithRewind {
            target: name("p_flag_before")
        }
    );

    fx.exec = RecordingExecutor::new();
    fx.gate.flush(&mut fx.exec).unwrap();

    // Restore to the target, then delete everything after it. No extra
    // save: the target is this stage's own before-marker.
    assert_eq!(
        fx.exec.ops(),
        [
            RecordedOp::Restore {
                ms: fx.ms.clone(),
                name: name("p_flag_before")
            },
            RecordedOp::Delete {
                ms: fx.ms.clone(),
                name: name("p_flag_after")
            },
            RecordedOp::Delete {
                ms: fx.ms.clone(),
                name: name("p_selfcal_before")
            },
            RecordedOp::Delete {
                ms: fx.ms.clone(),
                name: name("p_selfcal_after")
            },
        ]
    );
    assert_eq!(fx.list(), [name("p_flag_before")]);
}

#[test]
fn rewind_to_foreign_version_saves_fresh_before_marker() {
    let mut fx = Fixture::new();
    fx.run_stage(&stage("crosscal"), &RewindSpec::disabled());

    // A stage that never ran rewinds to crosscal's after-marker.
    let spec = RewindSpec::rewind_to(RewindTarget::Named(name("p_crosscal_after")));
    let decision = fx
        .gate
        .enter(&fx.ms.clone(), &stage("flag"), &spec)
        .unwrap();
    assert_eq!(
        decision,
        Decision::ProceedWithRewind {
            target: name("p_crosscal_after")
        }
    );
    fx.gate.flush(&mut fx.exec).unwrap();

    // The target is the latest entry, so there is nothing to delete, and
    // the stage's own before-marker is recorded on top.
    assert_eq!(
        fx.list(),
        [
            name("p_crosscal_before"),
            name("p_crosscal_after"),
            name("p_flag_before"),
        ]
    );
}

// ─── Scenario D: unsafe rewind ───

#[test]
fn rewind_that_spares_own_prior_run_is_refused() {
    let mut fx = Fixture::new();
    fx.run_stage(&stage("flag"), &RewindSpec::disabled());
    fx.run_stage(&stage("selfcal"), &RewindSpec::disabled());

    let spec = RewindSpec::rewind_to(RewindTarget::Named(name("p_selfcal_before")));
    let err = fx
        .gate
        .enter(&fx.ms.clone(), &stage("flag"), &spec)
        .unwrap_err();

    let GateError::Conflict(conflict) = err else {
        panic!("expected a conflict");
    };
    assert_eq!(conflict.reason, ConflictReason::RewindTooLittle);
    assert_eq!(conflict.requested, Some(name("p_selfcal_before")));
}

// ─── Scenario E: missing rewind target ───

#[test]
fn rewind_to_missing_version_is_refused() {
    let mut fx = Fixture::new();
    fx.run_stage(&stage("flag"), &RewindSpec::disabled());

    let spec = RewindSpec::rewind_to(RewindTarget::Named(name("nonexistent")));
    let err = fx
        .gate
        .enter(&fx.ms.clone(), &stage("flag"), &spec)
        .unwrap_err();

    let GateError::Conflict(conflict) = err else {
        panic!("expected a conflict");
    };
    assert_eq!(conflict.reason, ConflictReason::RewindToNonExisting);
    let msg = conflict.to_string();
    assert!(msg.contains("\"nonexistent\""));
}

// ─── Overwrite re-runs ───

#[test]
fn rerun_with_overwrite_moves_markers_to_tail() {
    let mut fx = Fixture::new();
    fx.run_stage(&stage("flag"), &RewindSpec::disabled());
    fx.run_stage(&stage("selfcal"), &RewindSpec::disabled());

    let spec = RewindSpec::disabled().with_overwrite(true);
    let decision = fx.run_stage(&stage("flag"), &spec);
    assert_eq!(decision, Decision::Proceed);

    assert_eq!(
        fx.list(),
        [
            name("p_selfcal_before"),
            name("p_selfcal_after"),
            name("p_flag_before"),
            name("p_flag_after"),
        ]
    );
}

// ─── Reset mode ───

#[test]
fn reset_stage_rerun_replays_from_own_before_marker() {
    let mut fx = Fixture::new();
    fx.run_stage(&stage("flag"), &RewindSpec::disabled());
    fx.run_stage(&stage("selfcal"), &RewindSpec::disabled());

    let decision = fx.run_stage(&stage("flag"), &RewindSpec::reset_stage());
    assert_eq!(
        decision,
        Decision::ProceedWithRewind {
            target: name("p_flag_before")
        }
    );
    assert_eq!(fx.list(), [name("p_flag_before"), name("p_flag_after")]);
}

#[test]
fn reset_stage_on_fresh_ms_behaves_like_fresh_run() {
    let mut fx = Fixture::new();
    let decision = fx.run_stage(&stage("flag"), &RewindSpec::reset_stage());
    assert_eq!(decision, Decision::Proceed);
    assert_eq!(fx.list(), [name("p_flag_before"), name("p_flag_after")]);
}

// ─── Two-phase discipline ───

#[test]
fn planned_commands_are_invisible_until_flushed() {
    let mut fx = Fixture::new();
    let flag = stage("flag");
    let spec = RewindSpec::disabled();

    fx.gate.enter(&fx.ms.clone(), &flag, &spec).unwrap();
    fx.gate.exit(&fx.ms.clone(), &flag, &spec);

    // Nothing committed yet: no executor calls, no manifest, and a second
    // decision for a different stage still sees the empty history.
    assert_eq!(fx.gate.pending().len(), 2);
    assert!(fx.exec.ops().is_empty());
    assert!(fx.list().is_empty());

    fx.gate.flush(&mut fx.exec).unwrap();
    assert!(fx.gate.pending().is_empty());
    assert_eq!(fx.list().len(), 2);
}

#[test]
fn deciding_without_flushing_sees_stale_history() {
    // The documented caller contract: a second enter for the same stage
    // without a flush in between still sees the pre-stage history, so it
    // does NOT conflict. Callers must flush between dependent decisions.
    let mut fx = Fixture::new();
    let flag = stage("flag");
    let spec = RewindSpec::disabled();

    fx.gate.enter(&fx.ms.clone(), &flag, &spec).unwrap();
    let second = fx.gate.enter(&fx.ms.clone(), &flag, &spec).unwrap();
    assert_eq!(second, Decision::Proceed, "stale history, no conflict seen");

    // The price: flushing now fails on the duplicate save.
    let err = fx.gate.flush(&mut fx.exec).unwrap_err();
    assert!(matches!(err, GateError::Store(_)));
}

#[test]
fn flush_after_each_decision_surfaces_the_conflict_instead() {
    let mut fx = Fixture::new();
    let flag = stage("flag");
    let spec = RewindSpec::disabled();

    fx.gate.enter(&fx.ms.clone(), &flag, &spec).unwrap();
    fx.gate.flush(&mut fx.exec).unwrap();

    let err = fx.gate.enter(&fx.ms.clone(), &flag, &spec).unwrap_err();
    assert!(matches!(err, GateError::Conflict(_)));
}

// ─── Multiple MSs ───

#[test]
fn each_ms_has_an_independent_history() {
    let dir = tempdir().unwrap();
    let mut gate = StageGate::new(dir.path());
    let mut exec = RecordingExecutor::new();
    let flag = stage("flag");
    let spec = RewindSpec::disabled();

    let ms_a = MsName::new("a.ms");
    let ms_b = MsName::new("b.ms");

    for ms in [&ms_a, &ms_b] {
        gate.enter(ms, &flag, &spec).unwrap();
        gate.exit(ms, &flag, &spec);
    }
    gate.flush(&mut exec).unwrap();

    assert_eq!(gate.store_mut().list(&ms_a).unwrap().len(), 2);
    assert_eq!(gate.store_mut().list(&ms_b).unwrap().len(), 2);

    // A conflict on one MS does not depend on the other's state.
    let err = gate.enter(&ms_a, &flag, &spec).unwrap_err();
    assert!(matches!(err, GateError::Conflict(_)));
}

#[test]
fn job_labels_number_ms_iterations() {
    let dir = tempdir().unwrap();
    let mut gate = StageGate::new(dir.path());
    let flag = stage("flag");
    let spec = RewindSpec::disabled();

    gate.enter(&MsName::new("a.ms"), &flag, &spec).unwrap();
    gate.enter(&MsName::new("b.ms"), &flag, &spec).unwrap();
    gate.exit(&MsName::new("a.ms"), &flag, &spec);

    let labels: Vec<&str> = gate.pending().iter().map(|p| p.label.as_str()).collect();
    assert_eq!(
        labels,
        [
            "save-p_flag_before-ms0",
            "save-p_flag_before-ms1",
            "save-p_flag_after-ms0",
        ]
    );
}

// ─── Flush reporting ───

#[test]
fn flush_reports_one_outcome_per_command() {
    let mut fx = Fixture::new();
    let flag = stage("flag");
    let spec = RewindSpec::disabled();

    fx.gate.enter(&fx.ms.clone(), &flag, &spec).unwrap();
    fx.gate.exit(&fx.ms.clone(), &flag, &spec);
    let report = fx.gate.flush(&mut fx.exec).unwrap();

    assert_eq!(report.len(), 2);
    assert!(report
        .outcomes
        .iter()
        .all(|(planned, _)| matches!(planned.command, FlagCommand::Save { .. })));
}

#[test]
fn flushing_an_empty_plan_is_a_noop() {
    let mut fx = Fixture::new();
    let report = fx.gate.flush(&mut fx.exec).unwrap();
    assert!(report.is_empty());
    assert!(fx.exec.ops().is_empty());
}

// ─── Persistence across gates ───

#[test]
fn history_survives_gate_restart() {
    let dir = tempdir().unwrap();
    let ms = MsName::new("obs.ms");
    let flag = stage("flag");
    let spec = RewindSpec::disabled();

    {
        let mut gate = StageGate::new(dir.path());
        let mut exec = RecordingExecutor::new();
        gate.enter(&ms, &flag, &spec).unwrap();
        gate.exit(&ms, &flag, &spec);
        gate.flush(&mut exec).unwrap();
    }

    // A fresh gate (fresh process) reads the same history back and
    // refuses the naive re-run.
    let mut gate = StageGate::new(dir.path());
    let err = gate.enter(&ms, &flag, &spec).unwrap_err();
    assert!(matches!(err, GateError::Conflict(_)));

    assert_eq!(
        manifest::read(dir.path(), &ms).unwrap().list(),
        [name("p_flag_before"), name("p_flag_after")]
    );
}
