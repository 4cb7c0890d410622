//! The executor interface to the external flag manager.
//!
//! The external job engine exposes exactly three remote primitives per MS:
//! save a named version, restore a named version, delete a named version.
//! Everything richer (suffix deletes, overwrite-as-delete-then-save) is
//! expanded by [`crate::store::VersionStore`] at flush time into calls on
//! this trait.
//!
//! Implementations are expected to be synchronous: the pipeline driver runs
//! one batch of jobs to completion before the next gating decision is made.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{MsName, VersionName};

/// Error from the external flag manager or the job engine wrapping it.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The backing job engine reported a failure.
    #[error("flag manager {op} of {name} on {ms} failed: {message}")]
    Backend {
        op: &'static str,
        ms: MsName,
        name: VersionName,
        message: String,
    },

    /// IO error from a local executor.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Executes the three flag-manager primitives against one MS at a time.
pub trait FlagExecutor {
    /// Capture the MS's current flags as version `name`.
    fn save(&mut self, ms: &MsName, name: &VersionName) -> Result<(), ExecError>;

    /// Overwrite the MS's live flags with the captured content of `name`.
    ///
    /// Only called for versions known to exist; restores of missing
    /// versions are skipped upstream and never reach the executor.
    fn restore(&mut self, ms: &MsName, name: &VersionName) -> Result<(), ExecError>;

    /// Remove the single version `name` from the external store.
    fn delete(&mut self, ms: &MsName, name: &VersionName) -> Result<(), ExecError>;
}

/// A primitive operation observed by [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RecordedOp {
    Save { ms: MsName, name: VersionName },
    Restore { ms: MsName, name: VersionName },
    Delete { ms: MsName, name: VersionName },
}

/// An executor that records the primitives it is asked to run and succeeds
/// at all of them.
///
/// Used by the `check` dry-run of the command-line tool and throughout the
/// tests: the recorded sequence is the observable side effect of a flush.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    ops: Vec<RecordedOp>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        RecordingExecutor::default()
    }

    /// The primitives executed so far, in order.
    pub fn ops(&self) -> &[RecordedOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<RecordedOp> {
        self.ops
    }
}

impl FlagExecutor for RecordingExecutor {
    fn save(&mut self, ms: &MsName, name: &VersionName) -> Result<(), ExecError> {
        self.ops.push(RecordedOp::Save {
            ms: ms.clone(),
            name: name.clone(),
        });
        Ok(())
    }

    fn restore(&mut self, ms: &MsName, name: &VersionName) -> Result<(), ExecError> {
        self.ops.push(RecordedOp::Restore {
            ms: ms.clone(),
            name: name.clone(),
        });
        Ok(())
    }

    fn delete(&mut self, ms: &MsName, name: &VersionName) -> Result<(), ExecError> {
        self.ops.push(RecordedOp::Delete {
            ms: ms.clone(),
            name: name.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_executor_preserves_call_order() {
        let ms = MsName::new("obs.ms");
        let mut exec = RecordingExecutor::new();
        exec.save(&ms, &VersionName::new("a")).unwrap();
        exec.restore(&ms, &VersionName::new("a")).unwrap();
        exec.delete(&ms, &VersionName::new("a")).unwrap();

        assert_eq!(
            exec.ops(),
            [
                RecordedOp::Save {
                    ms: ms.clone(),
                    name: VersionName::new("a")
                },
                RecordedOp::Restore {
                    ms: ms.clone(),
                    name: VersionName::new("a")
                },
                RecordedOp::Delete {
                    ms,
                    name: VersionName::new("a")
                },
            ]
        );
    }
}
