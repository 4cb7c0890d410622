//! Flag-manager commands as data.
//!
//! A gating decision is translated into command values that describe the
//! three primitive flag-manager operations without executing them. Commands
//! accumulate in a [`CommandQueue`] and are committed only when the queue is
//! flushed through an executor. This two-phase split keeps the decision
//! logic pure, makes the planned operations loggable and testable, and
//! pins down exactly which history a decision was made against: the last
//! flushed one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{DeleteTarget, MsName, VersionName};

pub mod executor;

pub use executor::{ExecError, FlagExecutor, RecordingExecutor};

/// One flag-manager operation, described but not yet executed.
///
/// `Save` and `Restore` map 1:1 onto the external manager's primitives.
/// `Delete` is a *suffix* delete: at flush time it expands into one
/// primitive delete per removed version, the named target first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum FlagCommand {
    /// Capture the MS's current flags under `name`.
    Save {
        ms: MsName,
        name: VersionName,
        overwrite: bool,
    },
    /// Set the MS's live flags to the captured content of `name`.
    Restore { ms: MsName, name: VersionName },
    /// Remove `target` and every version recorded after it.
    Delete { ms: MsName, target: DeleteTarget },
}

impl FlagCommand {
    /// The MS this command operates on.
    pub fn ms(&self) -> &MsName {
        match self {
            FlagCommand::Save { ms, .. }
            | FlagCommand::Restore { ms, .. }
            | FlagCommand::Delete { ms, .. } => ms,
        }
    }
}

impl fmt::Display for FlagCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagCommand::Save {
                ms,
                name,
                overwrite,
            } => {
                if *overwrite {
                    write!(f, "save {} on {} (overwrite)", name, ms)
                } else {
                    write!(f, "save {} on {}", name, ms)
                }
            }
            FlagCommand::Restore { ms, name } => write!(f, "restore {} on {}", name, ms),
            FlagCommand::Delete { ms, target } => {
                write!(f, "delete {} onwards on {}", target, ms)
            }
        }
    }
}

/// A command with its position in the plan and a human-readable job label.
///
/// Labels follow the pipeline's job-naming convention
/// (`save-<version>-ms<i>`, `delete-flag_versions-after-<version>-ms<i>`)
/// so queued jobs line up with the log output of the original recipes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedCommand {
    /// Position in the overall plan, assigned at planning time.
    pub seq: u64,
    /// When the command was planned (not when it ran).
    pub ts: DateTime<Utc>,
    /// Job label for logs and the external job queue.
    pub label: String,
    pub command: FlagCommand,
}

/// The ordered plan of not-yet-committed commands.
///
/// Planning never touches disk or the external manager; only
/// [`crate::gate::StageGate::flush`] does.
#[derive(Debug, Default)]
pub struct CommandQueue {
    items: Vec<PlannedCommand>,
    next_seq: u64,
}

impl CommandQueue {
    pub fn new() -> Self {
        CommandQueue::default()
    }

    /// Appends a command to the plan and returns its sequence number.
    pub fn plan(&mut self, label: impl Into<String>, command: FlagCommand) -> u64 {
        let planned = PlannedCommand {
            seq: self.next_seq,
            ts: Utc::now(),
            label: label.into(),
            command,
        };
        tracing::debug!(seq = planned.seq, label = %planned.label, command = %planned.command, "planned flag command");
        self.next_seq += 1;
        self.items.push(planned);
        self.next_seq - 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The planned commands, in plan order.
    pub fn pending(&self) -> &[PlannedCommand] {
        &self.items
    }

    /// Removes and returns the whole plan. Sequence numbers keep counting
    /// across drains, so labels stay unique over a pipeline run.
    pub fn drain(&mut self) -> Vec<PlannedCommand> {
        std::mem::take(&mut self.items)
    }
}
