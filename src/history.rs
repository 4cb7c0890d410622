//! The ordered flag-version history of one MS.
//!
//! A history is an append-only list of version names: `save` appends at the
//! tail, `delete` truncates a suffix, and `restore` never mutates it at all.
//! These are the pure list semantics; reading and writing the sidecar
//! manifest, and driving the external flag manager, live in [`crate::store`].
//!
//! # Invariants
//!
//! - The history is totally ordered; "earlier" means "smaller index".
//! - Names are unique at any instant (a duplicate save fails unless
//!   overwriting), but a deleted name may be recreated later.
//! - Deletion never leaves a gap: deleting a name removes it and every
//!   entry after it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::types::{DeleteTarget, VersionName};

/// Error raised by history mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// A save would collide with an existing version name.
    #[error("flag version {0} already exists and overwriting was not requested")]
    DuplicateVersion(VersionName),
}

/// Outcome of a restore request.
///
/// Restoring to a missing version is deliberately not an error: the
/// external flag manager treats it as a no-op, and this core preserves
/// that behaviour. The distinguishable `Skipped` variant lets callers
/// escalate it if they want to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RestoreOutcome {
    /// The named version exists; its captured content is what the MS will
    /// hold after the command runs.
    Applied { name: VersionName },
    /// The named version does not exist; nothing will happen.
    Skipped { name: VersionName },
}

impl RestoreOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RestoreOutcome::Applied { .. })
    }
}

/// The ordered list of flag versions recorded for one MS.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<VersionName>,
}

impl History {
    /// An empty history. Histories are created lazily on first reference
    /// to an MS, so "no manifest on disk" and "empty history" are the
    /// same state.
    pub fn new() -> Self {
        History::default()
    }

    pub fn from_names(entries: Vec<VersionName>) -> Self {
        History { entries }
    }

    /// The recorded versions, oldest first.
    pub fn list(&self) -> &[VersionName] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, name: &VersionName) -> bool {
        self.entries.contains(name)
    }

    /// Position of a name in the history, if present.
    pub fn index_of(&self, name: &VersionName) -> Option<usize> {
        self.entries.iter().position(|entry| entry == name)
    }

    /// The most recently recorded version.
    pub fn latest(&self) -> Option<&VersionName> {
        self.entries.last()
    }

    /// The entry recorded immediately after `name`, if any.
    ///
    /// This is the starting point for the delete that follows a rewind:
    /// everything after the rewind target is discarded.
    pub fn successor_of(&self, name: &VersionName) -> Option<&VersionName> {
        let index = self.index_of(name)?;
        self.entries.get(index + 1)
    }

    /// Records a version at the tail of the history.
    ///
    /// If `name` is already present and `overwrite` is false, the save
    /// fails and the history is unchanged. With `overwrite` true, the
    /// existing entry is moved to the tail (its captured content is
    /// replaced by the external manager); all other entries keep their
    /// relative order.
    pub fn save(&mut self, name: VersionName, overwrite: bool) -> Result<(), HistoryError> {
        if let Some(index) = self.index_of(&name) {
            if !overwrite {
                return Err(HistoryError::DuplicateVersion(name));
            }
            self.entries.remove(index);
        }
        self.entries.push(name);
        Ok(())
    }

    /// Checks what restoring to `name` would do. Never mutates the history:
    /// a restore is a read of a snapshot, not a history operation.
    pub fn restore(&self, name: &VersionName) -> RestoreOutcome {
        if self.contains(name) {
            RestoreOutcome::Applied { name: name.clone() }
        } else {
            warn!(version = %name, "flag version could not be found, restore skipped");
            RestoreOutcome::Skipped { name: name.clone() }
        }
    }

    /// Removes a suffix of the history and returns the removed names,
    /// oldest first.
    ///
    /// Deleting a named version removes it and every entry after it;
    /// deleting [`DeleteTarget::All`] empties the history. A named target
    /// that is absent is a no-op.
    pub fn delete(&mut self, target: &DeleteTarget) -> Vec<VersionName> {
        let from = match target {
            DeleteTarget::All => 0,
            DeleteTarget::Version(name) => match self.index_of(name) {
                Some(index) => index,
                None => return Vec::new(),
            },
        };
        self.entries.split_off(from)
    }

    /// Removes exactly one entry by name, leaving later entries in place.
    ///
    /// Not part of the public history contract (which only permits suffix
    /// truncation): the store uses this to mirror the external manager one
    /// primitive at a time, e.g. the delete half of an overwrite save.
    pub(crate) fn delete_one(&mut self, name: &VersionName) -> bool {
        match self.index_of(name) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Display for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.entries.iter().map(|n| n.as_str()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
