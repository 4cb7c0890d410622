//! Manifest-backed version store.
//!
//! [`VersionStore`] holds the per-MS histories, each one a mirror of the
//! MS's sidecar manifest. Reads are cached; the cache only changes when a
//! command is applied through [`VersionStore::apply`], so between flushes a
//! caller always sees the last-flushed state, never a hypothetical future
//! one.
//!
//! Applying a command does three things, in a fixed order:
//!
//! 1. validate against the mirror (duplicate saves are rejected before any
//!    external call),
//! 2. run the external primitives through the [`FlagExecutor`],
//! 3. update the mirror and persist the manifest.
//!
//! If the executor fails mid-command the mirror is persisted as far as the
//! primitives actually got. There is no rollback; recovery is an explicit
//! rewind on the next run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::commands::{ExecError, FlagCommand, FlagExecutor};
use crate::history::{History, HistoryError, RestoreOutcome};
use crate::types::{DeleteTarget, MsName, VersionName};

pub mod manifest;

pub use manifest::ManifestError;

/// Errors raised while applying commands to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Duplicate(#[from] HistoryError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// What applying one command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The version was recorded (and, if overwriting, moved to the tail).
    Saved { name: VersionName },
    /// The restore was applied, or skipped because the version is missing.
    Restored(RestoreOutcome),
    /// The named versions were removed, oldest first.
    Deleted { removed: Vec<VersionName> },
}

/// The per-MS version histories, mirrored from the sidecar manifests.
#[derive(Debug)]
pub struct VersionStore {
    msdir: PathBuf,
    cache: HashMap<MsName, History>,
}

impl VersionStore {
    /// A store over the pipeline's MS directory.
    pub fn new(msdir: impl Into<PathBuf>) -> Self {
        VersionStore {
            msdir: msdir.into(),
            cache: HashMap::new(),
        }
    }

    pub fn msdir(&self) -> &Path {
        &self.msdir
    }

    /// The history of an MS, loading its manifest on first reference.
    /// An MS with no manifest has an empty history.
    pub fn history(&mut self, ms: &MsName) -> Result<&History, StoreError> {
        self.ensure_loaded(ms)?;
        Ok(self.loaded(ms))
    }

    /// The recorded version names of an MS, oldest first. Never fails for
    /// an MS that simply has no history yet.
    pub fn list(&mut self, ms: &MsName) -> Result<Vec<VersionName>, StoreError> {
        Ok(self.history(ms)?.list().to_vec())
    }

    /// Drops the cached history of an MS so the next read goes back to the
    /// manifest. Needed when something other than this store (the real
    /// flag manager, a human) may have rewritten the sidecar.
    pub fn refresh(&mut self, ms: &MsName) {
        self.cache.remove(ms);
    }

    /// Applies one command: validate, execute, persist.
    pub fn apply<E: FlagExecutor>(
        &mut self,
        command: &FlagCommand,
        executor: &mut E,
    ) -> Result<ApplyOutcome, StoreError> {
        match command {
            FlagCommand::Save {
                ms,
                name,
                overwrite,
            } => self
                .save(ms, name, *overwrite, executor)
                .map(|()| ApplyOutcome::Saved { name: name.clone() }),
            FlagCommand::Restore { ms, name } => {
                self.restore(ms, name, executor).map(ApplyOutcome::Restored)
            }
            FlagCommand::Delete { ms, target } => self
                .delete(ms, target, executor)
                .map(|removed| ApplyOutcome::Deleted { removed }),
        }
    }

    /// Records the MS's current flags as `name`.
    ///
    /// A duplicate name without `overwrite` fails before any external call.
    /// With `overwrite`, the external manager deletes the stale capture and
    /// saves a fresh one, which moves the entry to the tail of the history.
    pub fn save<E: FlagExecutor>(
        &mut self,
        ms: &MsName,
        name: &VersionName,
        overwrite: bool,
        executor: &mut E,
    ) -> Result<(), StoreError> {
        self.ensure_loaded(ms)?;

        let present = self.loaded(ms).contains(name);
        if present && !overwrite {
            return Err(HistoryError::DuplicateVersion(name.clone()).into());
        }

        if present {
            executor.delete(ms, name)?;
            self.loaded(ms).delete_one(name);
            self.persist(ms)?;
        }

        executor.save(ms, name)?;
        // The name is guaranteed absent at this point.
        self.loaded(ms).save(name.clone(), false)?;
        self.persist(ms)?;
        info!(ms = %ms, version = %name, "saved flag version");
        Ok(())
    }

    /// Restores the MS's live flags to the captured content of `name`.
    ///
    /// A missing version is reported and skipped, never an error, and the
    /// history is not touched either way.
    pub fn restore<E: FlagExecutor>(
        &mut self,
        ms: &MsName,
        name: &VersionName,
        executor: &mut E,
    ) -> Result<RestoreOutcome, StoreError> {
        self.ensure_loaded(ms)?;

        let outcome = self.loaded(ms).restore(name);
        if outcome.is_applied() {
            executor.restore(ms, name)?;
            info!(ms = %ms, version = %name, "restored flag version");
        }
        Ok(outcome)
    }

    /// Removes `target` and every version recorded after it, one external
    /// delete per version, oldest first.
    ///
    /// Returns the names actually removed. If the executor fails partway,
    /// the manifest reflects the deletes that did complete and the error
    /// is propagated.
    pub fn delete<E: FlagExecutor>(
        &mut self,
        ms: &MsName,
        target: &DeleteTarget,
        executor: &mut E,
    ) -> Result<Vec<VersionName>, StoreError> {
        self.ensure_loaded(ms)?;

        let suffix: Vec<VersionName> = {
            let history = self.loaded(ms);
            match target {
                DeleteTarget::All => history.list().to_vec(),
                DeleteTarget::Version(name) => match history.index_of(name) {
                    Some(index) => history.list()[index..].to_vec(),
                    None => return Ok(Vec::new()),
                },
            }
        };

        let mut removed = Vec::with_capacity(suffix.len());
        for name in &suffix {
            if let Err(err) = executor.delete(ms, name) {
                self.persist(ms)?;
                return Err(err.into());
            }
            self.loaded(ms).delete_one(name);
            removed.push(name.clone());
        }
        self.persist(ms)?;
        info!(ms = %ms, count = removed.len(), "deleted flag versions");
        Ok(removed)
    }

    fn ensure_loaded(&mut self, ms: &MsName) -> Result<(), StoreError> {
        if !self.cache.contains_key(ms) {
            let history = manifest::read(&self.msdir, ms)?;
            self.cache.insert(ms.clone(), history);
        }
        Ok(())
    }

    /// Only meaningful after `ensure_loaded`; defaults to the lazily
    /// initialised empty history either way.
    fn loaded(&mut self, ms: &MsName) -> &mut History {
        self.cache.entry(ms.clone()).or_default()
    }

    fn persist(&mut self, ms: &MsName) -> Result<(), StoreError> {
        let history = self.loaded(ms).clone();
        manifest::write(&self.msdir, ms, &history)?;
        Ok(())
    }
}
