//! The sidecar version manifest of an MS.
//!
//! The external flag manager keeps the version list for `<ms>` in
//! `<ms>.flagversions/FLAG_VERSION_LIST`: one version per line, oldest
//! first. This core treats that list as the source of truth for the MS's
//! history and does not invent a separate format.
//!
//! Reading is tolerant: the manager appends a ` : <comment>` column to each
//! line, so only the first whitespace-separated token counts. A missing
//! manifest is an empty history, not an error. Writing uses the
//! write-to-temp-then-rename pattern so a crash mid-write cannot leave a
//! half-truncated list.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::history::History;
use crate::types::{MsName, VersionName};

/// Name of the list file inside the sidecar directory.
const LIST_FILE: &str = "FLAG_VERSION_LIST";

/// Errors raised while reading or writing a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error on version manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ManifestError {
    fn io(path: &Path, source: io::Error) -> Self {
        ManifestError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The path of the sidecar directory for an MS: `<msdir>/<ms>.flagversions`.
pub fn sidecar_dir(msdir: &Path, ms: &MsName) -> PathBuf {
    msdir.join(format!("{}.flagversions", ms))
}

/// The path of the version list file for an MS.
pub fn manifest_path(msdir: &Path, ms: &MsName) -> PathBuf {
    sidecar_dir(msdir, ms).join(LIST_FILE)
}

/// Reads the history recorded for an MS.
///
/// A missing sidecar directory or list file yields an empty history:
/// histories are lazily initialised on first save.
pub fn read(msdir: &Path, ms: &MsName) -> Result<History, ManifestError> {
    let path = manifest_path(msdir, ms);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(History::new()),
        Err(err) => return Err(ManifestError::io(&path, err)),
    };

    let mut names = Vec::new();
    for line in content.lines() {
        // First token only; the manager appends " : <comment>".
        if let Some(token) = line.split_whitespace().next() {
            names.push(VersionName::new(token));
        }
    }
    Ok(History::from_names(names))
}

/// Writes the history for an MS, creating the sidecar directory if needed.
///
/// The list is written to a temporary file and renamed into place, with
/// file and directory fsyncs, so the manifest on disk is always either the
/// old list or the new one.
pub fn write(msdir: &Path, ms: &MsName, history: &History) -> Result<(), ManifestError> {
    let dir = sidecar_dir(msdir, ms);
    fs::create_dir_all(&dir).map_err(|err| ManifestError::io(&dir, err))?;

    let path = dir.join(LIST_FILE);
    let tmp_path = dir.join(format!("{}.tmp", LIST_FILE));

    {
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|err| ManifestError::io(&tmp_path, err))?;
        for name in history.list() {
            writeln!(tmp, "{}", name).map_err(|err| ManifestError::io(&tmp_path, err))?;
        }
        tmp.sync_all().map_err(|err| ManifestError::io(&tmp_path, err))?;
    }

    fs::rename(&tmp_path, &path).map_err(|err| ManifestError::io(&path, err))?;
    fsync_dir(&dir).map_err(|err| ManifestError::io(&dir, err))?;
    Ok(())
}

/// Syncs the sidecar directory so the rename is durable.
fn fsync_dir(dir: &Path) -> io::Result<()> {
    let handle = File::open(dir)?;
    handle.sync_all()
}
