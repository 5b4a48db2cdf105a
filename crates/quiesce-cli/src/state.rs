//! Persisted tracker state.
//!
//! The tracker lives in memory for exactly one invocation; between
//! invocations it is serialized to a JSON state file. Writes go through a
//! temp file and rename so an interrupted run never leaves a torn file
//! behind.

use quiesce_core::error::ErrorCode;
use quiesce_core::tracker::ConvergenceTracker;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// State file load/store failures.
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StateStoreError {
    /// Machine-readable code associated with this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::StateReadFailed,
            Self::Parse { .. } => ErrorCode::StateParseError,
            Self::Write { .. } => ErrorCode::StateWriteFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// Load the tracker from `path`. A missing file yields an empty tracker.
///
/// # Errors
///
/// Returns a [`StateStoreError`] when the file exists but cannot be read
/// or parsed.
pub fn load_tracker(path: &Path) -> Result<ConvergenceTracker, StateStoreError> {
    if !path.exists() {
        debug!(path = %path.display(), "no state file, starting fresh");
        return Ok(ConvergenceTracker::new());
    }

    let raw = fs::read_to_string(path).map_err(|source| StateStoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| StateStoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Persist the tracker to `path` through a temp file and rename.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns a [`StateStoreError`] when any filesystem step fails.
pub fn save_tracker(path: &Path, tracker: &ConvergenceTracker) -> Result<(), StateStoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| StateStoreError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    let encoded = serde_json::to_string_pretty(tracker).map_err(|source| StateStoreError::Write {
        path: path.to_path_buf(),
        source: source.into(),
    })?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, encoded.as_bytes()).map_err(|source| StateStoreError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| StateStoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), drivers = tracker.len(), "state saved");
    Ok(())
}
