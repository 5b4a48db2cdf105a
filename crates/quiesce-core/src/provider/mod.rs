//! Snapshot acquisition.
//!
//! A provider turns a driver id into one [`Snapshot`] observation. The
//! shipped implementation shells out to the vendor's cache dump tool, see
//! [`dxcmd`]; tests swap in scripted providers.

pub mod dxcmd;

use crate::error::ErrorCode;
use crate::snapshot::Snapshot;
use crate::tracker::DriverId;
use std::io;
use std::path::PathBuf;

pub use dxcmd::DxCmdProvider;

/// Source of cache snapshots, one driver at a time.
pub trait SnapshotProvider {
    /// Observe the driver's transaction cache once.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when the observation itself fails. An
    /// empty cache is not an error; that is [`Snapshot::Empty`].
    fn fetch(&mut self, driver: &DriverId) -> Result<Snapshot, ProviderError>;
}

/// Fatal snapshot acquisition failures.
///
/// Every variant aborts the surrounding round. None of them ever stands in
/// for "the cache looks empty": a well-formed dump with no transaction
/// window is [`Snapshot::Empty`], not an error.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The configured command template has no executable.
    #[error("cache dump command is empty")]
    CommandEmpty,

    /// The tool could not be started at all.
    #[error("failed to launch `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The tool ran and reported failure.
    #[error("`{tool}` exited with code {code} for {driver}: {stderr}")]
    ToolFailed {
        tool: String,
        driver: DriverId,
        code: i32,
        stderr: String,
    },

    /// The dump file was missing or unreadable after the tool succeeded.
    #[error("failed to read snapshot {}: {source}", .path.display())]
    SnapshotUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The dump file exists but is not a usable cache dump document.
    #[error("malformed snapshot for {driver}: {detail}")]
    Malformed { driver: DriverId, detail: String },
}

impl ProviderError {
    /// Machine-readable code associated with this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::CommandEmpty => ErrorCode::ProviderCommandEmpty,
            Self::Spawn { .. } => ErrorCode::ToolSpawnFailed,
            Self::ToolFailed { .. } => ErrorCode::ToolExitFailure,
            Self::SnapshotUnreadable { .. } => ErrorCode::SnapshotUnreadable,
            Self::Malformed { .. } => ErrorCode::SnapshotMalformed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
