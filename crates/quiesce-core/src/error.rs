//! Stable error codes for operator-facing failures.
//!
//! Every fatal error surfaced by the CLI carries one of these codes so
//! scripts and runbooks can match on `E####` instead of message text.
//! Codes are grouped by area:
//!
//!   E1xxx  configuration
//!   E2xxx  persisted tracker state
//!   E3xxx  cache dump tool and snapshot parsing
//!
//! Codes are append-only. Never reuse a retired number.

use std::fmt;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Config file exists but cannot be parsed.
    ConfigParseError,
    /// Provider command template resolved to nothing.
    ProviderCommandEmpty,
    /// State file exists but cannot be read.
    StateReadFailed,
    /// State file exists but cannot be parsed.
    StateParseError,
    /// State file could not be written.
    StateWriteFailed,
    /// Cache dump tool could not be launched.
    ToolSpawnFailed,
    /// Cache dump tool ran but exited with a failure status.
    ToolExitFailure,
    /// Dump file was not produced or could not be read.
    SnapshotUnreadable,
    /// Dump file exists but is not a usable cache dump document.
    SnapshotMalformed,
}

impl ErrorCode {
    /// Stable code string, e.g. `E1001`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::ProviderCommandEmpty => "E1002",
            Self::StateReadFailed => "E2001",
            Self::StateParseError => "E2002",
            Self::StateWriteFailed => "E2003",
            Self::ToolSpawnFailed => "E3001",
            Self::ToolExitFailure => "E3002",
            Self::SnapshotUnreadable => "E3003",
            Self::SnapshotMalformed => "E3004",
        }
    }

    /// Human-readable summary of the failure.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ProviderCommandEmpty => "Provider command is empty",
            Self::StateReadFailed => "State file unreadable",
            Self::StateParseError => "State file parse error",
            Self::StateWriteFailed => "State file write failed",
            Self::ToolSpawnFailed => "Cache dump tool failed to launch",
            Self::ToolExitFailure => "Cache dump tool exited with an error",
            Self::SnapshotUnreadable => "Snapshot file unreadable",
            Self::SnapshotMalformed => "Snapshot XML malformed",
        }
    }

    /// Suggested fix shown to the user, when one exists.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix the syntax in quiesce.toml and retry."),
            Self::ProviderCommandEmpty => Some("Set [provider].command in quiesce.toml."),
            Self::StateReadFailed => Some("Check permissions on the state file."),
            Self::StateParseError => {
                Some("Remove the state file to restart tracking from a clean slate.")
            }
            Self::StateWriteFailed => Some("Check disk space and write permissions."),
            Self::ToolSpawnFailed => {
                Some("Verify [provider].command points at an executable on PATH.")
            }
            Self::ToolExitFailure => Some("Check the driver id and the tool's stderr output."),
            Self::SnapshotUnreadable => {
                Some("Verify the tool writes its dump to the path it is given.")
            }
            Self::SnapshotMalformed => {
                Some("Verify the tool emits a driver-info cache dump document.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL_CODES: &[ErrorCode] = &[
        ErrorCode::ConfigParseError,
        ErrorCode::ProviderCommandEmpty,
        ErrorCode::StateReadFailed,
        ErrorCode::StateParseError,
        ErrorCode::StateWriteFailed,
        ErrorCode::ToolSpawnFailed,
        ErrorCode::ToolExitFailure,
        ErrorCode::SnapshotUnreadable,
        ErrorCode::SnapshotMalformed,
    ];

    #[test]
    fn error_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL_CODES {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn error_codes_follow_format() {
        for code in ALL_CODES {
            let s = code.code();
            assert!(s.starts_with('E'), "{s} must start with E");
            assert_eq!(s.len(), 5, "{s} must be E + 4 digits");
            assert!(s[1..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn messages_are_nonempty() {
        for code in ALL_CODES {
            assert!(!code.message().is_empty());
        }
    }

    #[test]
    fn display_matches_code() {
        assert_eq!(ErrorCode::SnapshotMalformed.to_string(), "E3004");
    }
}
