//! Point-in-time views of a driver's transaction cache.
//!
//! A snapshot reports the cache's transaction window: the oldest and newest
//! watermarks still queued, or nothing at all when the cache is empty. How
//! the window was obtained is the provider's business; everything past the
//! provider works on these two shapes alone.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque position token for a queued transaction.
///
/// Watermarks order lexicographically, byte by byte, exactly as the
/// vendor's cache emits them. They are never parsed as numbers, so
/// `"10" < "9"` here even though 10 > 9. Comparisons only behave when the
/// source emits fixed-width tokens, which the vendor format does.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(String);

impl Watermark {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Watermark {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One observation of a driver's transaction cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// The cache held no transactions at observation time.
    Empty,
    /// The cache held at least one transaction. `oldest` and `newest`
    /// bound the queued window and coincide when only one is queued.
    NonEmpty { oldest: Watermark, newest: Watermark },
}

impl Snapshot {
    /// Build a non-empty snapshot from raw watermark tokens.
    pub fn non_empty(oldest: impl Into<String>, newest: impl Into<String>) -> Self {
        Self::NonEmpty {
            oldest: Watermark::new(oldest),
            newest: Watermark::new(newest),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::NonEmpty { oldest, newest } => write!(f, "{oldest}..{newest}"),
        }
    }
}
