//! Per-driver cache convergence state machine.
//!
//! Each tracked driver owns one state slot. A slot records what the first
//! snapshot showed, then watches later snapshots for evidence that the
//! transaction cache has drained past the remembered baseline.
//!
//! # Transitions
//!
//! Given a fresh snapshot for a driver:
//!
//! ```text
//! NoBaseline    + NonEmpty -> Baseline(newest)   "First Pass. Cache Not Empty"
//! EmptyBaseline + NonEmpty -> Baseline(newest)   "Cache Just Set. Event Is Processing"
//! Baseline(t)   + NonEmpty -> Converged when t < oldest, else unchanged
//! NoBaseline    + Empty    -> EmptyBaseline      "First Pass. Cache Is Empty"
//! EmptyBaseline + Empty    -> Converged
//! Baseline(_)   + Empty    -> Converged
//! Converged     + anything -> Converged          (snapshot not consulted)
//! ```
//!
//! Watermark comparison is lexicographic, see [`Watermark`]. Converged is
//! sticky: the slot keeps answering converged until it is explicitly
//! reset, so traffic arriving after convergence stays masked.

use crate::snapshot::{Snapshot, Watermark};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque identifier for an identity-sync driver.
///
/// Compared and displayed verbatim. Spaces and punctuation are legal; the
/// provider is responsible for making the id filesystem-safe where needed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(String);

impl DriverId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DriverId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Driver State
// ---------------------------------------------------------------------------

/// Lifecycle of one driver's convergence watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum DriverState {
    /// Never observed since the last reset.
    NoBaseline,
    /// First observation found the cache empty; waiting for a second
    /// empty look to confirm nothing slipped in between.
    EmptyBaseline,
    /// First observation found traffic; `watermark` is the newest entry
    /// seen then, and the cache must drain past it.
    Baseline { watermark: Watermark },
    /// The watched transaction has drained. Sticky until reset.
    Converged,
}

impl DriverState {
    /// Short state label used in status output and the state file.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoBaseline => "no-baseline",
            Self::EmptyBaseline => "empty-baseline",
            Self::Baseline { .. } => "baseline",
            Self::Converged => "converged",
        }
    }

    /// Baseline watermark when one is being watched.
    #[must_use]
    pub const fn watermark(&self) -> Option<&Watermark> {
        match self {
            Self::Baseline { watermark } => Some(watermark),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline { watermark } => write!(f, "baseline({watermark})"),
            other => f.write_str(other.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a driver is still converging.
///
/// The strings are a wire contract: monitoring scripts built against the
/// original bridge match on them verbatim, so they are reproduced here
/// character for character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PendingReason {
    /// First observation and the cache already held traffic.
    #[serde(rename = "First Pass. Cache Not Empty")]
    FirstPassNotEmpty,
    /// First observation and the cache was empty.
    #[serde(rename = "First Pass. Cache Is Empty")]
    FirstPassEmpty,
    /// Cache filled right after an empty first observation.
    #[serde(rename = "Cache Just Set. Event Is Processing")]
    CacheJustSet,
    /// Oldest queued entry has not passed the remembered baseline.
    #[serde(rename = "Cache Processing, Event Still Processing")]
    StillProcessing,
}

impl PendingReason {
    /// Every reason, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::FirstPassNotEmpty,
        Self::FirstPassEmpty,
        Self::CacheJustSet,
        Self::StillProcessing,
    ];

    /// The exact reason string reported to callers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstPassNotEmpty => "First Pass. Cache Not Empty",
            Self::FirstPassEmpty => "First Pass. Cache Is Empty",
            Self::CacheJustSet => "Cache Just Set. Event Is Processing",
            Self::StillProcessing => "Cache Processing, Event Still Processing",
        }
    }
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating one snapshot for one driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The watched transaction has drained out of the cache.
    Converged,
    /// Not yet; the reason says where in the watch lifecycle the driver is.
    StillConverging(PendingReason),
}

impl Outcome {
    #[must_use]
    pub const fn is_converged(self) -> bool {
        matches!(self, Self::Converged)
    }

    /// The pending reason when still converging.
    #[must_use]
    pub const fn reason(self) -> Option<PendingReason> {
        match self {
            Self::Converged => None,
            Self::StillConverging(reason) => Some(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Registry of per-driver convergence slots.
///
/// Slots are independent; evaluating one driver never touches another.
/// There is no global instance: whoever runs the rounds owns a tracker and
/// decides how long it lives.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceTracker {
    states: HashMap<DriverId, DriverState>,
}

impl ConvergenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked drivers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Current state for a driver. Drivers never observed report
    /// [`DriverState::NoBaseline`].
    #[must_use]
    pub fn state(&self, id: &DriverId) -> DriverState {
        self.states
            .get(id)
            .cloned()
            .unwrap_or(DriverState::NoBaseline)
    }

    /// Iterate over every tracked slot, in arbitrary order.
    pub fn entries(&self) -> impl Iterator<Item = (&DriverId, &DriverState)> {
        self.states.iter()
    }

    /// Create a slot for `id` if absent, leaving existing state alone.
    pub fn ensure(&mut self, id: &DriverId) {
        self.states
            .entry(id.clone())
            .or_insert(DriverState::NoBaseline);
    }

    /// Feed one snapshot through the driver's state machine.
    ///
    /// The first evaluation after a reset never converges; it only records
    /// a baseline. A baseline drains when the cache's oldest watermark
    /// moves strictly past it, so an oldest entry equal to the baseline is
    /// still pending. Once a slot converges it stays converged, and the
    /// snapshot is not even looked at, until [`reset`](Self::reset).
    pub fn evaluate(&mut self, id: &DriverId, snapshot: &Snapshot) -> Outcome {
        let current = self.states.remove(id).unwrap_or(DriverState::NoBaseline);
        let (next, outcome) = transition(current, snapshot);
        debug!(
            driver = %id,
            state = next.as_str(),
            converged = outcome.is_converged(),
            "evaluated snapshot"
        );
        self.states.insert(id.clone(), next);
        outcome
    }

    /// Forget everything observed for `id`. The next evaluation starts a
    /// fresh watch from [`DriverState::NoBaseline`].
    pub fn reset(&mut self, id: &DriverId) {
        self.states.insert(id.clone(), DriverState::NoBaseline);
    }

    /// Reset every tracked slot. Returns the number of slots touched.
    pub fn reset_all(&mut self) -> usize {
        let count = self.states.len();
        for slot in self.states.values_mut() {
            *slot = DriverState::NoBaseline;
        }
        count
    }
}

fn transition(state: DriverState, snapshot: &Snapshot) -> (DriverState, Outcome) {
    match (state, snapshot) {
        // Sticky: once converged the snapshot no longer matters.
        (DriverState::Converged, _) => (DriverState::Converged, Outcome::Converged),

        (DriverState::NoBaseline, Snapshot::NonEmpty { newest, .. }) => (
            DriverState::Baseline {
                watermark: newest.clone(),
            },
            Outcome::StillConverging(PendingReason::FirstPassNotEmpty),
        ),

        (DriverState::EmptyBaseline, Snapshot::NonEmpty { newest, .. }) => (
            DriverState::Baseline {
                watermark: newest.clone(),
            },
            Outcome::StillConverging(PendingReason::CacheJustSet),
        ),

        (DriverState::Baseline { watermark }, Snapshot::NonEmpty { oldest, .. }) => {
            if watermark < *oldest {
                (DriverState::Converged, Outcome::Converged)
            } else {
                (
                    DriverState::Baseline { watermark },
                    Outcome::StillConverging(PendingReason::StillProcessing),
                )
            }
        }

        (DriverState::NoBaseline, Snapshot::Empty) => (
            DriverState::EmptyBaseline,
            Outcome::StillConverging(PendingReason::FirstPassEmpty),
        ),

        // An empty cache after any baseline means everything drained.
        (DriverState::EmptyBaseline | DriverState::Baseline { .. }, Snapshot::Empty) => {
            (DriverState::Converged, Outcome::Converged)
        }
    }
}
