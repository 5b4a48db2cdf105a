//! One convergence round across a set of drivers.
//!
//! A round samples every driver's cache exactly once, in caller order, and
//! folds the outcomes into a single report. Rounds never retry or sleep;
//! whoever schedules the checks decides when the next round runs.

use crate::provider::{ProviderError, SnapshotProvider};
use crate::tracker::{ConvergenceTracker, DriverId, Outcome, PendingReason};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// A driver that was still draining when the round sampled it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingEntry {
    pub driver: DriverId,
    pub reason: PendingReason,
}

impl fmt::Display for PendingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.driver, self.reason)
    }
}

/// Aggregated result of one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundReport {
    /// Every sampled driver has drained its watched transaction.
    Converged,
    /// At least one driver is still draining, in sample order.
    Pending(Vec<PendingEntry>),
}

impl RoundReport {
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Drivers still draining, in sample order. Empty when converged.
    #[must_use]
    pub fn pending(&self) -> &[PendingEntry] {
        match self {
            Self::Converged => &[],
            Self::Pending(entries) => entries,
        }
    }
}

impl fmt::Display for RoundReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => f.write_str("converged"),
            Self::Pending(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{entry}")?;
                }
                Ok(())
            }
        }
    }
}

/// Sample every driver once and fold the outcomes into one report.
///
/// Drivers are sampled in the given order, and a pending outcome never
/// short-circuits the rest of the round: callers always see the full
/// picture. A round where every driver converged resets each sampled
/// driver, so the next queued transaction starts a fresh watch instead of
/// being masked by the sticky converged state. A round with any pending
/// driver resets nothing.
///
/// # Errors
///
/// Propagates the first [`ProviderError`] and aborts the round. Drivers
/// sampled before the failure keep the transitions they made; drivers
/// after it are not touched.
pub fn run_round<P: SnapshotProvider>(
    tracker: &mut ConvergenceTracker,
    provider: &mut P,
    drivers: &[DriverId],
) -> Result<RoundReport, ProviderError> {
    let mut pending = Vec::new();

    for driver in drivers {
        tracker.ensure(driver);
        let snapshot = provider.fetch(driver)?;
        match tracker.evaluate(driver, &snapshot) {
            Outcome::Converged => {
                debug!(driver = %driver, "converged");
            }
            Outcome::StillConverging(reason) => {
                debug!(driver = %driver, reason = reason.as_str(), "still converging");
                pending.push(PendingEntry {
                    driver: driver.clone(),
                    reason,
                });
            }
        }
    }

    if pending.is_empty() {
        for driver in drivers {
            tracker.reset(driver);
        }
        info!(drivers = drivers.len(), "round converged");
        Ok(RoundReport::Converged)
    } else {
        info!(
            drivers = drivers.len(),
            pending = pending.len(),
            "round still converging"
        );
        Ok(RoundReport::Pending(pending))
    }
}
