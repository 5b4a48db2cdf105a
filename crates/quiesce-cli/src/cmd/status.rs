//! `qsc status` — read-only view of tracked driver slots.

use anyhow::Result;
use clap::Args;
use quiesce_core::config;
use quiesce_core::tracker::{ConvergenceTracker, DriverId, DriverState};
use serde::Serialize;
use std::io::Write as _;
use std::path::Path;

use crate::output::{self, OutputMode};
use crate::state;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Limit output to these drivers (default: every tracked driver).
    #[arg(value_name = "DRIVER")]
    pub drivers: Vec<String>,
}

/// One tracked slot as shown to the user.
#[derive(Debug, Serialize)]
struct SlotView {
    driver: String,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    watermark: Option<String>,
}

impl SlotView {
    fn new(driver: &DriverId, slot: &DriverState) -> Self {
        Self {
            driver: driver.to_string(),
            state: slot.as_str(),
            watermark: slot.watermark().map(ToString::to_string),
        }
    }
}

/// Show persisted convergence state without sampling anything.
pub fn run_status(args: &StatusArgs, config_path: &Path, mode: OutputMode) -> Result<()> {
    let config = config::load_config(config_path)?;
    let tracker = state::load_tracker(&config.state.path)?;

    let rows = slot_views(&tracker, &args.drivers);

    output::render(mode, &rows, |rows, w| {
        if rows.is_empty() {
            return writeln!(w, "no drivers tracked");
        }
        for row in rows {
            match &row.watermark {
                Some(mark) => writeln!(w, "{:<16} {}  (watermark {mark})", row.state, row.driver)?,
                None => writeln!(w, "{:<16} {}", row.state, row.driver)?,
            }
        }
        Ok(())
    })
}

fn slot_views(tracker: &ConvergenceTracker, filter: &[String]) -> Vec<SlotView> {
    if filter.is_empty() {
        let mut rows: Vec<SlotView> = tracker
            .entries()
            .map(|(driver, slot)| SlotView::new(driver, slot))
            .collect();
        rows.sort_by(|a, b| a.driver.cmp(&b.driver));
        return rows;
    }

    // Named drivers appear even when untracked, as no-baseline.
    filter
        .iter()
        .map(|name| {
            let driver = DriverId::new(name.as_str());
            let slot = tracker.state(&driver);
            SlotView::new(&driver, &slot)
        })
        .collect()
}
