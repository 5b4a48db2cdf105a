//! `qsc reset` — re-arm convergence tracking for drivers.

use anyhow::Result;
use clap::Args;
use quiesce_core::config;
use quiesce_core::tracker::DriverId;
use serde::Serialize;
use std::io::Write as _;
use std::path::Path;

use crate::output::{self, OutputMode};
use crate::state;

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Drivers to reset.
    #[arg(value_name = "DRIVER", required_unless_present = "all")]
    pub drivers: Vec<String>,

    /// Reset every tracked driver.
    #[arg(long, conflicts_with = "drivers")]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct ResetOutput {
    reset: usize,
}

/// Forget remembered baselines so the next check starts a fresh watch.
///
/// This is how a converged slot is re-armed: convergence is sticky until
/// an operator (or the clean round itself) resets the driver.
pub fn run_reset(args: &ResetArgs, config_path: &Path, mode: OutputMode, quiet: bool) -> Result<()> {
    let config = config::load_config(config_path)?;
    let mut tracker = state::load_tracker(&config.state.path)?;

    let reset = if args.all {
        tracker.reset_all()
    } else {
        for name in &args.drivers {
            tracker.reset(&DriverId::new(name.as_str()));
        }
        args.drivers.len()
    };

    state::save_tracker(&config.state.path, &tracker)?;

    let payload = ResetOutput { reset };
    output::render(mode, &payload, |payload, w| {
        if quiet {
            return Ok(());
        }
        writeln!(w, "✓ reset {} driver(s)", payload.reset)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_output_json_shape() {
        let json = serde_json::to_value(ResetOutput { reset: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({ "reset": 3 }));
    }
}
