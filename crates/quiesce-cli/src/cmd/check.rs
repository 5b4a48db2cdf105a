//! `qsc check` — run one convergence round and persist the result.

use anyhow::{Context, Result};
use clap::Args;
use quiesce_core::config::{self, Config};
use quiesce_core::provider::DxCmdProvider;
use quiesce_core::round::{PendingEntry, run_round};
use quiesce_core::tracker::DriverId;
use serde::Serialize;
use std::env;
use std::io::Write as _;
use std::path::Path;
use std::process::ExitCode;

use crate::output::{self, OutputMode};
use crate::state;

/// Exit code when at least one driver is still draining.
const STILL_CONVERGING_EXIT: u8 = 1;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Drivers to sample (default: the [check].drivers list from config).
    #[arg(value_name = "DRIVER")]
    pub drivers: Vec<String>,
}

/// JSON shape of one check invocation.
#[derive(Debug, Serialize)]
struct CheckOutput<'a> {
    converged: bool,
    pending: &'a [PendingEntry],
}

/// Run one convergence round, persist the tracker, and report.
///
/// Exits 0 when every driver converged, 1 when any is still draining.
/// Fatal provider and state errors propagate to the caller instead.
pub fn run_check(
    args: &CheckArgs,
    config_path: &Path,
    mode: OutputMode,
    quiet: bool,
) -> Result<ExitCode> {
    let config = config::load_config(config_path)?;
    let drivers = round_drivers(args, &config)?;

    let mut tracker = state::load_tracker(&config.state.path)?;

    let tool_override = env::var("QSC_TOOL").ok();
    let command = config.provider.resolved_command(tool_override.as_deref())?;
    let mut provider = DxCmdProvider::new(command, config.provider.work_dir_path());

    let report =
        run_round(&mut tracker, &mut provider, &drivers).context("convergence round aborted")?;
    state::save_tracker(&config.state.path, &tracker)?;

    let checked = drivers.len();
    let payload = CheckOutput {
        converged: report.is_converged(),
        pending: report.pending(),
    };
    output::render(mode, &payload, |payload, w| {
        if payload.converged {
            if quiet {
                return Ok(());
            }
            return writeln!(w, "✓ all {checked} driver(s) converged");
        }
        writeln!(
            w,
            "still converging ({} of {checked} driver(s)):",
            payload.pending.len()
        )?;
        for entry in payload.pending {
            writeln!(w, "  {}: {}", entry.driver, entry.reason)?;
        }
        Ok(())
    })?;

    if payload.converged {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(STILL_CONVERGING_EXIT))
    }
}

/// Drivers for this round: named arguments win over the config list.
fn round_drivers(args: &CheckArgs, config: &Config) -> Result<Vec<DriverId>> {
    let names = if args.drivers.is_empty() {
        &config.check.drivers
    } else {
        &args.drivers
    };
    anyhow::ensure!(
        !names.is_empty(),
        "no drivers to check: name them on the command line or set [check].drivers in {}",
        config::CONFIG_FILE
    );
    Ok(names
        .iter()
        .map(|name| DriverId::new(name.as_str()))
        .collect())
}
