#![forbid(unsafe_code)]

mod cmd;
mod output;
mod state;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use quiesce_core::config;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit code for a round that hit a fatal error.
const FATAL_EXIT: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "qsc: convergence checker for identity-driver caches",
    long_about = None
)]
struct Cli {
    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the config file (default: ./quiesce.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from the flag and the environment.
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Convergence",
        about = "Run one convergence round",
        long_about = "Sample every requested driver's transaction cache once and report which are still draining.",
        after_help = "EXAMPLES:\n    # Check every configured driver\n    qsc check\n\n    # Check two drivers by name\n    qsc check \"Active Directory\" eDirectory\n\n    # Emit machine-readable output\n    qsc check --json"
    )]
    Check(cmd::check::CheckArgs),

    #[command(
        next_help_heading = "Convergence",
        about = "Show tracked driver state",
        long_about = "Show the persisted convergence state for tracked drivers without sampling anything.",
        after_help = "EXAMPLES:\n    # Show every tracked driver\n    qsc status\n\n    # Show one driver\n    qsc status \"Active Directory\"\n\n    # Emit machine-readable output\n    qsc status --json"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Convergence",
        about = "Re-arm convergence tracking",
        long_about = "Forget remembered baselines so the next check starts a fresh watch.",
        after_help = "EXAMPLES:\n    # Re-arm one driver\n    qsc reset \"Active Directory\"\n\n    # Re-arm every tracked driver\n    qsc reset --all"
    )]
    Reset(cmd::reset::ResetArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    qsc completions bash\n\n    # Generate zsh completions\n    qsc completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("QSC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "quiesce=debug,info"
        } else {
            "quiesce=info,warn"
        })
    });

    let format = env::var("QSC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn run(cli: Cli, mode: OutputMode) -> anyhow::Result<ExitCode> {
    let config_path = match cli.config {
        Some(ref path) => path.clone(),
        None => env::current_dir()?.join(config::CONFIG_FILE),
    };

    match cli.command {
        Commands::Check(ref args) => cmd::check::run_check(args, &config_path, mode, cli.quiet),
        Commands::Status(ref args) => {
            cmd::status::run_status(args, &config_path, mode)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reset(ref args) => {
            cmd::reset::run_reset(args, &config_path, mode, cli.quiet)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let mode = cli.output_mode();

    match run(cli, mode) {
        Ok(code) => code,
        Err(err) => {
            let error = output::CliError::from_report(&err);
            if output::render_error(mode, &error).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::from(FATAL_EXIT)
        }
    }
}
