//! stepsync — declarative plugin step registration.
//!
//! # Usage
//!
//! ```text
//! stepsync drift [--manifest <path>] [--assembly <name>] [--snapshot <path>] [--json]
//! stepsync sync  [--manifest <path>] [--assembly <name>] [--dry-run] [--force-delete-orphans]
//!                [--report] [--snapshot <path>] [--json]
//! stepsync export <assembly> --output <path>
//! ```
//!
//! Exit status: `0` converged, `2` drift remaining, `1` failure.
//! Logs go to stderr (`STEPSYNC_LOG` / `RUST_LOG`, default `info`); stdout
//! carries only the summary.

mod commands;
mod config;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{drift::DriftArgs, export::ExportArgs, sync::SyncArgs};
use stepsync_reconcile::RunStatus;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "stepsync",
    version,
    about = "Reconcile plugin step registrations with a declarative manifest",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report drift between the manifest and registered steps.
    Drift(DriftArgs),

    /// Create, update and (optionally) delete registrations to match the manifest.
    Sync(SyncArgs),

    /// Save the registered state of an assembly as a snapshot file.
    Export(ExportArgs),
}

impl Commands {
    fn run(self) -> Result<RunStatus> {
        match self {
            Commands::Drift(args) => args.run(),
            Commands::Sync(args) => args.run(),
            Commands::Export(args) => args.run(),
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    match cli.command.run() {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(RunStatus::Failed.exit_code())
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_env("STEPSYNC_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
