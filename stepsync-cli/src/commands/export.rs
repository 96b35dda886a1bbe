//! `stepsync export` — write the registered state of one assembly to a
//! snapshot file for offline `drift` / `sync --dry-run`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use stepsync_core::manifest;
use stepsync_reconcile::RunStatus;
use stepsync_remote::read_actual;

/// Arguments for `stepsync export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Assembly to export.
    pub assembly: String,

    /// Snapshot file to write.
    #[arg(long, short)]
    pub output: PathBuf,

    /// Config file (default: ~/.stepsync/config.yaml).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ExportArgs {
    pub fn run(self) -> Result<RunStatus> {
        let api = super::connect(self.config.as_deref())?;
        let state = read_actual(&api, &self.assembly)
            .with_context(|| format!("failed to read '{}'", self.assembly))?;

        if !state.exists() {
            bail!("assembly '{}' is not registered", self.assembly);
        }
        if !state.warnings.is_empty() {
            for warning in &state.warnings {
                eprintln!("  ! {}: {}", warning.scope, warning.reason);
            }
            bail!(
                "{} read(s) failed; refusing to write an incomplete snapshot",
                state.warnings.len()
            );
        }

        manifest::save_snapshot_at(&self.output, &state)
            .with_context(|| format!("failed to write {}", self.output.display()))?;
        println!(
            "{} exported '{}' ({} steps, {} images) to {}",
            "✓".green(),
            state.assembly_name,
            state.steps.len(),
            state.image_count(),
            self.output.display()
        );
        Ok(RunStatus::Converged)
    }
}
