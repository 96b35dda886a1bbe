//! `stepsync sync` — converge registered steps and images to the manifest.

use anyhow::{bail, Result};
use clap::Args;

use stepsync_reconcile::{RunOptions, RunStatus};

use super::TargetArgs;

/// Arguments for `stepsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Log what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Delete registered steps and images that are not in the manifest.
    #[arg(long)]
    pub force_delete_orphans: bool,

    /// Also print the drift report found before reconciling. Implied by
    /// `--dry-run`.
    #[arg(long)]
    pub report: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<RunStatus> {
        if self.target.snapshot.is_some() && !self.dry_run {
            bail!("--snapshot only works with --dry-run; a snapshot cannot be written back");
        }
        let options = RunOptions {
            report_drift: self.report || self.dry_run,
            ..RunOptions::reconcile(self.dry_run, self.force_delete_orphans)
        };
        super::execute(&self.target, &options)
    }
}
