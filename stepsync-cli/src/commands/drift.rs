//! `stepsync drift` — report differences without touching the environment.

use anyhow::Result;
use clap::Args;

use stepsync_reconcile::{RunOptions, RunStatus};

use super::TargetArgs;

/// Arguments for `stepsync drift`.
#[derive(Args, Debug)]
pub struct DriftArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl DriftArgs {
    pub fn run(self) -> Result<RunStatus> {
        super::execute(&self.target, &RunOptions::drift_only())
    }
}
