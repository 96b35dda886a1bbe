//! Subcommands and the arguments they share.

pub mod drift;
pub mod export;
pub mod report;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use stepsync_core::{manifest, Manifest};
use stepsync_reconcile::{run_all, RunOptions, RunStatus};
use stepsync_remote::{InMemoryApi, RegistrationApi, WebApiClient};

use crate::config::Config;

/// Where the desired state comes from and what it is compared against.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Desired-state manifest.
    #[arg(long, short, default_value = "stepsync.yaml")]
    pub manifest: PathBuf,

    /// Only process this assembly (default: every assembly in the manifest).
    #[arg(long, short)]
    pub assembly: Option<String>,

    /// Compare against an exported snapshot instead of the live environment.
    #[arg(long, value_name = "PATH")]
    pub snapshot: Option<PathBuf>,

    /// Config file (default: ~/.stepsync/config.yaml).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

/// Open the live Web API described by the config file.
pub fn connect(config_path: Option<&Path>) -> Result<WebApiClient> {
    let config = Config::load(config_path)?;
    let web = config.web_api()?;
    tracing::debug!(url = %web.environment_url, version = %web.api_version, "connecting");
    Ok(WebApiClient::new(web))
}

/// The API a run talks to: a snapshot-backed in-memory store or the live
/// environment.
fn open(target: &TargetArgs) -> Result<Box<dyn RegistrationApi>> {
    match &target.snapshot {
        Some(path) => {
            let state = manifest::load_snapshot_at(path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?;
            tracing::info!(
                snapshot = %path.display(),
                assembly = %state.assembly_name,
                steps = state.steps.len(),
                "running against snapshot"
            );
            Ok(Box::new(InMemoryApi::from_state(&state)))
        }
        None => Ok(Box::new(connect(target.config.as_deref())?)),
    }
}

/// Load the manifest, run every selected assembly and print the summary.
pub fn execute(target: &TargetArgs, options: &RunOptions) -> Result<RunStatus> {
    let loaded: Manifest = manifest::load_at(&target.manifest)
        .with_context(|| format!("failed to load manifest {}", target.manifest.display()))?;
    let selected: Vec<_> = loaded
        .select(target.assembly.as_deref(), &target.manifest)?
        .into_iter()
        .cloned()
        .collect();

    let mut api = open(target)?;
    let results = run_all(api.as_mut(), &selected, options);

    if target.json {
        report::print_json(&results)?;
    } else {
        report::print_human(&results);
    }
    Ok(report::overall_status(&results))
}
