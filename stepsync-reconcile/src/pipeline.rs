//! Single pipeline entry point used by the CLI.
//!
//! validate → read actual → diff → reconcile, for one assembly at a time.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stepsync_core::{AssemblyRegistration, ReadWarning};
use stepsync_remote::{read_actual, RegistrationApi};

use crate::drift::{diff, DriftReport};
use crate::error::SyncError;
use crate::reconciler::{ReconcileOptions, ReconcileOutcome, Reconciler};

/// What a pipeline run does after reading the actual state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Report drift only; never touches the remote side.
    DriftOnly,
    /// Converge the remote side (or plan to, under `dry_run`).
    Reconcile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: RunMode,
    pub dry_run: bool,
    pub force_delete_orphans: bool,
    /// Attach a drift report to a reconcile run. Always set for dry runs.
    pub report_drift: bool,
}

impl RunOptions {
    pub fn drift_only() -> Self {
        Self {
            mode: RunMode::DriftOnly,
            dry_run: true,
            force_delete_orphans: false,
            report_drift: true,
        }
    }

    pub fn reconcile(dry_run: bool, force_delete_orphans: bool) -> Self {
        Self {
            mode: RunMode::Reconcile,
            dry_run,
            force_delete_orphans,
            report_drift: dry_run,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No drift and no failures.
    Converged,
    /// Drift found, planned, or left in place (orphans, unread resources).
    DriftRemaining,
    /// At least one entry failed, or the run aborted.
    Failed,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Converged => 0,
            RunStatus::Failed => 1,
            RunStatus::DriftRemaining => 2,
        }
    }

    /// The status of several runs taken together.
    pub fn worst(statuses: impl IntoIterator<Item = RunStatus>) -> RunStatus {
        statuses
            .into_iter()
            .fold(RunStatus::Converged, |acc, status| match (acc, status) {
                (RunStatus::Failed, _) | (_, RunStatus::Failed) => RunStatus::Failed,
                (RunStatus::DriftRemaining, _) | (_, RunStatus::DriftRemaining) => {
                    RunStatus::DriftRemaining
                }
                _ => RunStatus::Converged,
            })
    }
}

/// Result of one pipeline run for one assembly.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub assembly: String,
    pub mode: RunMode,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift: Option<DriftReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReconcileOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub read_warnings: Vec<ReadWarning>,
    pub status: RunStatus,
}

/// Run the pipeline for one assembly. The assembly is looked up remotely by
/// `desired.name`.
///
/// Errors only when the desired model is invalid or the assembly lookup
/// itself fails; everything below that is reported in the result.
pub fn run<A>(
    api: &mut A,
    desired: &AssemblyRegistration,
    options: &RunOptions,
) -> Result<RunResult, SyncError>
where
    A: RegistrationApi + ?Sized,
{
    let started_at = Utc::now();
    let assembly = desired.name.clone();

    desired
        .validate()
        .map_err(|source| SyncError::InvalidDesired {
            assembly: assembly.clone(),
            source,
        })?;

    let actual = read_actual(&*api, &assembly).map_err(|source| SyncError::ReadActual {
        assembly: assembly.clone(),
        source,
    })?;
    if !actual.exists() {
        tracing::warn!(assembly = %assembly, "assembly is not registered remotely");
    }

    let drift = (options.mode == RunMode::DriftOnly || options.report_drift)
        .then(|| diff(desired, &actual));

    let outcome = match options.mode {
        RunMode::DriftOnly => None,
        RunMode::Reconcile => {
            let reconcile_options = ReconcileOptions {
                dry_run: options.dry_run,
                force_delete_orphans: options.force_delete_orphans,
            };
            Some(Reconciler::new(api, reconcile_options).reconcile(desired, &actual))
        }
    };

    let status = status_of(drift.as_ref(), outcome.as_ref(), !actual.warnings.is_empty());
    tracing::info!(assembly = %assembly, ?status, "run finished");

    Ok(RunResult {
        assembly,
        mode: options.mode,
        dry_run: options.mode == RunMode::DriftOnly || options.dry_run,
        started_at,
        finished_at: Utc::now(),
        drift,
        outcome,
        read_warnings: actual.warnings,
        status,
    })
}

/// Run every assembly in turn. An aborted assembly does not stop the others.
pub fn run_all<A>(
    api: &mut A,
    assemblies: &[AssemblyRegistration],
    options: &RunOptions,
) -> Vec<Result<RunResult, SyncError>>
where
    A: RegistrationApi + ?Sized,
{
    assemblies
        .iter()
        .map(|desired| {
            let result = run(&mut *api, desired, options);
            if let Err(err) = &result {
                tracing::error!(assembly = %desired.name, error = %err, "run aborted");
            }
            result
        })
        .collect()
}

fn status_of(
    drift: Option<&DriftReport>,
    outcome: Option<&ReconcileOutcome>,
    degraded: bool,
) -> RunStatus {
    if let Some(outcome) = outcome {
        if outcome.has_failures() {
            return RunStatus::Failed;
        }
        let planned = outcome.dry_run && outcome.changes() > 0;
        if planned || !outcome.orphans.is_empty() || degraded {
            return RunStatus::DriftRemaining;
        }
        return RunStatus::Converged;
    }
    if degraded || drift.is_some_and(DriftReport::has_drift) {
        RunStatus::DriftRemaining
    } else {
        RunStatus::Converged
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&[], RunStatus::Converged)]
    #[case(&[RunStatus::Converged, RunStatus::DriftRemaining], RunStatus::DriftRemaining)]
    #[case(&[RunStatus::Failed, RunStatus::DriftRemaining], RunStatus::Failed)]
    #[case(&[RunStatus::DriftRemaining, RunStatus::Failed], RunStatus::Failed)]
    fn worst_status_wins(#[case] statuses: &[RunStatus], #[case] expected: RunStatus) {
        assert_eq!(RunStatus::worst(statuses.iter().copied()), expected);
    }

    #[test]
    fn dry_run_options_carry_the_drift_report() {
        assert!(RunOptions::reconcile(true, false).report_drift);
        assert!(!RunOptions::reconcile(false, true).report_drift);
        assert!(RunOptions::drift_only().report_drift);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(RunStatus::Converged.exit_code(), 0);
        assert_eq!(RunStatus::Failed.exit_code(), 1);
        assert_eq!(RunStatus::DriftRemaining.exit_code(), 2);
    }

    #[test]
    fn live_run_with_only_changes_is_converged() {
        let mut outcome = ReconcileOutcome::default();
        outcome.steps.updated = 1;
        assert_eq!(status_of(None, Some(&outcome), false), RunStatus::Converged);
        outcome.dry_run = true;
        assert_eq!(
            status_of(None, Some(&outcome), false),
            RunStatus::DriftRemaining
        );
    }

    #[test]
    fn degraded_read_is_never_converged() {
        assert_eq!(
            status_of(Some(&DriftReport::default()), None, true),
            RunStatus::DriftRemaining
        );
    }
}
