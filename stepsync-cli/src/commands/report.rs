//! Run summaries: human-readable tables on stdout, or one JSON document.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use stepsync_reconcile::{
    DriftEntry, DriftReport, ModifiedEntry, ReconcileOutcome, RunResult, RunStatus, SyncError,
    Tally,
};

type RunResults = [Result<RunResult, SyncError>];

/// Worst status across assemblies; an aborted assembly counts as failed.
pub fn overall_status(results: &RunResults) -> RunStatus {
    RunStatus::worst(results.iter().map(|r| match r {
        Ok(result) => result.status,
        Err(_) => RunStatus::Failed,
    }))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RunReportJson<'a> {
    status: RunStatus,
    exit_code: u8,
    results: Vec<&'a RunResult>,
    errors: Vec<RunErrorJson>,
}

#[derive(Serialize)]
struct RunErrorJson {
    assembly: String,
    error: String,
}

pub fn print_json(results: &RunResults) -> Result<()> {
    let status = overall_status(results);
    let payload = RunReportJson {
        status,
        exit_code: status.exit_code(),
        results: results.iter().filter_map(|r| r.as_ref().ok()).collect(),
        errors: results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(|err| RunErrorJson {
                assembly: err.assembly().to_string(),
                error: error_chain(err),
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize run JSON")?
    );
    Ok(())
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

// ---------------------------------------------------------------------------
// Human-readable
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct DriftRow {
    #[tabled(rename = "kind")]
    kind: &'static str,
    #[tabled(rename = "change")]
    change: String,
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "detail")]
    detail: String,
}

#[derive(Tabled)]
struct TallyRow {
    #[tabled(rename = "")]
    kind: &'static str,
    created: usize,
    updated: usize,
    deleted: usize,
    unchanged: usize,
    orphaned: usize,
    failed: usize,
    attempted: usize,
}

impl TallyRow {
    fn new(kind: &'static str, tally: &Tally) -> Self {
        Self {
            kind,
            created: tally.created,
            updated: tally.updated,
            deleted: tally.deleted,
            unchanged: tally.unchanged,
            orphaned: tally.orphaned,
            failed: tally.failed,
            attempted: tally.attempted(),
        }
    }
}

pub fn print_human(results: &RunResults) {
    if results.is_empty() {
        println!("No assemblies in manifest.");
        return;
    }
    for result in results {
        match result {
            Ok(result) => print_result(result),
            Err(err) => println!(
                "{} '{}' aborted: {}",
                "✗".red().bold(),
                err.assembly(),
                error_chain(err)
            ),
        }
    }
}

fn print_result(result: &RunResult) {
    let prefix = match &result.outcome {
        Some(outcome) if outcome.dry_run => "[dry-run] ",
        _ => "",
    };
    println!(
        "{prefix}{} '{}' {}",
        status_indicator(result.status),
        result.assembly,
        status_label(result.status)
    );

    for warning in &result.read_warnings {
        println!("  {} could not read {}: {}", "!".yellow(), warning.scope, warning.reason);
    }

    if let Some(drift) = &result.drift {
        print_drift(drift);
    }
    if let Some(outcome) = &result.outcome {
        print_outcome(outcome);
    }
}

fn print_drift(drift: &DriftReport) {
    if !drift.has_drift() {
        println!("  no drift");
        return;
    }
    let mut rows = Vec::with_capacity(drift.total());
    push_entries(&mut rows, "step", "missing", &drift.missing_steps);
    push_modified(&mut rows, "step", &drift.modified_steps);
    push_entries(&mut rows, "step", "orphaned", &drift.orphaned_steps);
    push_entries(&mut rows, "image", "missing", &drift.missing_images);
    push_modified(&mut rows, "image", &drift.modified_images);
    push_entries(&mut rows, "image", "orphaned", &drift.orphaned_images);

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn push_entries(
    rows: &mut Vec<DriftRow>,
    kind: &'static str,
    change: &str,
    entries: &[DriftEntry],
) {
    rows.extend(entries.iter().map(|entry| DriftRow {
        kind,
        change: change_label(change),
        key: entry.key.clone(),
        detail: entry
            .id
            .as_ref()
            .map(|id| format!("id {id}"))
            .unwrap_or_default(),
    }));
}

fn push_modified(rows: &mut Vec<DriftRow>, kind: &'static str, entries: &[ModifiedEntry]) {
    rows.extend(entries.iter().map(|entry| DriftRow {
        kind,
        change: change_label("modified"),
        key: entry.key.clone(),
        detail: entry
            .differences
            .iter()
            .map(|d| format!("{}: {:?} → {:?}", d.field, d.actual, d.desired))
            .collect::<Vec<_>>()
            .join("\n"),
    }));
}

fn print_outcome(outcome: &ReconcileOutcome) {
    let mut table = Table::new([
        TallyRow::new("steps", &outcome.steps),
        TallyRow::new("images", &outcome.images),
    ]);
    table.with(Style::rounded());
    println!("{table}");

    for action in &outcome.actions {
        let marker = if action.applied { "✎" } else { "~" };
        println!("  {marker}  {} {} {}", action.operation, action.kind, action.key);
    }
    for failure in &outcome.failures {
        println!(
            "  {}  {} {} {}: {}",
            "✗".red(),
            failure.operation,
            failure.kind,
            failure.key,
            failure.reason
        );
    }
    for orphan in &outcome.orphans {
        println!("  {}  orphan {orphan}", "·".magenta());
    }
    if !outcome.orphans.is_empty() {
        println!("Run with --force-delete-orphans to remove orphans.");
    }
}

fn change_label(change: &str) -> String {
    match change {
        "missing" => change.green().to_string(),
        "modified" => change.yellow().to_string(),
        _ => change.magenta().to_string(),
    }
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Converged => "converged",
        RunStatus::DriftRemaining => "drift remaining",
        RunStatus::Failed => "failed",
    }
}

fn status_indicator(status: RunStatus) -> String {
    match status {
        RunStatus::Converged => "✓".green().bold().to_string(),
        RunStatus::DriftRemaining => "■".yellow().bold().to_string(),
        RunStatus::Failed => "✗".red().bold().to_string(),
    }
}
