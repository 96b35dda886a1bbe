//! # stepsync-reconcile
//!
//! Drift detection and reconciliation of plugin step registrations.
//!
//! [`diff`] classifies desired vs actual without touching the remote side;
//! [`Reconciler`] issues the writes that converge them. [`pipeline::run`]
//! chains validate → read → diff → reconcile for one assembly and is the
//! entry point used by the CLI.

pub mod compare;
pub mod drift;
pub mod error;
pub mod pipeline;
pub mod reconciler;

pub use compare::{Field, FieldDifference};
pub use drift::{diff, DriftEntry, DriftReport, ModifiedEntry};
pub use error::SyncError;
pub use pipeline::{run, run_all, RunMode, RunOptions, RunResult, RunStatus};
pub use reconciler::{
    reconcile, Action, EntityKind, EntryFailure, Operation, ReconcileOptions, ReconcileOutcome,
    Reconciler, Tally,
};
