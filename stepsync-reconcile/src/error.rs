//! Error types for stepsync-reconcile.

use thiserror::Error;

use stepsync_core::ModelError;
use stepsync_remote::ApiError;

/// Errors that stop a run for one assembly before any write is attempted.
///
/// Failures of individual writes are not errors; they are collected in
/// [`crate::ReconcileOutcome::failures`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The desired model violates a structural invariant.
    #[error("invalid desired state for {assembly}: {source}")]
    InvalidDesired {
        assembly: String,
        #[source]
        source: ModelError,
    },

    /// The actual state could not be read at all.
    #[error("failed to read registrations of {assembly}: {source}")]
    ReadActual {
        assembly: String,
        #[source]
        source: ApiError,
    },
}

impl SyncError {
    pub fn assembly(&self) -> &str {
        match self {
            SyncError::InvalidDesired { assembly, .. } | SyncError::ReadActual { assembly, .. } => {
                assembly
            }
        }
    }
}
