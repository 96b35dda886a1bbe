//! Error types for stepsync-remote.

use thiserror::Error;

use stepsync_core::ModelError;

/// All errors a remote call can produce.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, TLS, timeout, ...).
    #[error("{method} {url} failed: {reason}")]
    Transport {
        method: &'static str,
        url: String,
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    /// The response could not be interpreted.
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// A coded field held a value with no matching variant.
    #[error("remote record carries {0}")]
    Model(#[from] ModelError),

    /// The target of a write does not exist.
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    /// The remote side refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),
}
