//! Error types for stepsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// A desired-state record that violates a model invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// `kind: Package` was declared without a target container.
    #[error("assembly '{assembly}' is a package but has no target_container")]
    MissingTargetContainer { assembly: String },

    /// A required string field was empty.
    #[error("{context}: field '{field}' must not be empty")]
    EmptyField { context: String, field: &'static str },

    /// Execution order is 1-based.
    #[error("step {key}: execution_order must be >= 1")]
    InvalidExecutionOrder { key: String },

    /// Two desired steps share one identity key.
    #[error("assembly '{assembly}' declares step {key} more than once")]
    DuplicateStep { assembly: String, key: String },

    /// Two images on the same step share a name.
    #[error("step {step}: image '{image}' is declared more than once")]
    DuplicateImage { step: String, image: String },

    /// A numeric code read from the remote side has no matching variant.
    #[error("unknown {kind} code {code}")]
    UnknownCode { kind: &'static str, code: i32 },

    /// A name has no matching variant.
    #[error("unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },
}

/// All errors that can arise while loading a desired-state manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Underlying I/O failure, with the manifest path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error; includes file path and line context from serde_yaml.
    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The manifest file did not exist.
    #[error("manifest not found at {path}")]
    NotFound { path: PathBuf },

    /// The manifest parsed but describes an invalid desired state.
    #[error("invalid manifest at {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    /// `--assembly` named an assembly the manifest does not contain.
    #[error("assembly '{name}' is not declared in {path}")]
    UnknownAssembly { name: String, path: PathBuf },
}
