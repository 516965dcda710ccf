//! Error types for transcore

use std::path::PathBuf;

use thiserror::Error;

/// transcore error type
#[derive(Error, Debug)]
pub enum Error {
    /// A binning policy cannot describe a histogram (e.g. logarithmic with `min <= 0`).
    #[error("invalid binning policy: {0}")]
    InvalidBinningPolicy(String),

    /// An operation arrived in a run state that does not allow it.
    #[error("lifecycle violation: {0}")]
    LifecycleViolation(String),

    /// Final histograms could not be written.
    #[error("failed to persist results to {}: {source}", path.display())]
    Persistence {
        /// File or directory that could not be written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A worker partial result does not have the run's binning.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Malformed scoring configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl Error {
    /// Wrap an I/O failure on `path` as a persistence error.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence { path: path.into(), source }
    }

    /// Whether this is a persistence failure (the only error expected once a run is running).
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
