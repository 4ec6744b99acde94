//! Error types for the runner
//!
//! Separates failures a fresh sample can fix (the solver misbehaved for
//! one point) from failures that end the run (bad configuration, missing
//! binaries, schema violations).

use std::path::PathBuf;

use sdiff_output::{DiffError, OutputError, TableError};
use sdiff_params::{ConfigError, SampleError};

/// Main runner error type
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Invalid run configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Parameter file or grouping error
    #[error("parameter error: {0}")]
    Params(#[from] ConfigError),

    /// Sampling error
    #[error("sampling error: {0}")]
    Sample(#[from] SampleError),

    /// Required directory does not exist
    #[error("{} does not exist", path.display())]
    MissingDirectory { path: PathBuf },

    /// Solver binary could not be started
    #[error("cannot start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error in the run layout
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Solver output exists but cannot be read
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Difference computation failed
    #[error("diff error: {0}")]
    Diff(#[from] DiffError),

    /// Both versions produced output but share no comparable variable
    #[error("no variable was produced by both versions")]
    NothingCompared,

    /// Result table error
    #[error("table error: {0}")]
    Table(#[from] TableError),

    /// Output pattern could not be compiled
    #[error("invalid output pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Plot rendering failed
    #[error("cannot render {}: {reason}", path.display())]
    Plot { path: PathBuf, reason: String },

    /// Run summary could not be encoded
    #[error("cannot encode run summary: {0}")]
    Summary(#[from] serde_json::Error),

    /// Retry cap reached for one step
    #[error("step {step} failed {attempts} attempts in a row")]
    RetriesExhausted { step: usize, attempts: usize },
}

impl RunError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if a fresh sample may succeed where this attempt failed
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Output(OutputError::Malformed { .. }) | Self::Diff(_) | Self::NothingCompared
        )
    }
}

/// Result type alias for runner operations
pub type RunResult<T> = Result<T, RunError>;
