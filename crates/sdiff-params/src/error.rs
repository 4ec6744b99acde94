//! Error types for parameter handling
//!
//! Covers:
//! - Reading and writing ini-style parameter files
//! - Collapsing indexed key families
//! - Drawing samples from declared ranges

use std::path::PathBuf;

/// Errors raised while loading, merging or writing a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Parameter file does not exist
    #[error("the file {} does not exist", path.display())]
    Missing { path: PathBuf },

    /// IO error reading or writing a parameter file
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Indexed family with a gap in its indices
    #[error("indexed family '{base}' is missing index {missing}")]
    IncompleteFamily { base: String, missing: usize },

    /// Indexed family whose base name is also declared as a plain key
    #[error("indexed family '{base}' collides with a plain key of the same name")]
    FamilyConflict { base: String },

    /// Same key declared varying with two different ranges
    #[error("parameter '{key}' is declared with conflicting ranges '{first}' and '{second}'")]
    ConflictingRange {
        key: String,
        first: String,
        second: String,
    },
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while drawing a sample
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    /// Range bounds could not be parsed
    #[error("cannot parse range '{value}' of parameter '{key}'")]
    RangeParse { key: String, value: String },

    /// Bounds parsed but do not describe a finite interval
    #[error("range of parameter '{key}' is not finite: [{min}, {max}]")]
    NonFinite { key: String, min: f64, max: f64 },
}
