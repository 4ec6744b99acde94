//! Error types for output handling
//!
//! Provides error handling for:
//! - Loading the variable catalog
//! - Reading solver output files
//! - Interpolated difference computation
//! - Result table schema and (de)serialization

use std::path::PathBuf;

/// Errors while loading the catalog or reading solver output
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error reading a file
    #[error("io error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File exists but its content cannot be interpreted
    #[error("malformed output {}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Catalog file is not valid TOML for a catalog
    #[error("invalid catalog {}: {source}", path.display())]
    Catalog {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl OutputError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create malformed-content error
    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}

/// Errors in the interpolated difference computation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiffError {
    /// Abscissa and ordinate lengths differ
    #[error("series length mismatch: {x_len} abscissae, {y_len} ordinates")]
    LengthMismatch { x_len: usize, y_len: usize },

    /// Series has no points
    #[error("cannot interpolate an empty series")]
    EmptySeries,

    /// Abscissa contains NaN
    #[error("series abscissa contains NaN")]
    NanAbscissa,

    /// Evaluation outside the interpolation domain
    #[error("{x} lies outside the interpolation domain [{min}, {max}]")]
    OutOfDomain { x: f64, min: f64, max: f64 },

    /// Series do not share any abscissa
    #[error("series do not overlap: domain [{min}, {max}] is empty")]
    EmptyOverlap { min: f64, max: f64 },

    /// Failure while diffing one table column
    #[error("column {column}: {source}")]
    InColumn {
        column: String,
        #[source]
        source: Box<DiffError>,
    },
}

impl DiffError {
    /// Attach the column being diffed
    #[must_use]
    pub fn in_column(self, column: impl Into<String>) -> Self {
        Self::InColumn {
            column: column.into(),
            source: Box::new(self),
        }
    }
}

/// Errors in the result table
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// Row does not match the column set fixed by the first row
    #[error("schema mismatch on column '{column}': {reason}")]
    SchemaMismatch { column: String, reason: String },

    /// IO error reading or writing the table
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Table file cannot be parsed
    #[error("malformed table {}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl TableError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
