//! Result table
//!
//! One row per accepted step: the sampled inputs followed by the worst
//! difference of every compared variable. The first row fixes the column
//! set; every later row must provide exactly those columns.
//!
//! On disk the table is a `#` header of `N:name` labels (inputs as `N:name`,
//! differences as `N:category:variable`) followed by fixed-width rows.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::diff::{ColumnKey, DiffSet};
use crate::error::TableError;
use crate::header::{format_header, parse_header};

/// Width of one formatted column
pub const COLUMN_WIDTH: usize = 24;

/// Significant decimals of formatted values
pub const PRECISION: usize = 12;

/// Columns read back from a table file, by name
pub type TableColumns = IndexMap<String, Vec<f64>>;

/// One column of the result table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// Sampled input parameter
    Input(String),
    /// Worst difference of one output variable
    Diff(ColumnKey),
}

impl Column {
    /// Header label of the column
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Input(name) => name.clone(),
            Self::Diff(key) => key.to_string(),
        }
    }
}

/// What to do when a row lacks an established column
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum MissingPolicy {
    /// Fail with `TableError::SchemaMismatch`
    #[default]
    Reject,
    /// Store the given sentinel
    Fill(f64),
}

/// Inputs and differences of one accepted step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffRecord {
    /// Sampled inputs, in declaration order
    pub inputs: IndexMap<String, f64>,
    /// Worst differences, in catalog order
    pub diffs: DiffSet,
}

/// Accumulated result rows with a fixed column set
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    schema: Option<Vec<Column>>,
    rows: Vec<Vec<f64>>,
    missing: MissingPolicy,
}

impl ResultTable {
    /// Create empty table that rejects incomplete rows
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the policy for missing columns
    #[inline]
    #[must_use]
    pub fn with_missing_policy(mut self, missing: MissingPolicy) -> Self {
        self.missing = missing;
        self
    }

    /// Established columns, empty before the first row
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        self.schema.as_deref().unwrap_or(&[])
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no row was appended
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append one record
    ///
    /// The first record fixes the columns: inputs in their order, then
    /// differences in theirs.
    ///
    /// # Errors
    /// Returns `TableError::SchemaMismatch` if a later record lacks an
    /// established column (under `MissingPolicy::Reject`) or carries an input
    /// the schema does not know. Differences outside the schema are dropped
    /// with a warning. The table is unchanged on error.
    pub fn append(&mut self, record: DiffRecord) -> Result<(), TableError> {
        let schema = self.schema.get_or_insert_with(|| {
            record
                .inputs
                .keys()
                .cloned()
                .map(Column::Input)
                .chain(record.diffs.keys().cloned().map(Column::Diff))
                .collect()
        });

        for name in record.inputs.keys() {
            if !schema.iter().any(|c| matches!(c, Column::Input(n) if n == name)) {
                return Err(unknown_column(name));
            }
        }
        for key in record.diffs.keys() {
            if !schema.iter().any(|c| matches!(c, Column::Diff(k) if k == key)) {
                tracing::warn!(
                    "Dropping {} from row {}: not part of the table schema",
                    key,
                    self.rows.len() + 1
                );
            }
        }

        let mut row = Vec::with_capacity(schema.len());
        for column in schema.iter() {
            let value = match column {
                Column::Input(name) => record.inputs.get(name),
                Column::Diff(key) => record.diffs.get(key),
            };
            match (value, self.missing) {
                (Some(value), _) => row.push(*value),
                (None, MissingPolicy::Fill(sentinel)) => row.push(sentinel),
                (None, MissingPolicy::Reject) => {
                    return Err(TableError::SchemaMismatch {
                        column: column.name(),
                        reason: "missing from row".to_string(),
                    });
                }
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Render header and rows
    #[must_use]
    pub fn to_text(&self) -> String {
        let labels: Vec<String> = self.columns().iter().map(Column::name).collect();
        let mut text = format_header(&labels, COLUMN_WIDTH);
        text.push('\n');
        for row in &self.rows {
            for value in row {
                text.push_str(&format!(
                    " {value:>width$.prec$e}",
                    width = COLUMN_WIDTH,
                    prec = PRECISION
                ));
            }
            text.push('\n');
        }
        text
    }

    /// Write the table, replacing the file atomically
    ///
    /// # Errors
    /// Returns `TableError::Io` if the file cannot be written
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        let path = path.as_ref();
        let mut staging = PathBuf::from(path);
        staging.as_mut_os_string().push(".tmp");
        fs::write(&staging, self.to_text()).map_err(|e| TableError::io_error(&staging, e))?;
        fs::rename(&staging, path).map_err(|e| TableError::io_error(path, e))?;
        tracing::debug!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// Columns of the in-memory table, by name
    #[must_use]
    pub fn to_columns(&self) -> TableColumns {
        self.columns()
            .iter()
            .enumerate()
            .map(|(i, column)| (column.name(), self.rows.iter().map(|row| row[i]).collect()))
            .collect()
    }

    /// Read a table file back into named columns
    ///
    /// # Errors
    /// - `TableError::Io` if the file cannot be read
    /// - `TableError::Malformed` if a row does not match the header
    pub fn read(path: impl AsRef<Path>) -> Result<TableColumns, TableError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| TableError::io_error(path, e))?;

        let mut names: Option<Vec<String>> = None;
        let mut values: Vec<Vec<f64>> = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                if names.is_none() {
                    let header = parse_header(line);
                    values = vec![Vec::new(); header.len()];
                    names = Some(header);
                }
                continue;
            }
            let Some(header) = &names else {
                return Err(TableError::Malformed {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    reason: "row before header".to_string(),
                });
            };
            let row = line
                .split_whitespace()
                .map(str::parse::<f64>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| TableError::Malformed {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    reason: e.to_string(),
                })?;
            if row.len() != header.len() {
                return Err(TableError::Malformed {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    reason: format!("expected {} values, found {}", header.len(), row.len()),
                });
            }
            for (column, value) in values.iter_mut().zip(row) {
                column.push(value);
            }
        }

        Ok(names
            .unwrap_or_default()
            .into_iter()
            .zip(values)
            .collect())
    }
}

fn unknown_column(name: &str) -> TableError {
    TableError::SchemaMismatch {
        column: name.to_string(),
        reason: "not part of the table schema".to_string(),
    }
}
