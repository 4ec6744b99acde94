//! Solver output reader
//!
//! Loads `<stem>_<category>.dat` files into an [`OutputTable`]. A missing
//! file, or a file without the declared independent variable, drops the
//! category; a missing dependent variable drops only that variable. A file
//! that exists but cannot be parsed is an error, never silently skipped.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::catalog::{Catalog, CategorySpec};
use crate::error::OutputError;
use crate::header::{base_name, parse_header};

/// One category of one solver run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTable {
    /// Independent variable samples
    pub x: Vec<f64>,
    /// Dependent variables by canonical name
    pub columns: IndexMap<String, Vec<f64>>,
}

impl CategoryTable {
    /// Get a dependent variable
    #[inline]
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }
}

/// All categories produced by one solver run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTable {
    categories: IndexMap<String, CategoryTable>,
}

impl OutputTable {
    /// Get one category
    #[inline]
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&CategoryTable> {
        self.categories.get(name)
    }

    /// Insert a category
    pub fn insert(&mut self, name: impl Into<String>, table: CategoryTable) {
        self.categories.insert(name.into(), table);
    }

    /// Iterate category names
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Check if no category was read
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Reads solver output files according to a catalog
#[derive(Debug, Clone)]
pub struct OutputReader {
    catalog: Catalog,
}

impl OutputReader {
    /// Create reader for a catalog
    #[inline]
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Catalog in use
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Path of one category file: `<dir>/<stem>_<category>.dat`
    #[must_use]
    pub fn output_path(dir: &Path, stem: &str, category: &str) -> PathBuf {
        dir.join(format!("{stem}_{category}.dat"))
    }

    /// Read every catalog category written under `dir` with file stem `stem`
    ///
    /// # Errors
    /// Returns `OutputError` if a file exists but cannot be read or parsed
    pub fn read(&self, dir: &Path, stem: &str) -> Result<OutputTable, OutputError> {
        let mut table = OutputTable::default();
        for (category, spec) in self.catalog.iter() {
            let path = Self::output_path(dir, stem, category);
            if let Some(category_table) = self.read_file(&path, spec)? {
                table.insert(category, category_table);
            }
        }
        tracing::debug!(
            "Read {} output categories for {}",
            table.categories.len(),
            stem
        );
        Ok(table)
    }

    /// Read one category file
    ///
    /// Returns `Ok(None)` if the file or its independent variable is absent.
    ///
    /// # Errors
    /// Returns `OutputError` if the file exists but cannot be read or parsed
    pub fn read_file(
        &self,
        path: &Path,
        spec: &CategorySpec,
    ) -> Result<Option<CategoryTable>, OutputError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No output file {}", path.display());
                return Ok(None);
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(OutputError::malformed(path, 0, "not valid UTF-8"));
            }
            Err(e) => return Err(OutputError::io_error(path, e)),
        };

        let Some(header) = text.lines().rev().find(|l| l.trim_start().starts_with('#')) else {
            return Err(OutputError::malformed(path, 0, "no header line"));
        };
        let names: Vec<String> = parse_header(header)
            .iter()
            .map(|label| spec.canonical(base_name(label)).to_string())
            .collect();

        let Some(x_index) = names.iter().position(|n| *n == spec.x) else {
            tracing::warn!(
                "Independent variable '{}' not found in {}",
                spec.x,
                path.display()
            );
            return Ok(None);
        };

        let rows = parse_rows(path, &text, names.len())?;
        let x = rows.iter().map(|row| row[x_index]).collect();

        let mut columns = IndexMap::new();
        for y in &spec.y {
            match names.iter().position(|n| n == y) {
                Some(index) => {
                    columns.insert(y.clone(), rows.iter().map(|row| row[index]).collect());
                }
                None => tracing::debug!("Variable '{}' not found in {}", y, path.display()),
            }
        }

        Ok(Some(CategoryTable { x, columns }))
    }
}

fn parse_rows(path: &Path, text: &str, width: usize) -> Result<Vec<Vec<f64>>, OutputError> {
    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OutputError::malformed(path, line_no + 1, e.to_string()))?;
        if row.len() != width {
            return Err(OutputError::malformed(
                path,
                line_no + 1,
                format!("expected {width} columns, found {}", row.len()),
            ));
        }
        rows.push(row);
    }
    Ok(rows)
}
