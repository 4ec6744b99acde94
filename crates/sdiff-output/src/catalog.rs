//! Output variable catalog
//!
//! Declares, per output category, the independent variable, the dependent
//! variables to compare, and how verbose solver column labels translate to
//! canonical short names. The catalog is an immutable value handed to the
//! reader and the diff engine at construction.
//!
//! # TOML format
//!
//! ```toml
//! [categories.background]
//! x = "z"
//! y = ["H"]
//!
//! [categories.background.rename]
//! "H [1/Mpc]" = "H"
//! ```

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::OutputError;

/// Variables of one output category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    /// Independent variable name
    pub x: String,
    /// Dependent variables to compare
    pub y: Vec<String>,
    /// Solver column label → canonical name
    #[serde(default)]
    pub rename: IndexMap<String, String>,
}

impl CategorySpec {
    /// Create a category without renames
    #[must_use]
    pub fn new(x: impl Into<String>, y: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            x: x.into(),
            y: y.into_iter().map(Into::into).collect(),
            rename: IndexMap::new(),
        }
    }

    /// Add a column rename
    #[must_use]
    pub fn with_rename(mut self, label: impl Into<String>, name: impl Into<String>) -> Self {
        self.rename.insert(label.into(), name.into());
        self
    }

    /// Canonical name of a solver column label
    #[inline]
    #[must_use]
    pub fn canonical<'a>(&'a self, label: &'a str) -> &'a str {
        self.rename.get(label).map_or(label, String::as_str)
    }
}

/// Catalog of every output category, in comparison order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Categories keyed by file suffix (`<stem>_<category>.dat`)
    pub categories: IndexMap<String, CategorySpec>,
}

impl Catalog {
    /// Catalog of the stock solver outputs
    #[must_use]
    pub fn builtin() -> Self {
        let mut categories = IndexMap::new();
        categories.insert(
            "background".to_string(),
            CategorySpec::new("z", ["H"]).with_rename("H [1/Mpc]", "H"),
        );
        categories.insert("cl".to_string(), CategorySpec::new("l", ["TT", "EE"]));
        categories.insert(
            "pk".to_string(),
            CategorySpec::new("k", ["P"])
                .with_rename("k (h/Mpc)", "k")
                .with_rename("P (Mpc/h)^3", "P"),
        );
        Self { categories }
    }

    /// Parse a catalog from TOML text
    ///
    /// # Errors
    /// Returns `OutputError::Catalog` if the text is not a valid catalog
    pub fn from_toml_str(text: &str) -> Result<Self, OutputError> {
        toml::from_str(text).map_err(|source| OutputError::Catalog {
            path: "<inline-catalog>".into(),
            source,
        })
    }

    /// Load a catalog from a TOML file
    ///
    /// # Errors
    /// - `OutputError::Io` if the file cannot be read
    /// - `OutputError::Catalog` if it is not a valid catalog
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OutputError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| OutputError::io_error(path, e))?;
        toml::from_str(&text).map_err(|source| OutputError::Catalog {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Look up one category
    #[inline]
    #[must_use]
    pub fn get(&self, category: &str) -> Option<&CategorySpec> {
        self.categories.get(category)
    }

    /// Iterate categories in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategorySpec)> {
        self.categories.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
