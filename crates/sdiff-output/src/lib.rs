//! sdiff Output
//!
//! Everything downstream of a solver run: reading its tabular output,
//! diffing two runs, and accumulating the result table.
//!
//! # Core Concepts
//!
//! - [`Catalog`]: immutable declaration of categories and variables
//! - [`OutputReader`]: loads `<stem>_<category>.dat` files into an [`OutputTable`]
//! - [`DiffEngine`]: worst interpolated relative difference per variable
//! - [`ResultTable`]: fixed-schema rows of inputs and differences
//!
//! # Example
//!
//! ```rust
//! use sdiff_output::{max_relative_diff, Series, SeriesPair};
//!
//! let x = [0.0, 1.0, 2.0];
//! let pair = SeriesPair::new(
//!     Series::new(&x, &[1.0, 1.0, 1.0]),
//!     Series::new(&x, &[1.1, 1.1, 1.1]),
//! );
//! let diff = max_relative_diff(pair, None).unwrap();
//! assert!((diff - 10.0).abs() < 1e-9);
//! ```

#![warn(missing_docs)]

pub mod catalog;
pub mod diff;
pub mod error;
pub mod header;
pub mod reader;
pub mod table;

// Re-exports
pub use catalog::{Catalog, CategorySpec};
pub use diff::{
    max_relative_diff, ColumnKey, DiffEngine, DiffSet, LinearInterpolant, ReferenceTables, Series,
    SeriesPair,
};
pub use error::{DiffError, OutputError, TableError};
pub use reader::{CategoryTable, OutputReader, OutputTable};
pub use table::{Column, DiffRecord, MissingPolicy, ResultTable, TableColumns};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
