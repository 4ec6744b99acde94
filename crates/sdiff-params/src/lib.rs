//! sdiff Parameters
//!
//! Ini-style parameter handling for randomized solver comparisons.
//!
//! # Overview
//!
//! - **Configuration**: flat `key = value` mapping parsed from an ini file
//! - **classify**: split into fixed scalars and `min,max` ranges
//! - **group_families**: collapse `name__1`, `name__2`, ... into `name`
//! - **Sampler**: draw one concrete value per range
//!
//! # Example
//!
//! ```rust
//! use sdiff_params::{classify, group_families, Configuration, Sampler};
//!
//! let config = Configuration::parse_str("h = 0.6,0.7\nn_s = 0.96\nw__1 = -1\nw__2 = 0\n");
//! let classified = classify(&config);
//!
//! let sample = Sampler::seeded(1).sample(&classified.varying).unwrap();
//! let resolved = sample.resolve(&classified.fixed, &classified.varying);
//! let grouped = group_families(&resolved).unwrap();
//!
//! assert_eq!(grouped.get("w"), Some("-1,0"));
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod family;
pub mod sampler;

// Re-exports
pub use config::{
    classify, is_range, parse, range_bounds, serialize, union_varying, Classified, Configuration,
};
pub use error::{ConfigError, SampleError};
pub use family::{group_families, split_indexed, FAMILY_SEPARATOR};
pub use sampler::{ParamRange, Sample, Sampler};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
