//! Run settings and input files

use std::path::PathBuf;
use std::time::Duration;

use sdiff_output::{Catalog, MissingPolicy};

/// Solver executable looked up in each install directory by default
pub const DEFAULT_BINARY: &str = "class";

/// Knobs of one run that are not part of the parameter files
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Executable name inside each install directory
    pub binary: String,
    /// Per-invocation limit, unbounded when `None`
    pub timeout: Option<Duration>,
    /// Attempts per step before giving up, unbounded when `None`
    pub max_attempts: Option<usize>,
    /// Seed for reproducible sampling
    pub seed: Option<u64>,
    /// Handling of rows lacking an established column
    pub missing: MissingPolicy,
    /// Render plots once the run completes
    pub want_plots: bool,
    /// Categories and variables to compare
    pub catalog: Catalog,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            timeout: None,
            max_attempts: None,
            seed: None,
            missing: MissingPolicy::Reject,
            want_plots: false,
            catalog: Catalog::builtin(),
        }
    }
}

impl RunSettings {
    /// Set solver executable name
    #[inline]
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set per-invocation timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set retry cap per step
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set sampling seed
    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set missing-column policy
    #[inline]
    #[must_use]
    pub fn with_missing_policy(mut self, missing: MissingPolicy) -> Self {
        self.missing = missing;
        self
    }

    /// Enable plots at the end of the run
    #[inline]
    #[must_use]
    pub fn with_plots(mut self, want_plots: bool) -> Self {
        self.want_plots = want_plots;
        self
    }

    /// Replace the variable catalog
    #[inline]
    #[must_use]
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }
}

/// Parameter files of one run
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    /// Common parameter file, carries the reserved keys
    pub input: PathBuf,
    /// Overrides for the first version
    pub params_v1: Option<PathBuf>,
    /// Overrides for the second version
    pub params_v2: Option<PathBuf>,
    /// Reference-model overrides for the first version
    pub ref_params_v1: Option<PathBuf>,
    /// Reference-model overrides for the second version
    pub ref_params_v2: Option<PathBuf>,
}

impl RunInputs {
    /// Inputs with only a common parameter file
    #[must_use]
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }
}
