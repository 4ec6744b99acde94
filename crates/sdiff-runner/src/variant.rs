//! Solver variants and the per-run plan
//!
//! A run compares two solver versions. Each version runs its primary
//! configuration and, when reference overrides are given, a reference
//! configuration whose deviation is subtracted from the primary one.

use std::fmt;
use std::path::{Path, PathBuf};

use sdiff_params::{classify, parse, union_varying, Configuration};
use serde::Serialize;

use crate::error::{RunError, RunResult};
use crate::settings::RunInputs;

/// Reserved key holding `<dir>/<file prefix>` of the run
pub const ROOT_OUTPUT: &str = "root_output";

/// Keys consumed by the runner, never written to solver configurations
pub const RESERVED_KEYS: [&str; 3] = [
    ROOT_OUTPUT,
    SolverVersion::V1.install_key(),
    SolverVersion::V2.install_key(),
];

/// One of the two solver builds under comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverVersion {
    /// First build
    V1,
    /// Second build
    V2,
}

impl SolverVersion {
    /// Both versions, in comparison order
    pub const ALL: [Self; 2] = [Self::V1, Self::V2];

    /// Short tag, `v1` or `v2`
    #[inline]
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }

    /// Reserved key naming the install directory of this version
    #[inline]
    #[must_use]
    pub const fn install_key(self) -> &'static str {
        match self {
            Self::V1 => "root_class_v1",
            Self::V2 => "root_class_v2",
        }
    }
}

impl fmt::Display for SolverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One configuration run by one solver version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Model under test
    Primary(SolverVersion),
    /// Reference model whose deviation is subtracted
    Reference(SolverVersion),
}

impl Variant {
    /// Tag used in file names: `v1`, `v2`, `ref_v1`, `ref_v2`
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Primary(SolverVersion::V1) => "v1",
            Self::Primary(SolverVersion::V2) => "v2",
            Self::Reference(SolverVersion::V1) => "ref_v1",
            Self::Reference(SolverVersion::V2) => "ref_v2",
        }
    }

    /// Solver version running this variant
    #[inline]
    #[must_use]
    pub const fn version(self) -> SolverVersion {
        match self {
            Self::Primary(version) | Self::Reference(version) => version,
        }
    }

    /// Check if this is a reference variant
    #[inline]
    #[must_use]
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::Reference(_))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Everything needed to run one variant
#[derive(Debug, Clone)]
pub struct VariantSetup {
    /// Which variant
    pub variant: Variant,
    /// Install directory of the solver version
    pub install_dir: PathBuf,
    /// Executable inside the install directory
    pub program: PathBuf,
    /// Scalar parameters
    pub fixed: Configuration,
    /// Range parameters
    pub varying: Configuration,
    /// Output file stem, `<prefix><tag>`
    pub stem: String,
}

/// Validated description of a run
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Directory receiving every run artifact
    pub output_dir: PathBuf,
    /// File prefix of solver outputs
    pub prefix: String,
    /// Variants, primaries first
    pub variants: Vec<VariantSetup>,
    /// Union of varying parameters across variants, sampled once per attempt
    pub varying: Configuration,
}

impl RunPlan {
    /// Parse parameter files into a plan
    ///
    /// # Errors
    /// - `RunError::Params` if a parameter file is missing or two variants
    ///   declare different ranges for one key
    /// - `RunError::Config` if a reserved key is missing, or only one
    ///   reference override is given
    /// - `RunError::MissingDirectory` if an install directory does not exist
    pub fn prepare(inputs: &RunInputs, binary: &str) -> RunResult<Self> {
        let mut common = parse(&inputs.input)?;

        let root_output = common
            .remove(ROOT_OUTPUT)
            .ok_or_else(|| RunError::Config(format!("{ROOT_OUTPUT} is not declared")))?;
        let (output_dir, prefix) = split_root_output(&root_output);

        let mut install_dirs = Vec::with_capacity(SolverVersion::ALL.len());
        for version in SolverVersion::ALL {
            let key = version.install_key();
            let dir = common
                .remove(key)
                .map(PathBuf::from)
                .ok_or_else(|| RunError::Config(format!("{key} is not declared")))?;
            if !dir.is_dir() {
                return Err(RunError::MissingDirectory { path: dir });
            }
            install_dirs.push((version, dir));
        }

        let mut overrides = vec![
            (Variant::Primary(SolverVersion::V1), inputs.params_v1.as_deref()),
            (Variant::Primary(SolverVersion::V2), inputs.params_v2.as_deref()),
        ];
        match (&inputs.ref_params_v1, &inputs.ref_params_v2) {
            (Some(ref_v1), Some(ref_v2)) => {
                overrides.push((Variant::Reference(SolverVersion::V1), Some(ref_v1.as_path())));
                overrides.push((Variant::Reference(SolverVersion::V2), Some(ref_v2.as_path())));
            }
            (None, None) => {}
            _ => {
                return Err(RunError::Config(
                    "reference parameters must be given for both versions".to_string(),
                ));
            }
        }

        let mut variants = Vec::with_capacity(overrides.len());
        for (variant, override_path) in overrides {
            let raw = match override_path {
                Some(path) => common.overlay(&load_override(path)?),
                None => common.clone(),
            };
            let classified = classify(&raw);
            let install_dir = install_dirs
                .iter()
                .find(|(version, _)| *version == variant.version())
                .map(|(_, dir)| dir.clone())
                .ok_or_else(|| RunError::Config(format!("no install directory for {variant}")))?;

            tracing::debug!(
                "Variant {}: {} fixed, {} varying parameters",
                variant,
                classified.fixed.len(),
                classified.varying.len()
            );
            variants.push(VariantSetup {
                variant,
                program: install_dir.join(binary),
                install_dir,
                fixed: classified.fixed,
                varying: classified.varying,
                stem: format!("{prefix}{}", variant.tag()),
            });
        }

        let varying = union_varying(variants.iter().map(|setup| &setup.varying))?;

        Ok(Self {
            output_dir,
            prefix,
            variants,
            varying,
        })
    }

    /// Check if reference variants run alongside the primaries
    #[must_use]
    pub fn has_reference(&self) -> bool {
        self.variants.iter().any(|setup| setup.variant.is_reference())
    }

    /// Setup of one variant
    #[must_use]
    pub fn variant(&self, variant: Variant) -> Option<&VariantSetup> {
        self.variants.iter().find(|setup| setup.variant == variant)
    }
}

/// Split `<dir>/<prefix>`; a bare prefix lives in the working directory
fn split_root_output(root_output: &str) -> (PathBuf, String) {
    match root_output.rsplit_once('/') {
        Some(("", prefix)) => (PathBuf::from("/"), prefix.to_string()),
        Some((dir, prefix)) => (PathBuf::from(dir), prefix.to_string()),
        None => (PathBuf::from("."), root_output.to_string()),
    }
}

fn load_override(path: &Path) -> RunResult<Configuration> {
    let mut config = parse(path)?;
    for key in RESERVED_KEYS {
        if config.remove(key).is_some() {
            tracing::warn!("Ignoring reserved key {} in {}", key, path.display());
        }
    }
    Ok(config)
}
