//! Folder layout of a run
//!
//! ```text
//! <dir>/
//!   tmp/            scratch directory shared by every solver invocation
//!   ini/<tag>.ini   configuration of the current attempt, one per variant
//!   needs_check/    configurations of attempts that need a manual look
//!   plots/          scatter plots
//!   diffs.dat       result table
//! ```

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};

use sdiff_params::{serialize, Configuration};

use crate::error::{RunError, RunResult};
use crate::variant::Variant;

/// Key through which the solver learns where to write its outputs
pub const SOLVER_ROOT_KEY: &str = "root";

/// Paths of one run
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
    scratch: PathBuf,
    ini: PathBuf,
    needs_check: PathBuf,
}

impl RunLayout {
    /// Create the run directories under `root`
    ///
    /// # Errors
    /// Returns `RunError::Io` if a directory cannot be created
    pub fn create(root: impl Into<PathBuf>) -> RunResult<Self> {
        let root = root.into();
        let layout = Self {
            scratch: root.join("tmp"),
            ini: root.join("ini"),
            needs_check: root.join("needs_check"),
            root,
        };
        for dir in [&layout.root, &layout.scratch, &layout.ini, &layout.needs_check] {
            fs::create_dir_all(dir).map_err(|e| RunError::io_error(dir, e))?;
        }
        tracing::debug!("Run layout ready under {}", layout.root.display());
        Ok(layout)
    }

    /// Run directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch directory
    #[inline]
    #[must_use]
    pub fn scratch(&self) -> &Path {
        &self.scratch
    }

    /// Directory of archived configurations
    #[inline]
    #[must_use]
    pub fn needs_check(&self) -> &Path {
        &self.needs_check
    }

    /// Result table file
    #[must_use]
    pub fn table_path(&self) -> PathBuf {
        self.root.join("diffs.dat")
    }

    /// Run summary file
    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.root.join("run_summary.json")
    }

    /// Plot directory, not created until plots are drawn
    #[must_use]
    pub fn plots_dir(&self) -> PathBuf {
        self.root.join("plots")
    }

    /// Output root handed to the solver: `<scratch>/<stem>_`
    #[must_use]
    pub fn solver_root(&self, stem: &str) -> PathBuf {
        self.scratch.join(format!("{stem}_"))
    }

    /// Fixed configuration path of a variant
    #[must_use]
    pub fn ini_path(&self, variant: Variant) -> PathBuf {
        self.ini.join(format!("{}.ini", variant.tag()))
    }

    /// Write the configuration of a variant, replacing the previous attempt's
    ///
    /// # Errors
    /// Returns `RunError::Params` if the file cannot be written
    pub fn write_ini(&self, variant: Variant, config: &Configuration) -> RunResult<PathBuf> {
        let path = self.ini_path(variant);
        serialize(config, &path)?;
        Ok(path)
    }

    /// Remove every entry of the scratch directory
    ///
    /// # Errors
    /// Returns `RunError::Io` if an entry cannot be removed
    pub fn drain_scratch(&self) -> RunResult<usize> {
        let entries = match fs::read_dir(&self.scratch) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&self.scratch)
                    .map_err(|e| RunError::io_error(&self.scratch, e))?;
                return Ok(0);
            }
            Err(e) => return Err(RunError::io_error(&self.scratch, e)),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| RunError::io_error(&self.scratch, e))?.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(RunError::io_error(&path, e)),
            }
        }
        if removed > 0 {
            tracing::debug!("Drained {} entries from {}", removed, self.scratch.display());
        }
        Ok(removed)
    }

    /// Copy the configuration of a variant to the manual-check directory
    ///
    /// Appends `reason` to `needs_check/reasons.log`.
    ///
    /// # Errors
    /// Returns `RunError::Io` if the copy or the log write fails
    pub fn archive(
        &self,
        step: usize,
        attempt: usize,
        variant: Variant,
        reason: &str,
    ) -> RunResult<PathBuf> {
        let source = self.ini_path(variant);
        let target = self
            .needs_check
            .join(format!("step_{step}_attempt_{attempt}_{}.ini", variant.tag()));
        fs::copy(&source, &target).map_err(|e| RunError::io_error(&source, e))?;

        let log = self.needs_check.join("reasons.log");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log)
            .map_err(|e| RunError::io_error(&log, e))?;
        writeln!(
            file,
            "{} step {step} attempt {attempt} {}: {reason}",
            chrono::Utc::now().to_rfc3339(),
            variant.tag()
        )
        .map_err(|e| RunError::io_error(&log, e))?;

        tracing::info!("Archived {} for manual check", target.display());
        Ok(target)
    }

    /// Remove the scratch directory, tolerating its absence
    pub fn cleanup(&self) {
        match fs::remove_dir_all(&self.scratch) {
            Ok(()) => tracing::debug!("Removed {}", self.scratch.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Cannot remove {}: {}", self.scratch.display(), e),
        }
    }
}
