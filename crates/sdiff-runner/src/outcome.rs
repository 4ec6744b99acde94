//! Outcome of one attempt
//!
//! A variant produced output when the scratch directory holds at least one
//! file named `<stem>_*`. The exit status of the solver plays no part.

use std::fs;
use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};

use crate::error::{RunError, RunResult};
use crate::variant::SolverVersion;

/// Which versions produced output in one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Both versions produced output; the step can be diffed
    Both,
    /// Only the given version produced output
    OneOnly(SolverVersion),
    /// No version produced output
    Neither,
}

impl RunOutcome {
    /// Classify from per-version success flags
    #[must_use]
    pub const fn from_flags(v1: bool, v2: bool) -> Self {
        match (v1, v2) {
            (true, true) => Self::Both,
            (true, false) => Self::OneOnly(SolverVersion::V1),
            (false, true) => Self::OneOnly(SolverVersion::V2),
            (false, false) => Self::Neither,
        }
    }

    /// Number of versions that produced output
    #[must_use]
    pub const fn succeeded(self) -> usize {
        match self {
            Self::Both => 2,
            Self::OneOnly(_) => 1,
            Self::Neither => 0,
        }
    }
}

/// Matcher for the output files of one stem
///
/// # Errors
/// Returns `RunError::Pattern` if the pattern cannot be compiled
pub fn output_matcher(stem: &str) -> RunResult<GlobMatcher> {
    let pattern = format!("{}_*", escape_glob(stem));
    let glob = GlobBuilder::new(&pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map_err(|source| RunError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
    Ok(glob.compile_matcher())
}

/// Check if `scratch` holds any output file of `stem`
///
/// # Errors
/// Returns `RunError::Io` if the directory cannot be listed
pub fn has_output(scratch: &Path, stem: &str) -> RunResult<bool> {
    let matcher = output_matcher(stem)?;
    let entries = fs::read_dir(scratch).map_err(|e| RunError::io_error(scratch, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RunError::io_error(scratch, e))?;
        if matcher.is_match(entry.file_name()) {
            return Ok(true);
        }
    }
    Ok(false)
}

// File prefixes come from user input and may contain glob syntax
fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '{' | '}' | '\\' | '!') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
