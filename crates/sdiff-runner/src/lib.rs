//! sdiff Runner
//!
//! Orchestrates a randomized regression comparison between two builds of
//! an external solver.
//!
//! # Architecture
//!
//! ```text
//! RunPlan ──► RunCoordinator ──► SolverLauncher ──► scratch files
//!                  │                                    │
//!                  ▼                                    ▼
//!             ResultTable ◄────── DiffEngine ◄──── OutputReader
//!                  │
//!                  ▼
//!               plots
//! ```
//!
//! - [`RunPlan`]: parameter files resolved into one setup per [`Variant`]
//! - [`RunCoordinator`]: per-step retry loop, archival and table updates
//! - [`SolverLauncher`]: invocation seam, [`ProcessLauncher`] by default
//! - [`RunOutcome`]: which versions produced output in an attempt

#![warn(missing_docs)]

pub mod coordinator;
pub mod error;
pub mod launcher;
pub mod layout;
pub mod outcome;
pub mod plot;
pub mod settings;
pub mod variant;

// Re-exports
pub use coordinator::{RunCoordinator, RunSummary, StepState};
pub use error::{RunError, RunResult};
pub use launcher::{LaunchRequest, LaunchStatus, ProcessLauncher, SolverLauncher};
pub use layout::RunLayout;
pub use outcome::{has_output, RunOutcome};
pub use settings::{RunInputs, RunSettings, DEFAULT_BINARY};
pub use variant::{RunPlan, SolverVersion, Variant, VariantSetup};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
