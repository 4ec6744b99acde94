//! Step state machine
//!
//! Each step loops `Sampling → Executing → {Retry, Archived, Done}` until
//! both versions produce output for the same sampled point:
//!
//! - `Sampling` drains the scratch directory, draws one sample and writes
//!   every variant's configuration to its fixed path.
//! - `Executing` runs every variant and looks for its output files.
//! - `Retry` follows an attempt where neither version produced output.
//! - `Archived` follows an attempt where only one version produced output,
//!   or where outputs could not be diffed; the configurations are copied to
//!   `needs_check/` before retrying.
//! - `Done` appends the row and rewrites the result table.
//!
//! Every retry draws a fresh sample. Without a retry cap a configuration
//! that never succeeds keeps the step looping until the process is stopped.

use std::fmt;
use std::fs;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sdiff_output::{
    DiffEngine, DiffRecord, OutputReader, OutputTable, ReferenceTables, ResultTable,
};
use sdiff_params::{group_families, Sample, Sampler};
use serde::Serialize;

use crate::error::{RunError, RunResult};
use crate::launcher::{LaunchRequest, LaunchStatus, ProcessLauncher, SolverLauncher};
use crate::layout::{RunLayout, SOLVER_ROOT_KEY};
use crate::outcome::{has_output, RunOutcome};
use crate::plot;
use crate::settings::RunSettings;
use crate::variant::{RunPlan, SolverVersion, Variant};

/// State of the current step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Drawing a sample and writing configurations
    Sampling,
    /// Running the solver variants
    Executing,
    /// No version produced output
    Retry,
    /// Configurations were kept for a manual check
    Archived,
    /// Row accepted
    Done,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sampling => "SAMPLING",
            Self::Executing => "EXECUTING",
            Self::Retry => "RETRY",
            Self::Archived => "ARCHIVED",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Counters of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
    /// Accepted steps
    pub steps: usize,
    /// Attempts over all steps
    pub attempts: usize,
    /// Attempts without output from either version
    pub neither: usize,
    /// Attempts with output from one version only, by the version that succeeded
    pub one_only: IndexMap<SolverVersion, usize>,
    /// Attempts whose outputs could not be diffed
    pub unreadable: usize,
    /// Plot files written
    pub plots: usize,
}

/// Result of one attempt
enum Attempt {
    Accepted(DiffRecord),
    Rejected(StepState),
}

/// Drives a run step by step
pub struct RunCoordinator {
    plan: RunPlan,
    settings: RunSettings,
    layout: RunLayout,
    launcher: Arc<dyn SolverLauncher>,
    sampler: Sampler,
    reader: OutputReader,
    engine: DiffEngine,
    table: ResultTable,
    summary: RunSummary,
}

impl RunCoordinator {
    /// Create coordinator launching solver processes
    ///
    /// # Errors
    /// Returns `RunError::Io` if the run layout cannot be created
    pub fn new(plan: RunPlan, settings: RunSettings) -> RunResult<Self> {
        Self::with_launcher(plan, settings, Arc::new(ProcessLauncher))
    }

    /// Create with custom launcher
    ///
    /// # Errors
    /// Returns `RunError::Io` if the run layout cannot be created
    pub fn with_launcher(
        plan: RunPlan,
        settings: RunSettings,
        launcher: Arc<dyn SolverLauncher>,
    ) -> RunResult<Self> {
        let layout = RunLayout::create(&plan.output_dir)?;
        let sampler = match settings.seed {
            Some(seed) => Sampler::seeded(seed),
            None => Sampler::from_entropy(),
        };
        let now = Utc::now();
        Ok(Self {
            reader: OutputReader::new(settings.catalog.clone()),
            engine: DiffEngine::new(settings.catalog.clone()),
            table: ResultTable::new().with_missing_policy(settings.missing),
            summary: RunSummary {
                started_at: now,
                finished_at: now,
                steps: 0,
                attempts: 0,
                neither: 0,
                one_only: IndexMap::new(),
                unreadable: 0,
                plots: 0,
            },
            plan,
            settings,
            layout,
            launcher,
            sampler,
        })
    }

    /// Folder layout of the run
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Rows accepted so far
    #[inline]
    #[must_use]
    pub fn table(&self) -> &ResultTable {
        &self.table
    }

    /// Run `steps` steps, then clean up
    ///
    /// The result table is rewritten after every accepted step, so an
    /// interrupted run keeps every completed row. The scratch directory is
    /// removed whether or not the run succeeds.
    ///
    /// # Errors
    /// Returns the first fatal `RunError`
    pub async fn run(&mut self, steps: usize) -> RunResult<RunSummary> {
        tracing::info!(
            "Starting {} steps, {} varying parameters, output in {}",
            steps,
            self.plan.varying.len(),
            self.layout.root().display()
        );
        let result = self.run_steps(steps).await;
        self.layout.cleanup();
        result?;

        if self.settings.want_plots && !self.table.is_empty() {
            let plots = plot::render_all(&self.table.to_columns(), &self.layout.plots_dir())?;
            self.summary.plots = plots.len();
        }

        self.summary.finished_at = Utc::now();
        let summary_path = self.layout.summary_path();
        let json = serde_json::to_string_pretty(&self.summary)?;
        fs::write(&summary_path, json).map_err(|e| RunError::io_error(&summary_path, e))?;

        tracing::info!(
            "Finished {} steps in {} attempts",
            self.summary.steps,
            self.summary.attempts
        );
        Ok(self.summary.clone())
    }

    async fn run_steps(&mut self, steps: usize) -> RunResult<()> {
        for step in 1..=steps {
            let record = self.run_step(step).await?;
            self.table.append(record)?;
            self.table.write(self.layout.table_path())?;
            self.summary.steps += 1;
            tracing::info!("Step {}/{} [{}]", step, steps, StepState::Done);
        }
        Ok(())
    }

    /// Retry one step until both versions produce comparable output
    ///
    /// # Errors
    /// - `RunError::RetriesExhausted` if the retry cap is reached
    /// - any fatal `RunError` of an attempt
    pub async fn run_step(&mut self, step: usize) -> RunResult<DiffRecord> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.summary.attempts += 1;
            match self.attempt(step, attempt).await? {
                Attempt::Accepted(record) => return Ok(record),
                Attempt::Rejected(state) => {
                    tracing::debug!("Step {} attempt {} [{}]", step, attempt, state);
                    if self.settings.max_attempts.is_some_and(|max| attempt >= max) {
                        return Err(RunError::RetriesExhausted {
                            step,
                            attempts: attempt,
                        });
                    }
                }
            }
        }
    }

    async fn attempt(&mut self, step: usize, attempt: usize) -> RunResult<Attempt> {
        tracing::debug!("Step {} attempt {} [{}]", step, attempt, StepState::Sampling);
        self.layout.drain_scratch()?;
        let sample = self.sampler.sample(&self.plan.varying)?;
        self.write_configurations(&sample)?;

        tracing::debug!("Step {} attempt {} [{}]", step, attempt, StepState::Executing);
        let produced = self.execute().await?;

        let succeeded = |version: SolverVersion| {
            produced
                .iter()
                .filter(|(variant, _)| variant.version() == version)
                .all(|(_, ok)| *ok)
        };
        let outcome = RunOutcome::from_flags(succeeded(SolverVersion::V1), succeeded(SolverVersion::V2));

        match outcome {
            RunOutcome::Neither => {
                self.summary.neither += 1;
                tracing::warn!("Step {} attempt {}: no version produced output", step, attempt);
                self.layout.drain_scratch()?;
                Ok(Attempt::Rejected(StepState::Retry))
            }
            RunOutcome::OneOnly(version) => {
                *self.summary.one_only.entry(version).or_insert(0) += 1;
                tracing::warn!(
                    "Step {} attempt {}: only {} produced output",
                    step,
                    attempt,
                    version
                );
                self.layout.drain_scratch()?;
                self.archive_all(step, attempt, &format!("only {version} produced output"))?;
                Ok(Attempt::Rejected(StepState::Archived))
            }
            RunOutcome::Both => match self.compare() {
                Ok(diffs) => {
                    self.layout.drain_scratch()?;
                    Ok(Attempt::Accepted(DiffRecord {
                        inputs: sample.iter().map(|(k, v)| (k.to_string(), v)).collect(),
                        diffs,
                    }))
                }
                Err(e) if e.is_recoverable() => {
                    self.summary.unreadable += 1;
                    tracing::error!(
                        "Step {} attempt {}: outputs present but not comparable: {}",
                        step,
                        attempt,
                        e
                    );
                    self.layout.drain_scratch()?;
                    self.archive_all(step, attempt, &e.to_string())?;
                    Ok(Attempt::Rejected(StepState::Archived))
                }
                Err(e) => Err(e),
            },
        }
    }

    fn write_configurations(&self, sample: &Sample) -> RunResult<()> {
        for setup in &self.plan.variants {
            let mut config = group_families(&sample.resolve(&setup.fixed, &setup.varying))?;
            config.insert(
                SOLVER_ROOT_KEY,
                self.layout.solver_root(&setup.stem).display().to_string(),
            );
            self.layout.write_ini(setup.variant, &config)?;
        }
        Ok(())
    }

    async fn execute(&self) -> RunResult<Vec<(Variant, bool)>> {
        let mut produced = Vec::with_capacity(self.plan.variants.len());
        for setup in &self.plan.variants {
            let request = LaunchRequest {
                variant: setup.variant,
                program: setup.program.clone(),
                ini_path: self.layout.ini_path(setup.variant),
                solver_root: self.layout.solver_root(&setup.stem),
                timeout: self.settings.timeout,
            };
            let output = match self.launcher.launch(&request).await? {
                LaunchStatus::TimedOut => false,
                LaunchStatus::Exited(code) => {
                    let output = has_output(self.layout.scratch(), &setup.stem)?;
                    if !output {
                        tracing::info!("{} left no output (exit code {:?})", setup.variant, code);
                    }
                    output
                }
            };
            produced.push((setup.variant, output));
        }
        Ok(produced)
    }

    fn compare(&self) -> RunResult<sdiff_output::DiffSet> {
        let read = |variant: Variant| -> RunResult<OutputTable> {
            let setup = self
                .plan
                .variant(variant)
                .ok_or_else(|| RunError::Config(format!("{variant} is not part of the run")))?;
            Ok(self.reader.read(self.layout.scratch(), &setup.stem)?)
        };

        let v1 = read(Variant::Primary(SolverVersion::V1))?;
        let v2 = read(Variant::Primary(SolverVersion::V2))?;
        let diffs = if self.plan.has_reference() {
            let ref_v1 = read(Variant::Reference(SolverVersion::V1))?;
            let ref_v2 = read(Variant::Reference(SolverVersion::V2))?;
            let reference = ReferenceTables {
                v1: &ref_v1,
                v2: &ref_v2,
            };
            self.engine.compare(&v1, &v2, Some(reference))?
        } else {
            self.engine.compare(&v1, &v2, None)?
        };

        if diffs.is_empty() {
            return Err(RunError::NothingCompared);
        }
        Ok(diffs)
    }

    fn archive_all(&self, step: usize, attempt: usize, reason: &str) -> RunResult<()> {
        for setup in &self.plan.variants {
            self.layout.archive(step, attempt, setup.variant, reason)?;
        }
        Ok(())
    }
}
