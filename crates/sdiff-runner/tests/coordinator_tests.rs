//! Step state machine driven by a scripted solver.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use sdiff_output::{MissingPolicy, ResultTable, TableError};
use sdiff_params::{parse, Configuration};
use sdiff_runner::layout::SOLVER_ROOT_KEY;
use sdiff_runner::{
    LaunchRequest, LaunchStatus, RunCoordinator, RunError, RunInputs, RunPlan, RunResult,
    RunSettings, SolverLauncher, SolverVersion, Variant,
};
use sdiff_test_utils::{write_background, write_file, write_run_ini, write_scaled_outputs};

const V1: Variant = Variant::Primary(SolverVersion::V1);
const V2: Variant = Variant::Primary(SolverVersion::V2);
const REF_V2: Variant = Variant::Reference(SolverVersion::V2);

/// What the fake solver does for one invocation
#[derive(Debug, Clone, Copy)]
enum Behavior {
    /// Background and cl outputs scaled by the factor
    Write(f64),
    /// Background output only
    BackgroundOnly,
    /// Background file with an unparsable row
    Garbage,
    /// Background file that is not UTF-8
    NotText,
    /// No output at all
    Silent,
    /// Writes outputs, then reports a timeout
    Hang,
}

type Script = dyn Fn(Variant, usize) -> Behavior + Send + Sync;

/// Launcher that writes fixture files instead of running a solver
///
/// The script receives the variant and the 1-based invocation count of
/// that variant, which equals the global attempt number.
struct FakeSolver {
    script: Box<Script>,
    calls: Mutex<Vec<(Variant, Configuration)>>,
}

impl FakeSolver {
    fn new(script: impl Fn(Variant, usize) -> Behavior + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(Variant, Configuration)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SolverLauncher for FakeSolver {
    async fn launch(&self, request: &LaunchRequest) -> RunResult<LaunchStatus> {
        let config = parse(&request.ini_path)?;
        assert_eq!(
            config.get(SOLVER_ROOT_KEY).map(PathBuf::from).as_ref(),
            Some(&request.solver_root)
        );
        let root = &request.solver_root;
        let dir = root.parent().unwrap().to_path_buf();
        let stem = root
            .file_name()
            .unwrap()
            .to_string_lossy()
            .trim_end_matches('_')
            .to_string();

        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((request.variant, config));
            calls.iter().filter(|(v, _)| *v == request.variant).count()
        };

        match (self.script)(request.variant, count) {
            Behavior::Write(factor) => write_scaled_outputs(&dir, &stem, factor),
            Behavior::BackgroundOnly => {
                write_background(&dir, &stem, &[2.0, 1.0, 0.0], &[1.0e-3, 5.0e-4, 2.0e-4]);
            }
            Behavior::Garbage => {
                write_file(
                    &dir.join(format!("{stem}_background.dat")),
                    "# 1:z  2:H [1/Mpc]\n1.0 not-a-number\n",
                );
            }
            Behavior::NotText => {
                fs::write(dir.join(format!("{stem}_background.dat")), [0xff, 0xfe, b'\n'])
                    .unwrap();
            }
            Behavior::Silent => {}
            Behavior::Hang => {
                write_scaled_outputs(&dir, &stem, 1.0);
                return Ok(LaunchStatus::TimedOut);
            }
        }
        Ok(LaunchStatus::Exited(Some(0)))
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    input: PathBuf,
}

impl Fixture {
    fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let v1 = dir.path().join("class_v1");
        let v2 = dir.path().join("class_v2");
        fs::create_dir_all(&v1).unwrap();
        fs::create_dir_all(&v2).unwrap();
        let input = write_run_ini(
            &dir.path().join("input.ini"),
            &dir.path().join("out/run_"),
            &v1,
            &v2,
            body,
        );
        Self { dir, input }
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn coordinator(
        &self,
        inputs: &RunInputs,
        settings: RunSettings,
        solver: &Arc<FakeSolver>,
    ) -> RunCoordinator {
        let plan = RunPlan::prepare(inputs, &settings.binary).unwrap();
        RunCoordinator::with_launcher(plan, settings, solver.clone()).unwrap()
    }

    fn simple(&self, settings: RunSettings, solver: &Arc<FakeSolver>) -> RunCoordinator {
        self.coordinator(&RunInputs::new(&self.input), settings, solver)
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

fn archived(out: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(out.join("needs_check"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".ini"))
        .collect();
    names.sort();
    names
}

fn seeded() -> RunSettings {
    RunSettings::default().with_seed(7)
}

#[tokio::test]
async fn accepted_steps_fill_the_table() {
    let fixture = Fixture::new("h = 0.6,0.7\nn_s = 0.96\n");
    let solver = FakeSolver::new(|variant, _| match variant {
        V2 => Behavior::Write(1.02),
        _ => Behavior::Write(1.0),
    });
    let mut coordinator = fixture.simple(seeded(), &solver);

    let summary = coordinator.run(2).await.unwrap();

    assert_eq!(summary.steps, 2);
    assert_eq!(summary.attempts, 2);
    let columns = ResultTable::read(fixture.out().join("diffs.dat")).unwrap();
    assert_eq!(
        columns.keys().collect::<Vec<_>>(),
        vec!["h", "background:H", "cl:TT", "cl:EE"]
    );
    assert!(columns["h"].iter().all(|h| (0.6..=0.7).contains(h)));
    assert!(columns["cl:TT"].iter().all(|d| approx(*d, 2.0)));
    assert!(!fixture.out().join("tmp").exists());
    assert!(fixture.out().join("run_summary.json").is_file());
    assert!(archived(&fixture.out()).is_empty());
}

#[tokio::test]
async fn both_versions_see_the_same_point() {
    let fixture = Fixture::new("h = 0.6,0.7\nomega_b = 0.02,0.025\nn_s = 0.96\n");
    let solver = FakeSolver::new(|_, _| Behavior::Write(1.0));
    let mut coordinator = fixture.simple(seeded(), &solver);

    coordinator.run(3).await.unwrap();

    let calls = solver.calls();
    assert_eq!(calls.len(), 6);
    for pair in calls.chunks(2) {
        let (v1, v2) = (&pair[0].1, &pair[1].1);
        assert_eq!(pair[0].0, V1);
        assert_eq!(pair[1].0, V2);
        assert_eq!(v1.get("h"), v2.get("h"));
        assert_eq!(v1.get("omega_b"), v2.get("omega_b"));
        assert_eq!(v1.get("n_s"), Some("0.96"));
        assert!(!v1.contains_key("root_output"));
        assert!(!v1.contains_key("root_class_v1"));
    }
    assert_ne!(calls[0].1.get("h"), calls[2].1.get("h"));
}

#[tokio::test]
async fn indexed_families_reach_the_solver_grouped() {
    let fixture = Fixture::new("w__1 = -1\nw__2 = 0.1,0.2\nmodel = wcdm\n");
    let solver = FakeSolver::new(|_, _| Behavior::Write(1.0));
    let mut coordinator = fixture.simple(seeded(), &solver);

    coordinator.run(1).await.unwrap();

    let config = &solver.calls()[0].1;
    assert!(!config.contains_key("w__1"));
    let w = config.get("w").unwrap();
    let (first, second) = w.split_once(',').unwrap();
    assert_eq!(first, "-1");
    let second: f64 = second.parse().unwrap();
    assert!((0.1..=0.2).contains(&second));

    let columns = coordinator.table().to_columns();
    assert_eq!(columns.keys().next().map(String::as_str), Some("w__2"));
}

#[tokio::test]
async fn neither_retries_with_a_fresh_sample() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let solver = FakeSolver::new(|_, attempt| {
        if attempt == 1 {
            Behavior::Silent
        } else {
            Behavior::Write(1.0)
        }
    });
    let mut coordinator = fixture.simple(seeded(), &solver);

    let summary = coordinator.run(1).await.unwrap();

    assert_eq!(summary.attempts, 2);
    assert_eq!(summary.neither, 1);
    assert!(archived(&fixture.out()).is_empty());
    let calls = solver.calls();
    assert_ne!(calls[0].1.get("h"), calls[2].1.get("h"));
}

#[tokio::test]
async fn one_only_archives_both_configurations() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let solver = FakeSolver::new(|variant, attempt| match (variant, attempt) {
        (V2, 1) => Behavior::Silent,
        _ => Behavior::Write(1.0),
    });
    let mut coordinator = fixture.simple(seeded(), &solver);

    let summary = coordinator.run(1).await.unwrap();

    assert_eq!(summary.attempts, 2);
    assert_eq!(summary.one_only.get(&SolverVersion::V1), Some(&1));
    assert_eq!(
        archived(&fixture.out()),
        vec!["step_1_attempt_1_v1.ini", "step_1_attempt_1_v2.ini"]
    );
    let reasons = fs::read_to_string(fixture.out().join("needs_check/reasons.log")).unwrap();
    assert!(reasons.contains("only v1 produced output"));
    assert_eq!(coordinator.table().len(), 1);
}

#[tokio::test]
async fn timed_out_variant_counts_as_failed() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let solver = FakeSolver::new(|variant, attempt| match (variant, attempt) {
        (V1, 1) => Behavior::Hang,
        _ => Behavior::Write(1.0),
    });
    let mut coordinator = fixture.simple(seeded(), &solver);

    let summary = coordinator.run(1).await.unwrap();

    assert_eq!(summary.one_only.get(&SolverVersion::V2), Some(&1));
    assert_eq!(summary.attempts, 2);
}

#[tokio::test]
async fn malformed_output_is_archived_and_retried() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let solver = FakeSolver::new(|variant, attempt| match (variant, attempt) {
        (V2, 1) => Behavior::Garbage,
        _ => Behavior::Write(1.0),
    });
    let mut coordinator = fixture.simple(seeded(), &solver);

    let summary = coordinator.run(1).await.unwrap();

    assert_eq!(summary.unreadable, 1);
    assert_eq!(summary.neither, 0);
    assert_eq!(archived(&fixture.out()).len(), 2);
}

#[tokio::test]
async fn non_utf8_output_is_archived_until_the_cap() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let solver = FakeSolver::new(|variant, _| match variant {
        V2 => Behavior::NotText,
        _ => Behavior::Write(1.0),
    });
    let mut coordinator = fixture.simple(seeded().with_max_attempts(3), &solver);

    let err = coordinator.run(1).await.unwrap_err();

    assert!(matches!(
        err,
        RunError::RetriesExhausted {
            step: 1,
            attempts: 3
        }
    ));
    assert_eq!(archived(&fixture.out()).len(), 6);
}

#[tokio::test]
async fn stale_scratch_files_are_not_attributed() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let solver = FakeSolver::new(|variant, attempt| match (variant, attempt) {
        (V2, 1) => Behavior::Silent,
        _ => Behavior::Write(1.0),
    });
    let mut coordinator = fixture.simple(seeded(), &solver);
    write_scaled_outputs(coordinator.layout().scratch(), "run_v2", 1.0);

    let summary = coordinator.run(1).await.unwrap();

    assert_eq!(summary.one_only.get(&SolverVersion::V1), Some(&1));
}

#[tokio::test]
async fn retry_cap_aborts_the_run() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let solver = FakeSolver::new(|_, _| Behavior::Silent);
    let mut coordinator = fixture.simple(seeded().with_max_attempts(3), &solver);

    let err = coordinator.run(1).await.unwrap_err();

    assert!(matches!(
        err,
        RunError::RetriesExhausted {
            step: 1,
            attempts: 3
        }
    ));
    assert_eq!(solver.calls().len(), 6);
    assert!(!fixture.out().join("tmp").exists());
}

#[tokio::test]
async fn reference_runs_gate_and_cancel() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let reference = write_file(&fixture.dir.path().join("ref.ini"), "model = lcdm\n");
    let inputs = RunInputs {
        ref_params_v1: Some(reference.clone()),
        ref_params_v2: Some(reference),
        ..RunInputs::new(&fixture.input)
    };
    let solver = FakeSolver::new(|variant, attempt| match (variant, attempt) {
        (REF_V2, 1) => Behavior::Silent,
        (V2 | REF_V2, _) => Behavior::Write(1.05),
        _ => Behavior::Write(1.0),
    });
    let mut coordinator = fixture.coordinator(&inputs, seeded(), &solver);

    let summary = coordinator.run(1).await.unwrap();

    assert_eq!(summary.one_only.get(&SolverVersion::V1), Some(&1));
    assert_eq!(archived(&fixture.out()).len(), 4);
    let columns = coordinator.table().to_columns();
    assert_eq!(columns["background:H"], vec![0.0]);
    assert_eq!(columns["cl:EE"], vec![0.0]);

    let calls = solver.calls();
    let reference_config = &calls.iter().find(|(v, _)| *v == REF_V2).unwrap().1;
    assert_eq!(reference_config.get("model"), Some("lcdm"));
}

#[tokio::test]
async fn lost_column_is_fatal_by_default() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let solver = FakeSolver::new(|_, attempt| {
        if attempt == 1 {
            Behavior::Write(1.0)
        } else {
            Behavior::BackgroundOnly
        }
    });
    let mut coordinator = fixture.simple(seeded(), &solver);

    let err = coordinator.run(2).await.unwrap_err();

    assert!(matches!(err, RunError::Table(TableError::SchemaMismatch { .. })));
    let columns = ResultTable::read(fixture.out().join("diffs.dat")).unwrap();
    assert_eq!(columns["h"].len(), 1);
}

#[tokio::test]
async fn lost_column_can_be_filled() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let solver = FakeSolver::new(|_, attempt| {
        if attempt == 1 {
            Behavior::Write(1.0)
        } else {
            Behavior::BackgroundOnly
        }
    });
    let settings = seeded().with_missing_policy(MissingPolicy::Fill(-1.0));
    let mut coordinator = fixture.simple(settings, &solver);

    coordinator.run(2).await.unwrap();

    let columns = coordinator.table().to_columns();
    assert_eq!(columns["cl:TT"][1], -1.0);
}

#[tokio::test]
async fn plots_follow_the_table() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let solver = FakeSolver::new(|variant, _| match variant {
        V2 => Behavior::Write(1.01),
        _ => Behavior::Write(1.0),
    });
    let mut coordinator = fixture.simple(seeded().with_plots(true), &solver);

    let summary = coordinator.run(2).await.unwrap();

    // three diff columns, each against step and h
    assert_eq!(summary.plots, 6);
    assert!(fixture.out().join("plots/cl_TT_vs_h.svg").is_file());
}

#[tokio::test]
async fn missing_solver_binary_is_fatal() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let plan = RunPlan::prepare(&RunInputs::new(&fixture.input), "class").unwrap();
    let mut coordinator = RunCoordinator::new(plan, seeded()).unwrap();

    let err = coordinator.run(1).await.unwrap_err();

    assert!(matches!(err, RunError::Spawn { .. }));
}

#[tokio::test]
async fn configuration_artifacts_live_at_fixed_paths() {
    let fixture = Fixture::new("h = 0.6,0.7\n");
    let solver = FakeSolver::new(|_, _| Behavior::Write(1.0));
    let mut coordinator = fixture.simple(seeded(), &solver);

    coordinator.run(2).await.unwrap();

    let v1_ini = fixture.out().join("ini/v1.ini");
    let written = parse(&v1_ini).unwrap();
    assert_eq!(written, solver.calls()[2].1);
    assert_eq!(
        written.get(SOLVER_ROOT_KEY).map(PathBuf::from),
        Some(fixture.out().join("tmp/run_v1_"))
    );
}
