use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use sdiff_output::{Catalog, MissingPolicy, ResultTable};
use sdiff_runner::{plot, RunCoordinator, RunInputs, RunPlan, RunSettings, DEFAULT_BINARY};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("sdiff")
        .version(sdiff_runner::VERSION)
        .about("Randomized regression comparison between two solver builds")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log debug messages"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Sample parameters, run both versions and diff their outputs")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Common parameter file"),
                )
                .arg(path_arg("params-v1", "Parameter overrides for v1"))
                .arg(path_arg("params-v2", "Parameter overrides for v2"))
                .arg(path_arg("ref-params-v1", "Reference-model parameters for v1"))
                .arg(path_arg("ref-params-v2", "Reference-model parameters for v2"))
                .arg(
                    Arg::new("steps")
                        .short('N')
                        .default_value("1")
                        .value_parser(value_parser!(usize))
                        .help("Number of accepted steps"),
                )
                .arg(
                    Arg::new("want-plots")
                        .long("want-plots")
                        .action(ArgAction::SetTrue)
                        .help("Render plots once the run completes"),
                )
                .arg(path_arg("catalog", "TOML file declaring categories and variables"))
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("timeout-secs")
                        .long("timeout-secs")
                        .value_parser(value_parser!(u64))
                        .help("Kill a solver invocation after this many seconds"),
                )
                .arg(
                    Arg::new("max-attempts")
                        .long("max-attempts")
                        .value_parser(value_parser!(usize))
                        .help("Abort when one step fails this many attempts"),
                )
                .arg(
                    Arg::new("binary")
                        .long("binary")
                        .default_value(DEFAULT_BINARY)
                        .help("Solver executable inside each install directory"),
                )
                .arg(
                    Arg::new("fill-missing")
                        .long("fill-missing")
                        .value_parser(value_parser!(f64))
                        .allow_negative_numbers(true)
                        .help("Store this value when a row lacks a column instead of failing"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Render plots from an existing output directory")
                .arg(
                    Arg::new("output-dir")
                        .short('o')
                        .long("output-dir")
                        .default_value("output")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory holding diffs.dat"),
                ),
        )
}

fn path_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

fn init_tracing(matches: &ArgMatches) {
    let default_level = if matches.get_flag("verbose") { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if matches.get_flag("log-json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: &ArgMatches) -> anyhow::Result<()> {
    let inputs = RunInputs {
        input: args
            .get_one::<PathBuf>("input")
            .cloned()
            .context("missing input file")?,
        params_v1: args.get_one::<PathBuf>("params-v1").cloned(),
        params_v2: args.get_one::<PathBuf>("params-v2").cloned(),
        ref_params_v1: args.get_one::<PathBuf>("ref-params-v1").cloned(),
        ref_params_v2: args.get_one::<PathBuf>("ref-params-v2").cloned(),
    };
    let steps = args.get_one::<usize>("steps").copied().unwrap_or(1);

    let mut settings = RunSettings::default()
        .with_plots(args.get_flag("want-plots"))
        .with_binary(
            args.get_one::<String>("binary")
                .map_or(DEFAULT_BINARY, String::as_str),
        );
    if let Some(path) = args.get_one::<PathBuf>("catalog") {
        let catalog = Catalog::load(path)
            .with_context(|| format!("loading catalog {}", path.display()))?;
        settings = settings.with_catalog(catalog);
    }
    if let Some(seed) = args.get_one::<u64>("seed") {
        settings = settings.with_seed(*seed);
    }
    if let Some(secs) = args.get_one::<u64>("timeout-secs") {
        settings = settings.with_timeout(Duration::from_secs(*secs));
    }
    if let Some(max) = args.get_one::<usize>("max-attempts") {
        settings = settings.with_max_attempts(*max);
    }
    if let Some(value) = args.get_one::<f64>("fill-missing") {
        settings = settings.with_missing_policy(MissingPolicy::Fill(*value));
    }

    let plan = RunPlan::prepare(&inputs, &settings.binary)
        .with_context(|| format!("preparing run from {}", inputs.input.display()))?;
    let mut coordinator = RunCoordinator::new(plan, settings)?;
    let summary = coordinator.run(steps).await?;

    tracing::info!(
        "Results in {} ({} steps, {} attempts)",
        coordinator.layout().table_path().display(),
        summary.steps,
        summary.attempts
    );
    Ok(())
}

fn info(args: &ArgMatches) -> anyhow::Result<()> {
    let dir = args
        .get_one::<PathBuf>("output-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("output"));
    let table_path = dir.join("diffs.dat");
    let columns = ResultTable::read(&table_path)
        .with_context(|| format!("reading {}", table_path.display()))?;
    let plots = plot::render_all(&columns, &dir.join("plots"))?;
    tracing::info!("Wrote {} plots", plots.len());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(&matches);

    match matches.subcommand() {
        Some(("run", args)) => run(args).await,
        Some(("info", args)) => info(args),
        _ => unreachable!("subcommand is required"),
    }
}
