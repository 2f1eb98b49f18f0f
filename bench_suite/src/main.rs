#[macro_use]
extern crate log;

use anyhow::Context;
use clap::Parser as _;
use tape_bench_suite::cli::CliArgs;
use tape_bench_suite::{locate_scenario, BenchmarkSuite, RunOutcome, SuiteConfig};
use tape_summariser::{generate_report, ReportSettings};

const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    env_logger::try_init()?;

    let args = CliArgs::try_parse()?;
    info!("{CRATE_NAME} {CRATE_VERSION}");

    let scenario = locate_scenario(&args.scenario)?;
    info!("Using scenario binary: {}", scenario.display());

    let out_dir = args
        .results_root
        .join(args.sweep.dir_name(chrono::Local::now()));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    info!("Writing results to {}", out_dir.display());

    let mode = args.sweep.mode();
    let points = args.sweep.points();
    let suite = BenchmarkSuite::new(
        SuiteConfig {
            scenario,
            host: args.host.clone(),
            spawn_rate: args.spawn_rate,
            duration_s: args.duration,
            process_name: args.process_name.clone(),
        },
        mode,
        &out_dir,
    );

    let outcomes = suite.run(&points);
    let completed = outcomes
        .iter()
        .filter(|(_, outcome)| matches!(outcome, RunOutcome::Completed))
        .count();
    info!("{completed} of {} runs completed", outcomes.len());

    if args.no_report {
        return Ok(());
    }

    let mut settings = ReportSettings::new(&out_dir, mode)
        .with_values(points.iter().map(|p| p.value).collect());
    settings.host = Some(args.host);
    settings.users = args.sweep.fixed_users();
    settings.duration_s = Some(args.duration);
    generate_report(&settings)?;

    Ok(())
}
