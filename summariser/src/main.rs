#[macro_use]
extern crate log;

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;
use tape_summariser::{generate_report, ReportSettings, SweepMode};

const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build charts and a markdown summary from the statistics of a benchmark sweep.
#[derive(Debug, Parser)]
#[command(version, about)]
struct CliArgs {
    /// Directory holding the `_stats.csv` files of the sweep.
    results_dir: PathBuf,

    /// Directory that `results_dir` is relative to.
    #[arg(long, env = "RESULTS_ROOT")]
    results_root: Option<PathBuf>,

    /// Which configuration value the sweep varied.
    #[arg(long, value_enum, default_value_t)]
    sweep: SweepMode,

    /// Configuration values to report on, e.g. `--values 10,50,100`.
    /// Defaults to 10,50,100,200 files or 1,2,4,8,16 users.
    #[arg(long, value_delimiter = ',')]
    values: Vec<usize>,

    /// Host shown in the summary header.
    #[arg(long)]
    host: Option<String>,

    /// Concurrent users shown in the summary header.
    #[arg(long)]
    users: Option<usize>,

    /// Run duration in seconds shown in the summary header.
    #[arg(long)]
    duration: Option<u64>,
}

impl CliArgs {
    fn report_settings(self) -> ReportSettings {
        let results_dir = match self.results_root {
            Some(root) => root.join(self.results_dir),
            None => self.results_dir,
        };

        let mut settings = ReportSettings::new(results_dir, self.sweep).with_values(self.values);
        settings.host = self.host;
        settings.users = self.users;
        settings.duration_s = self.duration;
        settings
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::try_init()?;

    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    info!("{CRATE_NAME} {CRATE_VERSION}");
    let settings = args.report_settings();
    if !settings.results_dir.is_dir() {
        anyhow::bail!(
            "Results directory {} does not exist",
            settings.results_dir.display()
        );
    }

    let results = generate_report(&settings)?;
    info!(
        "Reported on {} of {} configurations in {}",
        results.len(),
        settings.values.len(),
        settings.results_dir.display()
    );

    Ok(())
}
