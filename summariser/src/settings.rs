use std::path::{Path, PathBuf};

use tape_tunnel_summary_model::{load_summary_runs, RunSummary};

/// Name of the run summary file that scenario runs append to inside a results directory.
pub const RUN_SUMMARY_FILE: &str = "run_summary.jsonl";

pub const DEFAULT_HOST: &str = "http://localhost:8080";
pub const DEFAULT_USERS: usize = 1;
pub const DEFAULT_DURATION_S: u64 = 10;

/// The configuration value that changes between the runs of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SweepMode {
    /// Number of files in each stage request.
    #[default]
    Files,
    /// Number of concurrent virtual users.
    Users,
}

impl SweepMode {
    pub fn default_values(&self) -> Vec<usize> {
        match self {
            SweepMode::Files => vec![10, 50, 100, 200],
            SweepMode::Users => vec![1, 2, 4, 8, 16],
        }
    }

    /// The file name prefix of the run for configuration value `n`, e.g. `test_50_files`.
    pub fn prefix(&self, n: usize) -> String {
        match self {
            SweepMode::Files => format!("test_{n}_files"),
            SweepMode::Users => format!("test_{n}users"),
        }
    }

    pub fn stats_file_name(&self, n: usize) -> String {
        format!("{}_stats.csv", self.prefix(n))
    }

    pub fn cpu_file_name(&self, n: usize) -> String {
        format!("{}_cpu.csv", self.prefix(n))
    }

    /// Axis and column label for the configuration value.
    pub fn label(&self) -> &'static str {
        match self {
            SweepMode::Files => "Files per request",
            SweepMode::Users => "Users",
        }
    }
}

/// What to report on and how to describe it.
///
/// `host`, `users` and `duration_s` fill the summary header. Anything left unset is taken from
/// the run summary file in `results_dir` and then from the defaults.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub results_dir: PathBuf,
    pub sweep: SweepMode,
    pub values: Vec<usize>,
    pub host: Option<String>,
    pub users: Option<usize>,
    pub duration_s: Option<u64>,
}

impl ReportSettings {
    pub fn new(results_dir: impl Into<PathBuf>, sweep: SweepMode) -> Self {
        Self {
            results_dir: results_dir.into(),
            sweep,
            values: sweep.default_values(),
            host: None,
            users: None,
            duration_s: None,
        }
    }

    pub fn with_values(mut self, values: Vec<usize>) -> Self {
        if !values.is_empty() {
            self.values = values;
        }
        self
    }

    pub fn stats_path(&self, n: usize) -> PathBuf {
        self.results_dir.join(self.sweep.stats_file_name(n))
    }

    pub fn cpu_path(&self, n: usize) -> PathBuf {
        self.results_dir.join(self.sweep.cpu_file_name(n))
    }

    pub fn header(&self) -> ReportHeader {
        let recorded = first_recorded_run(&self.results_dir.join(RUN_SUMMARY_FILE));

        ReportHeader {
            sweep: self.sweep,
            host: self
                .host
                .clone()
                .or_else(|| recorded.as_ref().map(|r| r.connection_string.clone()))
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            users: self
                .users
                .or_else(|| recorded.as_ref().map(|r| r.agent_count))
                .unwrap_or(DEFAULT_USERS),
            duration_s: self
                .duration_s
                .or_else(|| recorded.as_ref().and_then(|r| r.run_duration))
                .unwrap_or(DEFAULT_DURATION_S),
        }
    }
}

/// The settings a sweep was run with, as shown at the top of the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHeader {
    pub sweep: SweepMode,
    pub host: String,
    pub users: usize,
    pub duration_s: u64,
}

fn first_recorded_run(path: &Path) -> Option<RunSummary> {
    if !path.exists() {
        return None;
    }

    match load_summary_runs(path) {
        Ok(runs) => runs.into_iter().next(),
        Err(e) => {
            log::warn!("Ignoring unreadable run summary {}: {e:?}", path.display());
            None
        }
    }
}
