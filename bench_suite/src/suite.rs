use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output};

use anyhow::Context;
use tape_summariser::settings::RUN_SUMMARY_FILE;
use tape_summariser::SweepMode;

use crate::monitor::ProcessMonitor;

/// Read by the scenario for the number of files in each stage request.
pub const FILES_PER_REQUEST_ENV: &str = "STORM_FILES_PER_REQ";
/// Read by the scenario for the file to append its run summary to.
pub const RUN_SUMMARY_PATH_ENV: &str = "RUN_SUMMARY_PATH";

/// One run of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPoint {
    /// The value that varies across the sweep, used to name the run's files.
    pub value: usize,
    pub users: usize,
    pub files_per_request: usize,
}

#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub scenario: PathBuf,
    pub host: String,
    pub spawn_rate: f64,
    pub duration_s: u64,
    pub process_name: String,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    /// The scenario exited with an error, its output is in the run's `.log` file.
    Failed(ExitStatus),
    /// The scenario could not be started.
    NotStarted,
}

/// Runs a scenario once per [RunPoint], writing every run's files into one output directory.
pub struct BenchmarkSuite {
    config: SuiteConfig,
    sweep: SweepMode,
    out_dir: PathBuf,
}

impl BenchmarkSuite {
    pub fn new(config: SuiteConfig, sweep: SweepMode, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            sweep,
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Run every point in turn. A failed run is logged and the sweep carries on.
    pub fn run(&self, points: &[RunPoint]) -> Vec<(RunPoint, RunOutcome)> {
        points
            .iter()
            .map(|point| (*point, self.run_point(point)))
            .collect()
    }

    fn run_point(&self, point: &RunPoint) -> RunOutcome {
        let prefix = self.out_dir.join(self.sweep.prefix(point.value));
        log::info!(
            "Running {} with {} users and {} files per request",
            self.config.scenario.display(),
            point.users,
            point.files_per_request
        );

        let monitor = match ProcessMonitor::start(
            &self.config.process_name,
            self.out_dir.join(self.sweep.cpu_file_name(point.value)),
        ) {
            Ok(monitor) => Some(monitor),
            Err(e) => {
                log::warn!("Running without a process monitor: {e:?}");
                None
            }
        };

        let output = self.scenario_command(point, &prefix).output();

        if let Some(monitor) = monitor {
            match monitor.stop() {
                Ok(samples) => log::debug!("Took {samples} resource samples"),
                Err(e) => log::warn!("Process monitor failed: {e:?}"),
            }
        }

        match output {
            Ok(output) if output.status.success() => {
                log::info!("Finished run {}", prefix.display());
                RunOutcome::Completed
            }
            Ok(output) => {
                let log_path = prefix.with_extension("log");
                log::warn!(
                    "Run {} failed with {}, see {}",
                    prefix.display(),
                    output.status,
                    log_path.display()
                );
                if let Err(e) = write_run_log(&log_path, &output) {
                    log::error!("{e:?}");
                }
                RunOutcome::Failed(output.status)
            }
            Err(e) => {
                log::error!(
                    "Failed to start {}: {e}",
                    self.config.scenario.display()
                );
                RunOutcome::NotStarted
            }
        }
    }

    fn scenario_command(&self, point: &RunPoint, prefix: &Path) -> Command {
        let mut command = Command::new(&self.config.scenario);
        command
            .arg("--connection-string")
            .arg(&self.config.host)
            .arg("--agents")
            .arg(point.users.to_string())
            .arg("--spawn-rate")
            .arg(self.config.spawn_rate.to_string())
            .arg("--duration")
            .arg(self.config.duration_s.to_string())
            .arg("--no-progress")
            .arg("--csv")
            .arg(prefix)
            .env(FILES_PER_REQUEST_ENV, point.files_per_request.to_string())
            .env(RUN_SUMMARY_PATH_ENV, self.out_dir.join(RUN_SUMMARY_FILE));
        command
    }
}

/// Find the scenario binary. A path is used as it is, a bare name is looked up on the `PATH`.
pub fn locate_scenario(scenario: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(scenario);
    if path.components().count() > 1 {
        if !path.exists() {
            anyhow::bail!("Scenario binary not found at {}", path.display());
        }
        return Ok(path.to_path_buf());
    }

    which::which(scenario).with_context(|| {
        format!("Could not find `{scenario}` on the PATH, build it with `cargo build --release -p {scenario}`")
    })
}

fn write_run_log(path: &Path, output: &Output) -> anyhow::Result<()> {
    let mut content = output.stdout.clone();
    content.push(b'\n');
    content.extend_from_slice(&output.stderr);
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
