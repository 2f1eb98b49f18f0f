use std::path::PathBuf;

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use tape_summariser::SweepMode;

use crate::suite::RunPoint;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub sweep: Sweep,

    /// Scenario binary to run, either a path or a name to look up on the `PATH`.
    #[clap(long, global = true, default_value = "stage_and_status")]
    pub scenario: String,

    /// Base URL of the tape service under test.
    #[clap(long, global = true, default_value = "http://localhost:8080")]
    pub host: String,

    /// Users started per second by each run.
    #[clap(long, global = true, default_value_t = 1.0)]
    pub spawn_rate: f64,

    /// Seconds each run lasts.
    #[clap(long, global = true, default_value_t = 10)]
    pub duration: u64,

    /// Processes whose name contains this are monitored during each run.
    #[clap(long, global = true, default_value = "storm-tape")]
    pub process_name: String,

    /// Directory that the output directory of the sweep is created in.
    #[clap(long, global = true, default_value = "results")]
    pub results_root: PathBuf,

    /// Do not build charts and a summary when the sweep is done.
    #[clap(long, global = true, default_value = "false")]
    pub no_report: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Sweep {
    /// Vary the number of files in each stage request with a fixed number of users.
    Files {
        /// Files per request for each run, e.g. `--files 10,50`.
        #[clap(long, value_delimiter = ',', default_values_t = [10, 50, 100, 200])]
        files: Vec<usize>,

        /// Users in every run.
        #[clap(long, default_value_t = 1)]
        users: usize,
    },
    /// Vary the number of users with a fixed number of files in each stage request.
    Users {
        /// Users for each run, e.g. `--users 1,2,4`.
        #[clap(long, value_delimiter = ',', default_values_t = [1, 2, 4, 8, 16])]
        users: Vec<usize>,

        /// Files in every stage request.
        #[clap(long, default_value_t = 10)]
        files_per_request: usize,
    },
}

impl Sweep {
    pub fn mode(&self) -> SweepMode {
        match self {
            Sweep::Files { .. } => SweepMode::Files,
            Sweep::Users { .. } => SweepMode::Users,
        }
    }

    pub fn points(&self) -> Vec<RunPoint> {
        match self {
            Sweep::Files { files, users } => files
                .iter()
                .map(|&files_per_request| RunPoint {
                    value: files_per_request,
                    users: *users,
                    files_per_request,
                })
                .collect(),
            Sweep::Users {
                users,
                files_per_request,
            } => users
                .iter()
                .map(|&users| RunPoint {
                    value: users,
                    users,
                    files_per_request: *files_per_request,
                })
                .collect(),
        }
    }

    /// The user count shared by every run, if there is one.
    pub fn fixed_users(&self) -> Option<usize> {
        match self {
            Sweep::Files { users, .. } => Some(*users),
            Sweep::Users { .. } => None,
        }
    }

    /// Name of the output directory for a sweep started at `started`.
    pub fn dir_name(&self, started: DateTime<Local>) -> String {
        match self {
            Sweep::Files { users, .. } => {
                format!("{}_{users}", started.format("%Y%m%dT%H%M%S"))
            }
            Sweep::Users { .. } => started.format("%Y%m%dT%H%M%S").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn files_sweep_defaults() {
        let args = CliArgs::try_parse_from(["tape-bench-suite", "files"]).unwrap();

        assert_eq!(SweepMode::Files, args.sweep.mode());
        assert_eq!(Some(1), args.sweep.fixed_users());
        let points = args.sweep.points();
        assert_eq!(
            vec![10, 50, 100, 200],
            points.iter().map(|p| p.files_per_request).collect::<Vec<_>>()
        );
        assert!(points.iter().all(|p| p.users == 1));
        assert_eq!("stage_and_status", args.scenario);
        assert_eq!(10, args.duration);
    }

    #[test]
    fn users_sweep_with_options() {
        let args = CliArgs::try_parse_from([
            "tape-bench-suite",
            "users",
            "--users",
            "2,4",
            "--files-per-request",
            "200",
            "--duration",
            "30",
        ])
        .unwrap();

        let points = args.sweep.points();
        assert_eq!(2, points.len());
        assert_eq!((4, 4, 200), (points[1].value, points[1].users, points[1].files_per_request));
        assert_eq!(None, args.sweep.fixed_users());
        assert_eq!(30, args.duration);
    }

    #[test]
    fn output_directory_names() {
        let started = Local.with_ymd_and_hms(2025, 3, 7, 14, 5, 9).unwrap();

        let files = Sweep::Files {
            files: vec![10],
            users: 4,
        };
        assert_eq!("20250307T140509_4", files.dir_name(started));

        let users = Sweep::Users {
            users: vec![1],
            files_per_request: 10,
        };
        assert_eq!("20250307T140509", users.dir_name(started));
    }
}
