#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tape_bench_suite::{BenchmarkSuite, RunOutcome, RunPoint, SuiteConfig};
use tape_summariser::SweepMode;

/// A stand-in scenario that records how it was called and fails when asked for 50 files.
fn fake_scenario(dir: &Path) -> PathBuf {
    let path = dir.join("fake_scenario");
    let calls = dir.join("calls.txt");
    fs::write(
        &path,
        format!(
            "#!/bin/sh\n\
             echo \"$STORM_FILES_PER_REQ $RUN_SUMMARY_PATH $*\" >> {calls}\n\
             if [ \"$STORM_FILES_PER_REQ\" = \"50\" ]; then\n\
             \x20 echo starting\n\
             \x20 echo broken >&2\n\
             \x20 exit 3\n\
             fi\n",
            calls = calls.display()
        ),
    )
    .unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config(scenario: PathBuf) -> SuiteConfig {
    SuiteConfig {
        scenario,
        host: "http://localhost:8080".to_string(),
        spawn_rate: 2.0,
        duration_s: 5,
        process_name: "no-such-process-for-tape-tests".to_string(),
    }
}

fn point(files_per_request: usize) -> RunPoint {
    RunPoint {
        value: files_per_request,
        users: 3,
        files_per_request,
    }
}

#[test]
fn each_point_runs_the_scenario_and_failures_are_logged() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();

    let suite = BenchmarkSuite::new(
        config(fake_scenario(dir.path())),
        SweepMode::Files,
        &out_dir,
    );
    let outcomes = suite.run(&[point(10), point(50), point(100)]);

    assert_eq!(3, outcomes.len());
    assert!(matches!(outcomes[0].1, RunOutcome::Completed));
    assert!(matches!(outcomes[1].1, RunOutcome::Failed(_)));
    assert!(matches!(outcomes[2].1, RunOutcome::Completed));

    let calls = fs::read_to_string(dir.path().join("calls.txt")).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(3, calls.len());

    let summary_path = out_dir.join("run_summary.jsonl");
    let prefix = out_dir.join("test_10_files");
    assert_eq!(
        format!(
            "10 {} --connection-string http://localhost:8080 --agents 3 --spawn-rate 2 --duration 5 --no-progress --csv {}",
            summary_path.display(),
            prefix.display()
        ),
        calls[0]
    );

    assert_eq!(
        "starting\n\nbroken\n",
        fs::read_to_string(out_dir.join("test_50_files.log")).unwrap()
    );
    assert!(!out_dir.join("test_10_files.log").exists());

    for n in [10, 50, 100] {
        let cpu_log = fs::read_to_string(out_dir.join(format!("test_{n}_files_cpu.csv"))).unwrap();
        assert!(cpu_log.starts_with("timestamp,cpu_percent,open_fds,connections\n"));
    }
}

#[test]
fn missing_binary_does_not_stop_the_sweep() {
    let dir = tempfile::tempdir().unwrap();

    let suite = BenchmarkSuite::new(
        config(dir.path().join("not-there")),
        SweepMode::Users,
        dir.path(),
    );
    let outcomes = suite.run(&[point(1), point(2)]);

    assert_eq!(2, outcomes.len());
    assert!(outcomes
        .iter()
        .all(|(_, outcome)| matches!(outcome, RunOutcome::NotStarted)));
}
