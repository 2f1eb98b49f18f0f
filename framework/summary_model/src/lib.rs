use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::Path;

/// Summary of one scenario run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The target service the virtual users were pointed at
    pub connection_string: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The duration that the run was configured with, in seconds
    ///
    /// Not set for soak runs.
    pub run_duration: Option<u64>,
    /// The number of virtual users configured
    pub agent_count: usize,
    /// The number of virtual users still running at the end of the run
    ///
    /// Users that bail or fail their setup are not counted, so this can be less than
    /// [RunSummary::agent_count].
    pub agent_end_count: usize,
    /// The number of virtual users that were assigned to each behaviour
    pub assigned_behaviours: HashMap<String, usize>,
    /// Environment variables that shaped the run, such as the files per stage request
    ///
    /// Only variables captured by the runner or by the scenario are included. Credentials are
    /// never captured.
    pub env: HashMap<String, String>,
    /// The version of Tape Tunnel that produced this run
    pub tape_tunnel_version: String,
}

impl RunSummary {
    /// Create a new run summary
    pub fn new(
        run_id: String,
        scenario_name: String,
        connection_string: String,
        started_at: i64,
        run_duration: Option<u64>,
        agent_count: usize,
        assigned_behaviours: HashMap<String, usize>,
        tape_tunnel_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            connection_string,
            started_at,
            run_duration,
            agent_count,
            agent_end_count: 0,
            assigned_behaviours,
            env: HashMap::with_capacity(0),
            tape_tunnel_version,
        }
    }

    pub fn set_agent_end_count(&mut self, agent_end_count: usize) {
        self.agent_end_count = agent_end_count;
    }

    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint identifies the configuration of a run, so two runs of the same sweep point
    /// share it. It covers the scenario name, target, duration, agent count, assigned behaviours,
    /// captured environment and version, hashed with [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        Digest::update(&mut hasher, self.connection_string.as_bytes());
        if let Some(run_duration) = self.run_duration {
            Digest::update(&mut hasher, run_duration.to_le_bytes());
        }
        Digest::update(&mut hasher, (self.agent_count as u64).to_le_bytes());
        self.assigned_behaviours
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, (*v as u64).to_le_bytes());
            });
        self.env
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.tape_tunnel_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary is serialized to JSON on a single line followed by a newline. The recommended file
/// extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line, the format produced by
/// [append_run_summary]. Blank lines are skipped.
pub fn load_summary_runs(path: impl AsRef<Path>) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}
