use std::path::PathBuf;

use clap::Parser;
use tape_tunnel_instruments::ReporterOpt;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct TapeTunnelScenarioCli {
    /// The base URL of the tape service to test, for example `https://storm-tape.example.org:8443`
    #[clap(short, long, default_value = "http://localhost:8080")]
    pub connection_string: String,

    /// The number of agents to run
    #[clap(long)]
    pub agents: Option<usize>,

    /// Assign a behaviour to a number of agents. Specify the behaviour and number of agents to assign
    /// it to in the format `behaviour:count`. For example `--behaviour=stage:5`.
    ///
    /// Specifying the count is optional and will default to 1.
    ///
    /// You can specify multiple behaviours by using the flag multiple times. For example `--behaviour=stage:5 --behaviour=cancel:1`.
    ///
    /// For however many agents you assign to behaviours in total, it must be less than or equal to the total number of agents for this scenario.
    /// If it is less than the total number of agents then the remaining agents will be assigned the default behaviour.
    ///
    /// If the configuration is invalid then the scenario will fail to start.
    #[clap(long, short, value_parser = parse_agent_behaviour)]
    pub behaviour: Vec<(String, usize)>,

    /// The number of seconds to run the scenario for
    #[clap(long)]
    pub duration: Option<u64>,

    /// Run this test as a soak test, ignoring any configured duration and continuing to run until stopped
    #[clap(long, default_value = "false")]
    pub soak: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// The console reporter to use when the run ends
    #[clap(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Override the generated run id
    #[clap(long)]
    pub run_id: Option<String>,

    /// Write `<prefix>_stats.csv` and `<prefix>_failures.csv` in the locust CSV layout when the run ends
    #[clap(long)]
    pub csv: Option<PathBuf>,

    /// How many agents to start per second. All agents start at once when this is not set.
    #[clap(long)]
    pub spawn_rate: Option<f64>,

    /// Append a summary of this run to a JSON lines file
    #[clap(long, env = "RUN_SUMMARY_PATH")]
    pub run_summary: Option<PathBuf>,
}

fn parse_agent_behaviour(s: &str) -> anyhow::Result<(String, usize)> {
    let mut parts = s.split(':');
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or(anyhow::anyhow!("No name specified for behaviour"))?;

    let count = match parts.next() {
        Some(count) => count
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid agent count [{count}] for behaviour: {e}"))?,
        None => 1,
    };

    Ok((name, count))
}
