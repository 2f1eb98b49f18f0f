use crate::cli::TapeTunnelScenarioCli;
use clap::Parser;

/// Initialise logging and parse the CLI for a tape tunnel scenario.
///
/// Logs at `info` unless `RUST_LOG` says otherwise, so that runs driven by the benchmark suite
/// leave a useful log behind.
pub fn init() -> TapeTunnelScenarioCli {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = TapeTunnelScenarioCli::parse();
    log::debug!("Scenario options: {cli:?}");
    cli
}
