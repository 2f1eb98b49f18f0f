//! Turns the statistics of a benchmark sweep into charts and a markdown summary.
//!
//! A sweep directory holds one `_stats.csv` per configuration, written by a scenario's `--csv`
//! option, and optionally a `_cpu.csv` process monitor log per configuration.

use anyhow::Context;

pub mod charts;
pub mod columns;
pub mod cpu;
pub mod frame;
pub mod markdown;
pub mod model;
pub mod settings;

pub use frame::{LoadError, StatsTable};
pub use model::{ConfigResult, OperationLatency};
pub use settings::{ReportHeader, ReportSettings, SweepMode};

/// Read the results of every configured value. A configuration that cannot be read is logged and
/// left out, the others are still returned.
pub fn collect_results(settings: &ReportSettings) -> Vec<ConfigResult> {
    let mut results = Vec::with_capacity(settings.values.len());

    for &value in &settings.values {
        let stats_path = settings.stats_path(value);
        log::info!("Reading {}", stats_path.display());

        match StatsTable::load(&stats_path) {
            Ok(table) => {
                let result = ConfigResult::from_table(value, &table)
                    .with_cpu_percent(cpu::mean_cpu_percent(&settings.cpu_path(value)));
                log::info!(
                    "{} {value}: {:.2} requests/s | {:.2}ms avg | stage {:.2}ms | status {:.2}ms / {:.2}ms | {} failures",
                    settings.sweep.label(),
                    result.requests_per_s,
                    result.avg_ms,
                    result.stage.avg_ms,
                    result.get_stage1.avg_ms,
                    result.get_stage2.avg_ms,
                    result.failures,
                );
                results.push(result);
            }
            Err(e @ LoadError::NotFound { .. }) => log::warn!("Skipping {value}: {e}"),
            Err(e) => log::error!("Skipping {value}: {e}"),
        }
    }

    results
}

/// Write the charts and `summary.md` into the results directory. Returns the results they were
/// made from.
pub fn generate_report(settings: &ReportSettings) -> anyhow::Result<Vec<ConfigResult>> {
    let results = collect_results(settings);
    if results.is_empty() {
        log::warn!(
            "No statistics found in {} for {:?}",
            settings.results_dir.display(),
            settings.values
        );
    }

    charts::draw_charts(&settings.results_dir, settings.sweep, &results);

    let summary_path = settings.results_dir.join(markdown::SUMMARY_FILE);
    let summary = markdown::render_summary(&settings.header(), &results);
    std::fs::write(&summary_path, summary)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;
    log::info!("Wrote summary to {}", summary_path.display());

    Ok(results)
}
