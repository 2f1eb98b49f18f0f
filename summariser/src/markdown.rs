use itertools::Itertools;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::model::{ConfigResult, OperationLatency};
use crate::settings::{ReportHeader, SweepMode};

pub const SUMMARY_FILE: &str = "summary.md";

/// Render the benchmark summary: a header with the run settings and one table row per
/// configuration.
pub fn render_summary(header: &ReportHeader, results: &[ConfigResult]) -> String {
    let mut out = String::new();

    let concurrency = match header.sweep {
        SweepMode::Files => header.users.to_string(),
        SweepMode::Users => results.iter().map(|r| r.value).join(", "),
    };

    out.push_str("# StoRM Tape benchmark summary\n\n");
    out.push_str(&format!("- Host: {}\n", header.host));
    out.push_str(&format!("- Concurrency: {concurrency} users\n"));
    out.push_str(&format!("- Duration: {}s\n", header.duration_s));
    out.push_str(&format!("- Configurations: {}\n\n", header.sweep.label()));

    out.push_str(&results_table(header.sweep, results));
    out.push('\n');
    out
}

fn results_table(sweep: SweepMode, results: &[ConfigResult]) -> String {
    let mut builder = Builder::default();

    let mut columns = vec![
        sweep.label().to_string(),
        "Requests/s".to_string(),
        "Failures".to_string(),
        "Error %".to_string(),
        "Avg (ms)".to_string(),
        "P95 (ms)".to_string(),
    ];
    for operation in ["Stage", "Status 1", "Status 2"] {
        for statistic in ["avg", "min", "p95"] {
            columns.push(format!("{operation} {statistic} (ms)"));
        }
    }
    columns.push("CPU %".to_string());
    builder.push_record(columns);

    for result in results {
        let mut row = vec![
            result.value.to_string(),
            float2(result.requests_per_s),
            result.failures.to_string(),
            float2(result.error_percent()),
            float2(result.avg_ms),
            float2(result.p95_ms),
        ];
        for latency in [&result.stage, &result.get_stage1, &result.get_stage2] {
            row.extend(latency_cells(latency));
        }
        row.push(result.cpu_percent.map(float2).unwrap_or_else(|| "-".to_string()));
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::markdown());
    table.to_string()
}

fn latency_cells(latency: &OperationLatency) -> [String; 3] {
    [
        float2(latency.avg_ms),
        float2(latency.min_ms),
        float2(latency.p95_ms),
    ]
}

fn float2(n: f64) -> String {
    format!("{:.2}", n)
}
