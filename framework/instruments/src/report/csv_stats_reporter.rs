use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;

use crate::report::ReportCollector;
use crate::stats::{summarize, OperationStats};
use crate::OperationRecord;

/// Writes statistics in the CSV layout produced by locust's `--csv` option, so that existing
/// tooling for locust results can read them.
pub struct CsvStatsReportCollector {
    prefix: PathBuf,
    operation_records: Vec<OperationRecord>,
}

#[derive(Serialize)]
struct StatsRow<'a> {
    #[serde(rename = "Type")]
    method: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Request Count")]
    request_count: usize,
    #[serde(rename = "Failure Count")]
    failure_count: usize,
    #[serde(rename = "Median Response Time")]
    median: u64,
    #[serde(rename = "Average Response Time")]
    average: f64,
    #[serde(rename = "Min Response Time")]
    min: f64,
    #[serde(rename = "Max Response Time")]
    max: f64,
    #[serde(rename = "Average Content Size")]
    avg_content_size: f64,
    #[serde(rename = "Requests/s")]
    requests_per_s: f64,
    #[serde(rename = "Failures/s")]
    failures_per_s: f64,
    #[serde(rename = "50%")]
    p50: u64,
    #[serde(rename = "66%")]
    p66: u64,
    #[serde(rename = "75%")]
    p75: u64,
    #[serde(rename = "80%")]
    p80: u64,
    #[serde(rename = "90%")]
    p90: u64,
    #[serde(rename = "95%")]
    p95: u64,
    #[serde(rename = "98%")]
    p98: u64,
    #[serde(rename = "99%")]
    p99: u64,
    #[serde(rename = "99.9%")]
    p99_9: u64,
    #[serde(rename = "99.99%")]
    p99_99: u64,
    #[serde(rename = "100%")]
    p100: u64,
}

impl<'a> From<&'a OperationStats> for StatsRow<'a> {
    fn from(stats: &'a OperationStats) -> Self {
        let p = |q: f64| stats.percentile(q).round() as u64;
        Self {
            method: &stats.method,
            name: &stats.name,
            request_count: stats.request_count,
            failure_count: stats.failure_count,
            median: stats.median_ms.round() as u64,
            average: round2(stats.avg_ms),
            min: round2(stats.min_ms),
            max: round2(stats.max_ms),
            avg_content_size: round2(stats.avg_content_size),
            requests_per_s: round2(stats.requests_per_s),
            failures_per_s: round2(stats.failures_per_s),
            p50: p(0.5),
            p66: p(0.66),
            p75: p(0.75),
            p80: p(0.8),
            p90: p(0.9),
            p95: p(0.95),
            p98: p(0.98),
            p99: p(0.99),
            p99_9: p(0.999),
            p99_99: p(0.9999),
            p100: p(1.0),
        }
    }
}

#[derive(Serialize)]
struct FailureRow<'a> {
    #[serde(rename = "Method")]
    method: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Error")]
    error: &'a str,
    #[serde(rename = "Occurrences")]
    occurrences: usize,
}

impl CsvStatsReportCollector {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            operation_records: Vec::new(),
        }
    }

    pub fn stats_path(&self) -> PathBuf {
        with_suffix(&self.prefix, "_stats.csv")
    }

    pub fn failures_path(&self) -> PathBuf {
        with_suffix(&self.prefix, "_failures.csv")
    }

    fn write_stats(&self, run_duration: Duration) -> anyhow::Result<()> {
        let path = self.stats_path();
        let (per_operation, aggregated) = summarize(&self.operation_records, run_duration);

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for stats in per_operation.iter().chain(std::iter::once(&aggregated)) {
            writer.serialize(StatsRow::from(stats))?;
        }
        writer.flush()?;

        log::info!("Wrote operation statistics to {}", path.display());
        Ok(())
    }

    fn write_failures(&self) -> anyhow::Result<()> {
        let path = self.failures_path();

        let mut occurrences: BTreeMap<(&str, &str, &str), usize> = BTreeMap::new();
        for record in self.operation_records.iter().filter(|r| r.is_error) {
            let error = record.failure.as_deref().unwrap_or("unknown error");
            *occurrences
                .entry((record.method.as_str(), record.operation_id.as_str(), error))
                .or_default() += 1;
        }

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        if occurrences.is_empty() {
            writer.write_record(["Method", "Name", "Error", "Occurrences"])?;
        }
        for ((method, name, error), occurrences) in occurrences {
            writer.serialize(FailureRow {
                method,
                name,
                error,
                occurrences,
            })?;
        }
        writer.flush()?;

        Ok(())
    }
}

impl ReportCollector for CsvStatsReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operation_records.push(operation_record.clone());
    }

    fn finalize(&mut self, run_duration: Duration) -> anyhow::Result<()> {
        self.write_stats(run_duration)?;
        self.write_failures()
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, method: &str, ms: u64) -> OperationRecord {
        OperationRecord::new(name)
            .with_method(method)
            .with_elapsed(Duration::from_millis(ms))
    }

    #[test]
    fn writes_locust_compatible_stats() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = CsvStatsReportCollector::new(dir.path().join("test_10_files"));

        collector.add_operation(&record("stage", "POST", 80));
        collector.add_operation(&record("stage", "POST", 100));
        collector.add_operation(&record("get_stage1", "GET", 10));
        collector.finalize(Duration::from_secs(3)).unwrap();

        let content = std::fs::read_to_string(dir.path().join("test_10_files_stats.csv")).unwrap();
        let mut lines = content.lines();

        assert_eq!(
            "Type,Name,Request Count,Failure Count,Median Response Time,Average Response Time,\
             Min Response Time,Max Response Time,Average Content Size,Requests/s,Failures/s,\
             50%,66%,75%,80%,90%,95%,98%,99%,99.9%,99.99%,100%",
            lines.next().unwrap()
        );
        assert!(lines.next().unwrap().starts_with("GET,get_stage1,1,0,10,10.0,"));
        assert!(lines.next().unwrap().starts_with("POST,stage,2,0,80,90.0,80.0,100.0,"));
        assert!(lines.next().unwrap().starts_with(",Aggregated,3,0,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn writes_failures_grouped_by_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = CsvStatsReportCollector::new(dir.path().join("run"));

        collector.add_operation(&record("stage", "POST", 5).with_failure("No requestId in response"));
        collector.add_operation(&record("stage", "POST", 5).with_failure("No requestId in response"));
        collector
            .add_operation(&record("stage", "POST", 5).with_failure("Stage failed with status 503"));
        collector.finalize(Duration::from_secs(1)).unwrap();

        let content = std::fs::read_to_string(collector.failures_path()).unwrap();
        pretty_assertions::assert_eq!(
            "Method,Name,Error,Occurrences\n\
             POST,stage,No requestId in response,2\n\
             POST,stage,Stage failed with status 503,1\n",
            content
        );
    }

    #[test]
    fn failures_file_has_header_when_nothing_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = CsvStatsReportCollector::new(dir.path().join("run"));

        collector.finalize(Duration::from_secs(1)).unwrap();

        let content = std::fs::read_to_string(collector.failures_path()).unwrap();
        assert_eq!("Method,Name,Error,Occurrences\n", content);
    }
}
