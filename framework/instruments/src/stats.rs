use std::collections::BTreeMap;
use std::time::Duration;

use crate::OperationRecord;

/// Name of the row that summarises every operation, as written by locust.
pub const AGGREGATED_NAME: &str = "Aggregated";

/// The percentiles reported for each operation, in the order of the locust stats columns.
pub const PERCENTILES: [f64; 11] = [
    0.5, 0.66, 0.75, 0.8, 0.9, 0.95, 0.98, 0.99, 0.999, 0.9999, 1.0,
];

/// Statistics for one operation label, or for all operations when `name` is [AGGREGATED_NAME].
///
/// Response times are in milliseconds and include failed operations.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationStats {
    pub method: String,
    pub name: String,
    pub request_count: usize,
    pub failure_count: usize,
    pub median_ms: f64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_content_size: f64,
    pub requests_per_s: f64,
    pub failures_per_s: f64,
    /// One value per entry of [PERCENTILES].
    pub percentiles_ms: Vec<f64>,
}

impl OperationStats {
    pub fn from_records<'a>(
        method: &str,
        name: &str,
        records: impl IntoIterator<Item = &'a OperationRecord>,
        run_duration: Duration,
    ) -> Self {
        let mut durations_ms = Vec::new();
        let mut failure_count = 0;
        let mut content_total = 0u64;

        for record in records {
            durations_ms.push(record.elapsed.unwrap_or_default().as_secs_f64() * 1000.0);
            if record.is_error {
                failure_count += 1;
            }
            content_total += record.content_length.unwrap_or_default();
        }

        durations_ms.sort_by(f64::total_cmp);

        let request_count = durations_ms.len();
        let run_secs = run_duration.as_secs_f64();
        let per_second = |count: usize| {
            if run_secs > 0.0 {
                count as f64 / run_secs
            } else {
                0.0
            }
        };
        let mean = |total: f64| {
            if request_count > 0 {
                total / request_count as f64
            } else {
                0.0
            }
        };

        Self {
            method: method.to_string(),
            name: name.to_string(),
            request_count,
            failure_count,
            median_ms: percentile(&durations_ms, 0.5),
            avg_ms: mean(durations_ms.iter().sum()),
            min_ms: durations_ms.first().copied().unwrap_or_default(),
            max_ms: durations_ms.last().copied().unwrap_or_default(),
            avg_content_size: mean(content_total as f64),
            requests_per_s: per_second(request_count),
            failures_per_s: per_second(failure_count),
            percentiles_ms: PERCENTILES
                .iter()
                .map(|q| percentile(&durations_ms, *q))
                .collect(),
        }
    }

    /// Look up one of the reported [PERCENTILES]. Returns 0.0 for a percentile that is not reported.
    pub fn percentile(&self, q: f64) -> f64 {
        PERCENTILES
            .iter()
            .position(|p| (p - q).abs() < f64::EPSILON)
            .and_then(|i| self.percentiles_ms.get(i).copied())
            .unwrap_or_default()
    }
}

/// Nearest-rank percentile of an ascending slice. An empty slice gives 0.0.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let rank = (q.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Group records by `(name, method)` and compute statistics for every group and for the whole run.
///
/// Groups are ordered by name then method, which is the row order of the stats CSV.
pub fn summarize(
    records: &[OperationRecord],
    run_duration: Duration,
) -> (Vec<OperationStats>, OperationStats) {
    let mut groups: BTreeMap<(&str, &str), Vec<&OperationRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.operation_id.as_str(), record.method.as_str()))
            .or_default()
            .push(record);
    }

    let per_operation = groups
        .into_iter()
        .map(|((name, method), records)| {
            OperationStats::from_records(method, name, records, run_duration)
        })
        .collect();

    let aggregated = OperationStats::from_records("", AGGREGATED_NAME, records, run_duration);

    (per_operation, aggregated)
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
    fn nearest_rank_percentiles() {
        let values: Vec<f64> = (1..=20).map(f64::from).collect();

        assert_eq!(10.0, percentile(&values, 0.5));
        assert_eq!(19.0, percentile(&values, 0.95));
        assert_eq!(20.0, percentile(&values, 1.0));
        assert_eq!(1.0, percentile(&values, 0.0));
        assert_eq!(0.0, percentile(&[], 0.95));
    }

    #[test]
    fn stats_for_single_operation() {
        let records = vec![
            record("stage", "POST", 80),
            record("stage", "POST", 100),
            record("stage", "POST", 120).with_failure("Stage failed with status 500"),
        ];

        let stats =
            OperationStats::from_records("POST", "stage", &records, Duration::from_secs(10));

        assert_eq!(3, stats.request_count);
        assert_eq!(1, stats.failure_count);
        assert_eq!(100.0, stats.avg_ms);
        assert_eq!(80.0, stats.min_ms);
        assert_eq!(120.0, stats.max_ms);
        assert_eq!(100.0, stats.median_ms);
        assert_eq!(120.0, stats.percentile(0.95));
        assert!((stats.requests_per_s - 0.3).abs() < 1e-9);
        assert!((stats.failures_per_s - 0.1).abs() < 1e-9);
    }

    #[test]
    fn summarize_groups_by_name_and_aggregates_everything() {
        let records = vec![
            record("stage", "POST", 90),
            record("get_stage2", "GET", 10),
            record("get_stage1", "GET", 20),
            record("stage", "POST", 110),
        ];

        let (per_operation, aggregated) = summarize(&records, Duration::from_secs(2));

        let names: Vec<&str> = per_operation.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(vec!["get_stage1", "get_stage2", "stage"], names);
        assert_eq!(2, per_operation[2].request_count);
        assert_eq!(AGGREGATED_NAME, aggregated.name);
        assert_eq!(4, aggregated.request_count);
        assert_eq!(57.5, aggregated.avg_ms);
        assert_eq!(2.0, aggregated.requests_per_s);
    }

    #[test]
    fn empty_run_has_zero_stats() {
        let (per_operation, aggregated) = summarize(&[], Duration::ZERO);

        assert!(per_operation.is_empty());
        assert_eq!(0, aggregated.request_count);
        assert_eq!(0.0, aggregated.avg_ms);
        assert_eq!(0.0, aggregated.requests_per_s);
    }
}
