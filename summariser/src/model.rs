use crate::columns::Statistic;
use crate::frame::StatsTable;

/// Latency statistics of one operation, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OperationLatency {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub p95_ms: f64,
}

/// The results of one run of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigResult {
    /// Files per request or user count, depending on the sweep.
    pub value: usize,
    pub requests_per_s: f64,
    pub failures: u64,
    pub requests: u64,
    pub avg_ms: f64,
    pub p95_ms: f64,
    pub stage: OperationLatency,
    pub get_stage1: OperationLatency,
    pub get_stage2: OperationLatency,
    /// Mean CPU use of the service during the run, when it was monitored.
    pub cpu_percent: Option<f64>,
}

impl ConfigResult {
    pub fn from_table(value: usize, table: &StatsTable) -> Self {
        let aggregate = table.aggregate_row();

        Self {
            value,
            requests_per_s: table.statistic(aggregate, Statistic::Throughput),
            failures: table.statistic(aggregate, Statistic::Failures) as u64,
            requests: table.statistic(aggregate, Statistic::Requests) as u64,
            avg_ms: table.statistic(aggregate, Statistic::Average),
            p95_ms: table.statistic(aggregate, Statistic::P95),
            stage: table.latency("stage"),
            get_stage1: table.latency("get_stage1"),
            get_stage2: table.latency("get_stage2"),
            cpu_percent: None,
        }
    }

    pub fn with_cpu_percent(mut self, cpu_percent: Option<f64>) -> Self {
        self.cpu_percent = cpu_percent;
        self
    }

    pub fn error_percent(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.failures as f64 / self.requests as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(failures: u64, requests: u64) -> ConfigResult {
        ConfigResult {
            value: 10,
            requests_per_s: 0.0,
            failures,
            requests,
            avg_ms: 0.0,
            p95_ms: 0.0,
            stage: OperationLatency::default(),
            get_stage1: OperationLatency::default(),
            get_stage2: OperationLatency::default(),
            cpu_percent: None,
        }
    }

    #[test]
    fn error_percent_of_requests() {
        assert_eq!(25.0, result(5, 20).error_percent());
        assert_eq!(0.0, result(0, 0).error_percent());
    }
}
