mod report;
mod stats;

use std::fmt::Display;
use std::time::{Duration, Instant};

pub use report::{OperationLog, ReportCollector, ReportConfig, Reporter, ReporterOpt};
pub use stats::{percentile, summarize, OperationStats, AGGREGATED_NAME, PERCENTILES};

pub mod prelude {
    pub use crate::report::{OperationLog, ReportCollector, ReportConfig, Reporter, ReporterOpt};
    pub use crate::stats::{OperationStats, AGGREGATED_NAME};
    pub use crate::{report_operation, OperationRecord};
}

/// A single timed operation against the system under test.
///
/// The `operation_id` is the stable, human-readable label that statistics are grouped by. It must
/// not contain per-call values such as request ids.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation_id: String,
    pub method: String,
    started: Instant,
    pub elapsed: Option<Duration>,
    pub is_error: bool,
    pub failure: Option<String>,
    pub content_length: Option<u64>,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            method: String::new(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
            failure: None,
            content_length: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Fix the elapsed time of this record. Mostly useful for building records in tests.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn with_failure(mut self, failure: impl Into<String>) -> Self {
        self.is_error = true;
        self.failure = Some(failure.into());
        self
    }

    pub fn set_content_length(&mut self, content_length: u64) {
        self.content_length = Some(content_length);
    }

    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }
}

/// Complete `record` with the outcome of the operation and hand it to the reporter.
///
/// An `Err` marks the record as failed and keeps the error's message so that the failure report
/// can tell transport errors apart from protocol errors.
pub fn report_operation<T, E: Display>(
    reporter: &Reporter,
    mut record: OperationRecord,
    response: &Result<T, E>,
) {
    if record.elapsed.is_none() {
        record.elapsed = Some(record.started.elapsed());
    }

    if let Err(e) = response {
        record.is_error = true;
        record.failure = Some(e.to_string());
    }

    log::trace!(
        "Operation {} took {}ms, failed? {}",
        record.operation_id,
        record.elapsed.unwrap_or_default().as_millis(),
        record.is_error,
    );

    reporter.add_operation(&record);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_operation_marks_errors_with_message() {
        let log = OperationLog::default();
        let reporter = ReportConfig::default().with_collector(log.clone()).init();

        let ok: Result<(), String> = Ok(());
        report_operation(&reporter, OperationRecord::new("stage"), &ok);
        let failed: Result<(), String> = Err("Stage failed with status 500".to_string());
        report_operation(&reporter, OperationRecord::new("stage"), &failed);

        let records = log.records();
        assert_eq!(2, records.len());
        assert!(!records[0].is_error);
        assert!(records[0].elapsed.is_some());
        assert!(records[1].is_error);
        assert_eq!(
            Some("Stage failed with status 500"),
            records[1].failure.as_deref()
        );
    }

    #[test]
    fn report_operation_keeps_preset_elapsed() {
        let log = OperationLog::default();
        let reporter = ReportConfig::default().with_collector(log.clone()).init();

        let ok: Result<(), String> = Ok(());
        report_operation(
            &reporter,
            OperationRecord::new("get_stage1").with_elapsed(Duration::from_millis(42)),
            &ok,
        );

        assert_eq!(
            Some(Duration::from_millis(42)),
            log.records()[0].duration()
        );
    }
}
