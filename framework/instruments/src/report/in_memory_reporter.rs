mod operations_table;

use std::time::Duration;

use tabled::settings::Style;
use tabled::Table;

use crate::report::in_memory_reporter::operations_table::OperationRow;
use crate::report::ReportCollector;
use crate::stats::summarize;
use crate::OperationRecord;

/// A basic reporter that is useful while developing scenarios. It keeps all of the operations
/// in memory and prints a summary table at the end of the run.
pub struct InMemoryReporter {
    operation_records: Vec<OperationRecord>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self {
            operation_records: Vec::new(),
        }
    }

    fn summary_table(&self, run_duration: Duration) -> Table {
        let (per_operation, aggregated) = summarize(&self.operation_records, run_duration);

        let rows = per_operation
            .iter()
            .chain(std::iter::once(&aggregated))
            .map(|stats| OperationRow {
                operation_id: stats.name.clone(),
                avg_time_ms: stats.avg_ms,
                min_time_ms: stats.min_ms,
                max_time_ms: stats.max_ms,
                p95_time_ms: stats.percentile(0.95),
                total_operations: stats.request_count,
                failures: stats.failure_count,
                requests_per_s: stats.requests_per_s,
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        table
    }
}

impl Default for InMemoryReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operation_records.push(operation_record.clone());
    }

    fn finalize(&mut self, run_duration: Duration) -> anyhow::Result<()> {
        println!("\nSummary of operations");
        println!("{}", self.summary_table(run_duration));
        Ok(())
    }
}
