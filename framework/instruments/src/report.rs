mod csv_stats_reporter;
mod in_memory_reporter;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::OperationRecord;

pub use csv_stats_reporter::CsvStatsReportCollector;
pub use in_memory_reporter::InMemoryReporter;

pub trait ReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    /// Called once at the end of the run with the wall-clock duration of the run.
    fn finalize(&mut self, run_duration: Duration) -> anyhow::Result<()>;
}

/// Which console reporter a scenario should use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReporterOpt {
    /// Print a table of operation timings when the run ends.
    #[default]
    InMemory,
    /// Do not print anything.
    Noop,
}

#[derive(Default)]
pub struct ReportConfig {
    enable_in_memory: bool,
    csv_prefix: Option<PathBuf>,
    extra: Vec<Box<dyn ReportCollector + Send>>,
}

impl ReportConfig {
    pub fn enable_in_memory(mut self) -> Self {
        self.enable_in_memory = true;
        self
    }

    /// Write `<prefix>_stats.csv` and `<prefix>_failures.csv` when the run ends.
    pub fn enable_csv(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.csv_prefix = Some(prefix.into());
        self
    }

    pub fn with_collector(mut self, collector: impl ReportCollector + Send + 'static) -> Self {
        self.extra.push(Box::new(collector));
        self
    }

    pub fn from_opt(opt: ReporterOpt, csv_prefix: Option<PathBuf>) -> Self {
        let mut config = Self::default();
        if opt == ReporterOpt::InMemory {
            config = config.enable_in_memory();
        }
        if let Some(prefix) = csv_prefix {
            config = config.enable_csv(prefix);
        }
        config
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Mutex<Box<dyn ReportCollector + Send>>> = Vec::new();

        if self.enable_in_memory {
            collectors.push(Mutex::new(Box::new(InMemoryReporter::new())));
        }
        if let Some(prefix) = self.csv_prefix {
            collectors.push(Mutex::new(Box::new(CsvStatsReportCollector::new(prefix))));
        }
        collectors.extend(self.extra.into_iter().map(Mutex::new));

        Reporter {
            collectors,
            started: Instant::now(),
        }
    }
}

/// Fans operation records out to the configured collectors.
pub struct Reporter {
    collectors: Vec<Mutex<Box<dyn ReportCollector + Send>>>,
    started: Instant,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("collectors", &self.collectors.len())
            .field("started", &self.started)
            .finish()
    }
}

impl Reporter {
    pub fn add_operation(&self, operation_record: &OperationRecord) {
        for collector in &self.collectors {
            collector.lock().add_operation(operation_record);
        }
    }

    /// Finalize every collector. Collector errors are logged, one failing collector does not stop
    /// the others from writing their output.
    pub fn finalize(&self) {
        let run_duration = self.started.elapsed();
        for collector in &self.collectors {
            if let Err(e) = collector.lock().finalize(run_duration) {
                log::error!("Failed to finalize report: {e:?}");
            }
        }
    }
}

/// Keeps every record in memory and shares them with its clones.
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    records: Arc<Mutex<Vec<OperationRecord>>>,
}

impl OperationLog {
    pub fn records(&self) -> Vec<OperationRecord> {
        self.records.lock().clone()
    }

    pub fn named(&self, operation_id: &str) -> Vec<OperationRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.operation_id == operation_id)
            .cloned()
            .collect()
    }
}

impl ReportCollector for OperationLog {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.records.lock().push(operation_record.clone());
    }

    fn finalize(&mut self, _run_duration: Duration) -> anyhow::Result<()> {
        Ok(())
    }
}
