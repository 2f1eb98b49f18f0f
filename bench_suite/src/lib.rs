pub mod cli;
pub mod monitor;
pub mod suite;

pub use monitor::{ProcessMonitor, ProcessSample};
pub use suite::{locate_scenario, BenchmarkSuite, RunOutcome, RunPoint, SuiteConfig};
