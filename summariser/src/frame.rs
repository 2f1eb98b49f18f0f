use std::path::{Path, PathBuf};

use polars::prelude::*;
use thiserror::Error;

use crate::columns::{resolve, Statistic};
use crate::model::OperationLatency;

/// Name of the summary row in a locust stats file.
pub const AGGREGATED_ROW: &str = "Aggregated";
const NAME_COLUMN: &str = "Name";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Stats file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
    #[error("No rows in {}", path.display())]
    Empty { path: PathBuf },
}

/// The rows of one `_stats.csv` file.
#[derive(Debug)]
pub struct StatsTable {
    path: PathBuf,
    frame: DataFrame,
    names: Vec<Option<String>>,
}

impl StatsTable {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let read_error = |source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        };

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(read_error)?;

        if frame.height() == 0 {
            return Err(LoadError::Empty {
                path: path.to_path_buf(),
            });
        }

        let names = match frame.column(NAME_COLUMN) {
            Ok(column) => {
                let names = column
                    .as_materialized_series()
                    .cast(&DataType::String)
                    .map_err(read_error)?;
                let names = names.str().map_err(read_error)?;
                names.into_iter().map(|n| n.map(str::to_string)).collect()
            }
            Err(_) => {
                log::debug!("No {NAME_COLUMN} column in {}", path.display());
                Vec::new()
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            frame,
            names,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `Aggregated` row, or the last row when there is none.
    pub fn aggregate_row(&self) -> usize {
        self.row_named(AGGREGATED_ROW)
            .unwrap_or_else(|| self.frame.height() - 1)
    }

    /// The first row whose name is exactly `name`.
    pub fn row_named(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.as_deref() == Some(name))
    }

    /// Read a statistic from `row` through its column aliases. Missing values are 0.0.
    pub fn statistic(&self, row: usize, statistic: Statistic) -> f64 {
        resolve(statistic, |column| self.cell(column, row))
    }

    /// Latency statistics of the row named `name`, all zero when there is no such row.
    pub fn latency(&self, name: &str) -> OperationLatency {
        match self.row_named(name) {
            Some(row) => OperationLatency {
                avg_ms: self.statistic(row, Statistic::Average),
                min_ms: self.statistic(row, Statistic::Minimum),
                p95_ms: self.statistic(row, Statistic::P95),
            },
            None => OperationLatency::default(),
        }
    }

    fn cell(&self, column: &str, row: usize) -> Option<f64> {
        let values = self
            .frame
            .column(column)
            .ok()?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .ok()?;

        values.f64().ok()?.get(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_stats(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("test_10_files_stats.csv");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = StatsTable::load(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn header_only_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stats(dir.path(), "Type,Name,Request Count\n");

        let err = StatsTable::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Empty { .. }));
    }

    #[test]
    fn aggregate_row_falls_back_to_the_last_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stats(
            dir.path(),
            "Type,Name,Requests/s\nPOST,stage,3.0\nGET,get_stage1,4.5\n",
        );

        let table = StatsTable::load(&path).unwrap();
        assert_eq!(1, table.aggregate_row());
        assert_eq!(4.5, table.statistic(table.aggregate_row(), Statistic::Throughput));
    }

    #[test]
    fn old_column_names_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stats(
            dir.path(),
            "Method,Name,# requests,# failures,Average response time,Min response time,95%ile,Requests per Second\n\
             POST,stage,10,1,84.18,70,120,2.5\n\
             ,Aggregated,30,1,93.87,8,150,15.68\n",
        );

        let table = StatsTable::load(&path).unwrap();
        let row = table.aggregate_row();
        assert_eq!(1, row);
        assert_eq!(93.87, table.statistic(row, Statistic::Average));
        assert_eq!(150.0, table.statistic(row, Statistic::P95));
        assert_eq!(30.0, table.statistic(row, Statistic::Requests));
        assert_eq!(
            OperationLatency {
                avg_ms: 84.18,
                min_ms: 70.0,
                p95_ms: 120.0
            },
            table.latency("stage")
        );
    }

    #[test]
    fn absent_operation_has_zero_latency() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stats(
            dir.path(),
            "Type,Name,Average Response Time\nPOST,stage,84.18\n",
        );

        let table = StatsTable::load(&path).unwrap();
        assert_eq!(OperationLatency::default(), table.latency("get_stage2"));
    }

    #[test]
    fn non_numeric_cells_read_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stats(dir.path(), "Type,Name,95%\nPOST,stage,N/A\n");

        let table = StatsTable::load(&path).unwrap();
        assert_eq!(0.0, table.statistic(0, Statistic::P95));
    }
}
