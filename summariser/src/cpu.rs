use std::path::Path;

use polars::prelude::*;

const CPU_COLUMN: &str = "cpu_percent";

/// Mean of the `cpu_percent` column of a process monitor log.
///
/// `None` when there is no log or it has no samples. A log that cannot be read is logged and
/// treated as missing, so it never stops a report.
pub fn mean_cpu_percent(path: &Path) -> Option<f64> {
    if !path.exists() {
        return None;
    }

    match read_mean(path) {
        Ok(mean) => mean,
        Err(e) => {
            log::warn!("Could not read CPU log {}: {e}", path.display());
            None
        }
    }
}

fn read_mean(path: &Path) -> PolarsResult<Option<f64>> {
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    if frame.height() == 0 {
        return Ok(None);
    }

    let cpu = frame
        .column(CPU_COLUMN)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;

    Ok(cpu.mean())
}
