// MetricsStore: append-only CSV of samples with a per-row schema version.
// Also writes the derived tables (aggregated, summary, statistics).

use crate::error::Result;
use crate::models::{METRICS_VERSION, SAMPLE_COLUMNS, Sample};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{instrument, warn};

pub const METRICS_FILE_NAME: &str = "metrics.csv";
pub const AGGREGATED_FILE_NAME: &str = "aggregated.csv";
pub const SUMMARY_FILE_NAME: &str = "summary.csv";
pub const STATISTICS_FILE_NAME: &str = "statistics.csv";
pub const CASE_INFO_FILE_NAME: &str = "case-info.json";

/// Single writer of one MetricsStore. Rows are flushed as they are appended so a
/// crashed run still leaves every completed sample on disk.
pub struct MetricsWriter<W: Write = File> {
    inner: csv::Writer<W>,
    header_written: bool,
}

impl MetricsWriter<File> {
    /// Creates (truncates) the store at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::from_writer(File::create(path)?))
    }
}

impl<W: Write> MetricsWriter<W> {
    pub fn from_writer(w: W) -> Self {
        Self {
            inner: csv::WriterBuilder::new().has_headers(false).from_writer(w),
            header_written: false,
        }
    }

    /// Emits the column names. Only the first call writes.
    pub fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.inner.write_record(SAMPLE_COLUMNS)?;
        self.inner.flush()?;
        self.header_written = true;
        Ok(())
    }

    pub fn append(&mut self, sample: &Sample) -> Result<()> {
        self.write_header()?;
        self.inner.serialize(sample)?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        self.inner
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }
}

/// Writes `rows` under an explicit header to a fresh file at `path`.
#[instrument(skip_all, fields(operation = "write_table", path = %path.display(), rows = rows.len()))]
pub fn write_table<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> Result<()> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    w.write_record(columns)?;
    for row in rows {
        w.serialize(row)?;
    }
    w.flush()?;
    Ok(())
}

/// Strict read of a derived table: the first bad row is an error.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut out = Vec::new();
    for row in reader.deserialize() {
        out.push(row?);
    }
    Ok(out)
}

/// Reads every sample of a store. Unparseable rows and rows written by a newer schema
/// are skipped with a warning; a missing file is an `Io` error.
#[instrument(skip_all, fields(operation = "read_samples", path = %path.display()))]
pub fn read_samples(path: &Path) -> Result<Vec<Sample>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut out = Vec::new();
    for (i, row) in reader.deserialize::<Sample>().enumerate() {
        // header is line 1
        let line = i + 2;
        match row {
            Ok(sample) if sample.version > METRICS_VERSION => {
                warn!(
                    line,
                    version = sample.version,
                    supported = METRICS_VERSION,
                    "unsupported schema version, row skipped"
                );
            }
            Ok(sample) => out.push(sample),
            Err(e) => {
                warn!(line, error = %e, "corrupt metrics row skipped");
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CounterSnapshot;

    #[test]
    fn header_is_written_once() {
        let mut w = MetricsWriter::from_writer(Vec::new());
        w.write_header().unwrap();
        w.write_header().unwrap();
        w.append(&Sample::initial(1, &CounterSnapshot::default()))
            .unwrap();
        let out = String::from_utf8(w.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("index,step,timestamp,version,cpu_user"));
        assert!(lines[0].ends_with("network_received_drop,network_sent_drop"));
    }

    #[test]
    fn absent_counters_are_empty_columns() {
        let mut w = MetricsWriter::from_writer(Vec::new());
        w.append(&Sample::initial(1, &CounterSnapshot::default()))
            .unwrap();
        let out = String::from_utf8(w.into_inner().unwrap()).unwrap();
        let row = out.lines().nth(1).unwrap();
        let cols: Vec<&str> = row.split(',').collect();
        assert_eq!(cols.len(), SAMPLE_COLUMNS.len());
        assert_eq!(cols[12], "");
        assert_eq!(cols[26], "");
    }
}
