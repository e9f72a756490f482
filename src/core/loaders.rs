//! Data loaders for raw logger files and resampled tables.
//!
//! This module provides parsers for:
//! - Raw hub CSV files (timestamp text, sensor address, value)
//! - Per-sensor stream CSV files (timestamp text or epoch, value)
//! - Numeric time tables (integer epoch column followed by value columns)
//! - Pass-through text tables

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;

use super::clock::EpochClock;
use super::table::{TextTable, TimeTable};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Malformed header in {path}: missing column '{column}'")]
    MalformedHeader { path: PathBuf, column: String },

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One timestamped reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Raw value; unparsable fields are carried as NaN.
    pub value: f64,
}

impl Sample {
    #[inline]
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered readings of one sensor.
#[derive(Debug, Clone, Default)]
pub struct SensorStream {
    /// Sensor id, `"{hub}-{addr}"`.
    pub id: String,
    /// Samples in file order.
    pub samples: Vec<Sample>,
    /// Rows whose timestamp could not be parsed.
    pub skipped_rows: usize,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl SensorStream {
    pub fn new(id: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self {
            id: id.into(),
            samples,
            skipped_rows: 0,
            source_path: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One row of a raw hub file.
#[derive(Debug, Clone, PartialEq)]
pub struct HubRecord {
    /// Timestamp text, kept verbatim.
    pub timestamp: String,
    /// Sensor address within the hub.
    pub addr: i64,
    /// Raw value; unparsable fields are carried as NaN.
    pub value: f64,
}

fn open_csv(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file)))
}

/// Map header names to column indices, failing on the first missing one.
fn require_columns(path: &Path, headers: &StringRecord, names: &[&str]) -> Result<Vec<usize>> {
    let col_map: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name, i))
        .collect();

    names
        .iter()
        .map(|name| {
            col_map
                .get(name)
                .copied()
                .ok_or_else(|| LoaderError::MalformedHeader {
                    path: path.to_path_buf(),
                    column: name.to_string(),
                })
        })
        .collect()
}

#[inline]
fn parse_f64(field: Option<&str>) -> f64 {
    field.and_then(|s| s.parse().ok()).unwrap_or(f64::NAN)
}

/// Load a raw hub CSV file with `timestamp`, `addr` and `value` columns.
///
/// Rows with an unparsable address are skipped. Unparsable values are kept as
/// NaN so the caller's validity rules reject them.
///
/// # Errors
///
/// Returns [`LoaderError::MalformedHeader`] if a required column is absent.
pub fn load_hub_csv<P: AsRef<Path>>(path: P) -> Result<Vec<HubRecord>> {
    let path = path.as_ref();
    let mut reader = open_csv(path)?;

    let headers = reader.headers()?.clone();
    let idx = require_columns(path, &headers, &["timestamp", "addr", "value"])?;
    let (ts_idx, addr_idx, value_idx) = (idx[0], idx[1], idx[2]);

    let mut records = Vec::with_capacity(4096);
    for result in reader.records() {
        let record = result?;

        let addr: i64 = match record.get(addr_idx).and_then(|s| s.parse().ok()) {
            Some(a) => a,
            None => {
                log::debug!("{}: unparsable addr in {:?}", path.display(), record);
                continue;
            }
        };

        records.push(HubRecord {
            timestamp: record.get(ts_idx).unwrap_or_default().to_string(),
            addr,
            value: parse_f64(record.get(value_idx)),
        });
    }

    Ok(records)
}

/// Load one sensor stream from a CSV file with `timestamp` and `value` columns.
///
/// Timestamps are parsed with `clock`. Rows whose timestamp cannot be parsed
/// cannot be placed on the time axis; they are counted in
/// [`SensorStream::skipped_rows`] and dropped.
///
/// # Arguments
///
/// * `path` - Path to the stream CSV file
/// * `id` - Sensor id recorded on the stream
/// * `clock` - Timestamp parser
///
/// # Errors
///
/// Returns an error if the file cannot be read or lacks required columns.
pub fn load_sensor_stream<P: AsRef<Path>>(
    path: P,
    id: &str,
    clock: &EpochClock,
) -> Result<SensorStream> {
    let path = path.as_ref();
    let mut reader = open_csv(path)?;

    let headers = reader.headers()?.clone();
    let idx = require_columns(path, &headers, &["timestamp", "value"])?;
    let (ts_idx, value_idx) = (idx[0], idx[1]);

    let mut samples = Vec::with_capacity(4096);
    let mut skipped_rows = 0;

    for result in reader.records() {
        let record = result?;
        let text = record.get(ts_idx).unwrap_or_default();

        let timestamp = match text.parse::<i64>() {
            Ok(t) => t,
            Err(_) => match clock.parse(text) {
                Ok(t) => t,
                Err(e) => {
                    log::debug!("{}: {}", path.display(), e);
                    skipped_rows += 1;
                    continue;
                }
            },
        };

        samples.push(Sample::new(timestamp, parse_f64(record.get(value_idx))));
    }

    Ok(SensorStream {
        id: id.to_string(),
        samples,
        skipped_rows,
        source_path: Some(path.to_path_buf()),
    })
}

/// Load a numeric table whose first column is an integer epoch.
///
/// The first header names the timestamp column; every further header becomes
/// a value column. Unparsable value fields become NaN; rows with an
/// unparsable timestamp are skipped.
///
/// # Errors
///
/// Returns [`LoaderError::EmptyFile`] if the file has no header row.
pub fn load_time_table<P: AsRef<Path>>(path: P) -> Result<TimeTable> {
    let path = path.as_ref();
    let mut reader = open_csv(path)?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let columns: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();
    let mut table = TimeTable::with_capacity(columns, 8192);

    for result in reader.records() {
        let record = result?;

        let timestamp: i64 = match record.get(0).and_then(|s| s.parse().ok()) {
            Some(t) => t,
            None => {
                log::debug!("{}: skipping row without epoch: {:?}", path.display(), record);
                continue;
            }
        };

        let values: Vec<f64> = record.iter().skip(1).map(|s| parse_f64(Some(s))).collect();
        table.push_row(timestamp, values);
    }

    Ok(table)
}

/// Load any CSV file as strings, keeping the header row.
///
/// # Errors
///
/// Returns [`LoaderError::EmptyFile`] if the file has no header row.
pub fn load_text_table<P: AsRef<Path>>(path: P) -> Result<TextTable> {
    let path = path.as_ref();
    let mut reader = open_csv(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    if headers.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let mut table = TextTable::new(headers);
    for result in reader.records() {
        let record = result?;
        table.rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_hub_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,addr,value").unwrap();
        writeln!(file, "2020-03-01 12:00:00,0,25.5").unwrap();
        writeln!(file, "2020-03-01 12:00:01,x,26.0").unwrap();
        writeln!(file, "2020-03-01 12:00:02,3,bad").unwrap();
        file.flush().unwrap();

        let records = load_hub_csv(file.path())?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, "2020-03-01 12:00:00");
        assert_eq!(records[0].addr, 0);
        assert_eq!(records[0].value, 25.5);
        assert_eq!(records[1].addr, 3);
        assert!(records[1].value.is_nan());

        Ok(())
    }

    #[test]
    fn test_load_hub_csv_malformed_header() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time,addr,value").unwrap();
        writeln!(file, "2020-03-01 12:00:00,0,25.5").unwrap();
        file.flush().unwrap();

        match load_hub_csv(file.path()) {
            Err(LoaderError::MalformedHeader { column, .. }) => assert_eq!(column, "timestamp"),
            other => panic!("Expected MalformedHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_load_sensor_stream_parses_text_and_epoch() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,value").unwrap();
        writeln!(file, "1970-01-01 00:00:03,10.0").unwrap();
        writeln!(file, "14,11.0").unwrap();
        writeln!(file, "yesterday,12.0").unwrap();
        file.flush().unwrap();

        let stream = load_sensor_stream(file.path(), "0-1", &EpochClock::default())?;
        assert_eq!(stream.id, "0-1");
        assert_eq!(stream.samples, vec![Sample::new(3, 10.0), Sample::new(14, 11.0)]);
        assert_eq!(stream.skipped_rows, 1);

        Ok(())
    }

    #[test]
    fn test_load_time_table() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,0-0,0-1").unwrap();
        writeln!(file, "100,20.0,9999.0").unwrap();
        writeln!(file, "110,21.0,").unwrap();
        writeln!(file, "oops,1,2").unwrap();
        file.flush().unwrap();

        let table = load_time_table(file.path())?;
        assert_eq!(table.columns, vec!["0-0", "0-1"]);
        assert_eq!(table.timestamps, vec![100, 110]);
        assert_eq!(table.rows[0], vec![20.0, 9999.0]);
        assert!(table.rows[1][1].is_nan());

        Ok(())
    }

    #[test]
    fn test_load_text_table() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,DateTime,TSP").unwrap();
        writeln!(file, "100,2020-03-01 12:00:00, 5 ").unwrap();
        file.flush().unwrap();

        let table = load_text_table(file.path())?;
        assert_eq!(table.headers, vec!["timestamp", "DateTime", "TSP"]);
        assert_eq!(table.rows[0], vec!["100", "2020-03-01 12:00:00", "5"]);
        assert_eq!(table.column_index("TSP"), Some(2));

        Ok(())
    }
}
