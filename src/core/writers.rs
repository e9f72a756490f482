//! Data writers for CSV tables and VTK volumes.
//!
//! This module provides functions for writing pipeline outputs:
//! - Resampled single-sensor streams (`timestamp,value`)
//! - Aligned and merged tables with an integer epoch column
//! - Pass-through text tables
//! - Legacy-format VTK structured points with one scalar array

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::table::{TextTable, TimeTable};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Lattice dimensions disagree with the number of values.
    #[error("lattice size mismatch: dimensions give {expected} points, got {actual} values")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Creates a CSV writer over a buffered file, creating parent directories first.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    Ok(csv::Writer::from_writer(create_buffered_writer(path)?))
}

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> WriteError + '_ {
    move |source| WriteError::CsvError {
        path: path.display().to_string(),
        source,
    }
}

fn write_error(path: &Path) -> impl Fn(std::io::Error) -> WriteError + '_ {
    move |source| WriteError::WriteFile {
        path: path.display().to_string(),
        source,
    }
}

/// Write a resampled stream as `timestamp,value` rows.
///
/// # Example
///
/// ```no_run
/// use oven_sync::core::writers::write_stream_csv;
/// use std::path::Path;
///
/// write_stream_csv(Path::new("sync-sensor-t-0-0.csv"), &[(10, 21.5), (20, 22.0)]).unwrap();
/// ```
pub fn write_stream_csv(path: &Path, points: &[(i64, f64)]) -> Result<()> {
    let mut csv_writer = create_csv_writer(path)?;

    csv_writer
        .write_record(["timestamp", "value"])
        .map_err(csv_error(path))?;

    for (timestamp, value) in points {
        csv_writer
            .write_record(&[timestamp.to_string(), value.to_string()])
            .map_err(csv_error(path))?;
    }

    csv_writer.flush().map_err(write_error(path))?;
    Ok(())
}

/// Write a numeric time table with a leading `timestamp` column.
pub fn write_time_table_csv(path: &Path, table: &TimeTable) -> Result<()> {
    let mut csv_writer = create_csv_writer(path)?;

    let mut header = Vec::with_capacity(table.num_columns() + 1);
    header.push("timestamp".to_string());
    header.extend(table.columns.iter().cloned());
    csv_writer.write_record(&header).map_err(csv_error(path))?;

    let mut record = Vec::with_capacity(header.len());
    for (timestamp, row) in table.timestamps.iter().zip(table.rows.iter()) {
        record.clear();
        record.push(timestamp.to_string());
        record.extend(row.iter().map(|v| v.to_string()));
        csv_writer.write_record(&record).map_err(csv_error(path))?;
    }

    csv_writer.flush().map_err(write_error(path))?;
    Ok(())
}

/// Write a text table verbatim, header first.
pub fn write_text_table_csv(path: &Path, table: &TextTable) -> Result<()> {
    let mut csv_writer = create_csv_writer(path)?;

    csv_writer
        .write_record(&table.headers)
        .map_err(csv_error(path))?;
    for row in &table.rows {
        csv_writer.write_record(row).map_err(csv_error(path))?;
    }

    csv_writer.flush().map_err(write_error(path))?;
    Ok(())
}

/// Write a scalar field as legacy ASCII VTK structured points.
///
/// The header declares the lattice dimensions, a zero origin and unit
/// spacing, followed by one value per line with x varying fastest, then y,
/// then z.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `dims` - Lattice dimensions `[nx, ny, nz]`
/// * `values` - Row-major values, `nx * ny * nz` entries
/// * `scalar_name` - Name of the scalar array
///
/// # Errors
///
/// Returns an error if the value count disagrees with `dims` or the file
/// cannot be written.
pub fn write_vtk_structured_points(
    path: &Path,
    dims: [usize; 3],
    values: &[f64],
    scalar_name: &str,
) -> Result<()> {
    let expected = dims[0] * dims[1] * dims[2];
    if values.len() != expected {
        return Err(WriteError::LengthMismatch {
            expected,
            actual: values.len(),
        });
    }

    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;
    let to_err = write_error(path);

    write!(
        writer,
        "# vtk DataFile Version 1.0\n\
         {name} field\n\
         ASCII\n\
         DATASET STRUCTURED_POINTS\n\
         DIMENSIONS {nx} {ny} {nz}\n\
         ORIGIN 0.0 0.0 0.0\n\
         SPACING 1.0 1.0 1.0\n\
         \n\
         POINT_DATA {points}\n\
         \n\
         SCALARS {name} float\n\
         LOOKUP_TABLE default\n",
        name = scalar_name,
        nx = dims[0],
        ny = dims[1],
        nz = dims[2],
        points = expected,
    )
    .map_err(&to_err)?;

    for v in values {
        writeln!(writer, "{}", v).map_err(&to_err)?;
    }

    writer.flush().map_err(&to_err)?;
    Ok(())
}
