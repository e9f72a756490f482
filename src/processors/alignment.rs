//! Alignment of independently resampled streams onto one shared grid.
//!
//! The file-level entry point [`sync_sensor_files`] reads every declared
//! `sensor-t-{hub}-{addr}.csv`, resamples them in parallel, writes one
//! `sync-sensor-t-{hub}-{addr}.csv` per sensor and assembles the wide
//! `sync-output-plot.csv` table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::clock::EpochClock;
use crate::core::loaders::{load_sensor_stream, SensorStream};
use crate::core::sentinel::{SentinelPolicy, SENTINEL_VALUE};
use crate::core::table::TimeTable;
use crate::core::writers::{write_stream_csv, write_time_table_csv};

use super::resampling::{resample_all, ResampleError, ResampledStream, TimeWindow};

/// Name of the aligned wide table written by [`sync_sensor_files`].
pub const ALIGNED_TABLE_FILE: &str = "sync-output-plot.csv";

/// A table whose rows share one uniform grid across all value columns.
pub type AlignedTable = TimeTable;

/// Errors that can occur while aligning streams.
#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("missing input file for sensor {id}: {path}")]
    MissingInputFile { id: String, path: PathBuf },

    #[error("no stream produced resampled data")]
    NoData,

    #[error(transparent)]
    Resample(#[from] ResampleError),
}

/// Outcome of a file-level sync run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Declared sensors processed.
    pub streams: usize,
    /// Sensors that produced at least one grid point.
    pub with_data: usize,
    /// Columns in the aligned table.
    pub columns: usize,
    /// Rows in the aligned table.
    pub rows: usize,
    /// Shared grid range.
    pub window: TimeWindow,
    /// Path of the aligned table.
    pub output: PathBuf,
}

/// Input file name for one sensor.
pub fn sensor_file_name(id: &str) -> String {
    format!("sensor-t-{}.csv", id)
}

/// Resampled output file name for one sensor.
pub fn synced_file_name(id: &str) -> String {
    format!("sync-sensor-t-{}.csv", id)
}

/// Assemble resampled streams into one aligned table.
///
/// The grid runs from the earliest start to the latest end over all streams
/// that emitted data. Every column is padded with [`SENTINEL_VALUE`] outside
/// its own observed range. Streams with raw records but no emitted points
/// become all-sentinel columns; streams without any raw record are dropped.
/// Column order follows `streams`.
///
/// # Arguments
///
/// * `streams` - Resampled streams, all on the same `period` grid
/// * `period` - Grid spacing in seconds
///
/// # Errors
///
/// Returns [`AlignmentError::NoData`] if no stream emitted any point, and
/// [`ResampleError::InvalidPeriod`] for a non-positive period.
pub fn align_streams(
    streams: &[ResampledStream],
    period: i64,
) -> std::result::Result<AlignedTable, AlignmentError> {
    if period <= 0 {
        return Err(ResampleError::InvalidPeriod(period).into());
    }

    let window = streams
        .iter()
        .filter_map(|s| s.window)
        .reduce(|a, b| a.union(&b))
        .ok_or(AlignmentError::NoData)?;

    let kept: Vec<&ResampledStream> = streams.iter().filter(|s| s.raw_count > 0).collect();
    for s in streams.iter().filter(|s| s.raw_count == 0) {
        log::info!("{}: no records, dropped from aligned table", s.id);
    }

    let lookups: Vec<HashMap<i64, f64>> = kept
        .iter()
        .map(|s| s.points.iter().copied().collect())
        .collect();

    let columns: Vec<String> = kept.iter().map(|s| s.id.clone()).collect();
    let num_rows = ((window.end - window.start) / period + 1) as usize;
    let mut table = AlignedTable::with_capacity(columns, num_rows);

    let mut t = window.start;
    while t <= window.end {
        let row = kept
            .iter()
            .zip(lookups.iter())
            .map(|(stream, lookup)| match stream.window {
                Some(w) if w.contains(t) => lookup.get(&t).copied().unwrap_or(SENTINEL_VALUE),
                _ => SENTINEL_VALUE,
            })
            .collect();
        table.push_row(t, row);
        t += period;
    }

    Ok(table)
}

/// Resample every declared sensor file and write the aligned table.
///
/// All declared input files are checked before anything is written; one
/// missing file aborts the run with no output.
///
/// # Arguments
///
/// * `source_dir` - Directory holding `sensor-t-*.csv`
/// * `target_dir` - Directory receiving the synced files
/// * `config` - Pipeline configuration
///
/// # Errors
///
/// Returns [`AlignmentError::MissingInputFile`] for an absent sensor file,
/// [`AlignmentError::NoData`] if nothing could be resampled, or an I/O error.
pub fn sync_sensor_files(
    source_dir: &Path,
    target_dir: &Path,
    config: &PipelineConfig,
) -> Result<SyncReport> {
    let ids = config.sources.sensor_ids();
    let clock = EpochClock::from_config(&config.clock)?;
    let policy = SentinelPolicy::from_config(&config.sampling);
    let period = config.sampling.period_secs;

    let inputs: Vec<(String, PathBuf)> = ids
        .into_iter()
        .map(|id| {
            let path = source_dir.join(sensor_file_name(&id));
            (id, path)
        })
        .collect();

    if let Some((id, path)) = inputs.iter().find(|(_, path)| !path.exists()) {
        return Err(AlignmentError::MissingInputFile {
            id: id.clone(),
            path: path.clone(),
        }
        .into());
    }

    let streams: Vec<SensorStream> = inputs
        .par_iter()
        .map(|(id, path)| {
            load_sensor_stream(path, id, &clock)
                .with_context(|| format!("Failed to load sensor file: {}", path.display()))
        })
        .collect::<Result<_>>()?;

    let resampled = resample_all(&streams, period, &policy)?;
    let table = align_streams(&resampled, period)?;

    for stream in &resampled {
        match stream.window {
            Some(w) => log::info!(
                "{}: {} points [{} .. {}], {} rejected, {} dropped",
                stream.id,
                stream.points.len(),
                w.start,
                w.end,
                stream.rejected,
                stream.dropped
            ),
            None => log::warn!("{}: no data ({} raw records)", stream.id, stream.raw_count),
        }

        let out = target_dir.join(synced_file_name(&stream.id));
        write_stream_csv(&out, &stream.points)
            .with_context(|| format!("Failed to write synced file: {}", out.display()))?;
    }

    let output = target_dir.join(ALIGNED_TABLE_FILE);
    write_time_table_csv(&output, &table)
        .with_context(|| format!("Failed to write aligned table: {}", output.display()))?;

    let window = TimeWindow {
        start: table.first_timestamp().unwrap_or_default(),
        end: table.last_timestamp().unwrap_or_default(),
    };
    log::info!(
        "Aligned {} columns over [{} .. {}], {} rows",
        table.num_columns(),
        window.start,
        window.end,
        table.len()
    );

    Ok(SyncReport {
        streams: resampled.len(),
        with_data: resampled.iter().filter(|s| s.has_data()).count(),
        columns: table.num_columns(),
        rows: table.len(),
        window,
        output,
    })
}
