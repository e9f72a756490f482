//! Cross-resampling of a driving event table against an aligned reference.
//!
//! Unlike [`super::resampling`], no new timestamps are produced: every
//! reference column is evaluated at the timestamps dictated by the driving
//! table's first column.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::loaders::{load_text_table, load_time_table};
use crate::core::sentinel::SentinelPolicy;
use crate::core::table::{TextTable, TimeTable};
use crate::core::transforms::interpolate;
use crate::core::writers::write_text_table_csv;

use super::alignment::ALIGNED_TABLE_FILE;
use super::curing::CURING_TABLE_FILE;

/// Name of the merged table written by [`combine_curing_files`].
pub const COMBINED_TABLE_FILE: &str = "sync-curing-plot.csv";

/// Errors that can occur during cross-resampling.
#[derive(Debug, Error)]
pub enum CrossError {
    #[error("reference table needs at least two rows, got {0}")]
    ReferenceTooShort(usize),

    #[error("driving table has no rows")]
    EmptyDriving,

    #[error("missing input file: {0}")]
    MissingInputFile(PathBuf),
}

/// Merged table plus per-row accounting.
#[derive(Debug, Clone, Default)]
pub struct CrossOutcome {
    pub table: TextTable,
    /// Rows before the first or after the last reference timestamp.
    pub out_of_range: usize,
    /// Rows earlier than the current bracket's lower endpoint.
    pub out_of_order: usize,
    /// Rows whose first column is not an integer epoch.
    pub unparsable: usize,
    /// Rows whose bracket collapsed to a single instant.
    pub degenerate: usize,
}

/// Interpolate every reference column at each driving row's timestamp.
///
/// A monotonically advancing cursor tracks the reference bracket. Driving
/// rows outside the reference range are dropped; rows that step backwards
/// behind the current bracket are rejected and counted, never extrapolated.
/// Out-of-range reference values on either bracket endpoint make that
/// column's output the sentinel.
///
/// # Arguments
///
/// * `driving` - Table whose first column carries integer epoch seconds
/// * `reference` - Time-sorted numeric table
/// * `policy` - Validity policy applied to reference values
///
/// # Returns
///
/// A [`CrossOutcome`] whose table has the driving headers followed by the
/// reference column names.
///
/// # Errors
///
/// Returns [`CrossError::ReferenceTooShort`] if the reference has fewer than
/// two rows.
pub fn cross_resample(
    driving: &TextTable,
    reference: &TimeTable,
    policy: &SentinelPolicy,
) -> std::result::Result<CrossOutcome, CrossError> {
    if reference.len() < 2 {
        return Err(CrossError::ReferenceTooShort(reference.len()));
    }

    let mut headers = driving.headers.clone();
    headers.extend(reference.columns.iter().cloned());
    let mut outcome = CrossOutcome {
        table: TextTable::new(headers),
        ..Default::default()
    };

    let ts = &reference.timestamps;
    let mut cursor = 1;

    for row in &driving.rows {
        let t: i64 = match row.first().and_then(|s| s.trim().parse().ok()) {
            Some(t) => t,
            None => {
                log::warn!("skipping driving row without epoch: {:?}", row.first());
                outcome.unparsable += 1;
                continue;
            }
        };

        if t < ts[cursor - 1] {
            if cursor == 1 {
                outcome.out_of_range += 1;
            } else {
                log::warn!(
                    "rejecting out-of-order driving row at t={} (bracket starts at {})",
                    t,
                    ts[cursor - 1]
                );
                outcome.out_of_order += 1;
            }
            continue;
        }

        while cursor < ts.len() && ts[cursor] < t {
            cursor += 1;
        }
        if cursor == ts.len() {
            outcome.out_of_range += 1;
            continue;
        }

        let (lo, hi) = (cursor - 1, cursor);
        let values: std::result::Result<Vec<f64>, _> = (0..reference.num_columns())
            .map(|col| {
                interpolate(
                    ts[lo],
                    policy.classify(reference.rows[lo][col]),
                    ts[hi],
                    policy.classify(reference.rows[hi][col]),
                    t,
                )
            })
            .collect();

        match values {
            Ok(values) => {
                let mut merged = row.clone();
                merged.extend(values.iter().map(|v| v.to_string()));
                outcome.table.rows.push(merged);
            }
            Err(e) => {
                log::warn!("dropping driving row at t={}: {}", t, e);
                outcome.degenerate += 1;
            }
        }
    }

    Ok(outcome)
}

/// Merge `curing-data.csv` with `sync-output-plot.csv` into `sync-curing-plot.csv`.
///
/// # Errors
///
/// Returns [`CrossError::MissingInputFile`] if either input is absent,
/// [`CrossError::EmptyDriving`] if the curing table has no rows, or a
/// loader or writer error.
pub fn combine_curing_files(
    source_dir: &Path,
    target_dir: &Path,
    config: &PipelineConfig,
) -> Result<(PathBuf, CrossOutcome)> {
    let driving_path = source_dir.join(CURING_TABLE_FILE);
    let reference_path = source_dir.join(ALIGNED_TABLE_FILE);

    for path in [&driving_path, &reference_path] {
        if !path.exists() {
            return Err(CrossError::MissingInputFile(path.clone()).into());
        }
    }

    log::info!(
        "Combining {} and {}",
        driving_path.display(),
        reference_path.display()
    );

    let driving = load_text_table(&driving_path)
        .with_context(|| format!("Failed to load curing table: {}", driving_path.display()))?;
    if driving.is_empty() {
        return Err(CrossError::EmptyDriving.into());
    }
    let reference = load_time_table(&reference_path)
        .with_context(|| format!("Failed to load aligned table: {}", reference_path.display()))?;

    let policy = SentinelPolicy::from_config(&config.sampling);
    let outcome = cross_resample(&driving, &reference, &policy)?;

    let output = target_dir.join(COMBINED_TABLE_FILE);
    write_text_table_csv(&output, &outcome.table)
        .with_context(|| format!("Failed to write merged table: {}", output.display()))?;

    log::info!(
        "{} rows merged, {} out of range, {} out of order",
        outcome.table.len(),
        outcome.out_of_range,
        outcome.out_of_order
    );

    Ok((output, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sentinel::SENTINEL_VALUE;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn driving(times: &[&str]) -> TextTable {
        let mut table = TextTable::new(vec!["timestamp".into(), "TSP".into()]);
        for t in times {
            table.rows.push(vec![t.to_string(), "5".into()]);
        }
        table
    }

    fn reference(rows: &[(i64, f64, f64)]) -> TimeTable {
        let mut table = TimeTable::new(vec!["0-0".into(), "0-1".into()]);
        for &(t, a, b) in rows {
            table.push_row(t, vec![a, b]);
        }
        table
    }

    #[test]
    fn test_rows_outside_reference_are_dropped() {
        let reference = reference(&[(100, 10.0, 20.0), (110, 20.0, 40.0)]);
        let outcome = cross_resample(
            &driving(&["95", "105", "115"]),
            &reference,
            &SentinelPolicy::default(),
        )
        .unwrap();

        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.out_of_range, 2);
        assert_eq!(outcome.table.rows[0], vec!["105", "5", "15", "30"]);
        assert_eq!(outcome.table.headers, vec!["timestamp", "TSP", "0-0", "0-1"]);
    }

    #[test]
    fn test_evaluates_at_driving_timestamps() {
        let reference = reference(&[(0, 10.0, 10.0), (10, 20.0, 20.0), (20, 40.0, 40.0)]);
        let outcome = cross_resample(
            &driving(&["0", "2", "10", "15", "20"]),
            &reference,
            &SentinelPolicy::default(),
        )
        .unwrap();

        let values: Vec<&str> = outcome.table.rows.iter().map(|r| r[2].as_str()).collect();
        assert_eq!(values, vec!["10", "12", "20", "30", "40"]);
    }

    #[test]
    fn test_invalid_endpoint_forces_sentinel_per_column() {
        let reference = reference(&[(0, 10.0, SENTINEL_VALUE), (10, 20.0, 30.0)]);
        let outcome =
            cross_resample(&driving(&["5"]), &reference, &SentinelPolicy::default()).unwrap();

        let row = &outcome.table.rows[0];
        assert_eq!(row[2], "15");
        assert_eq!(row[3].parse::<f64>().unwrap(), SENTINEL_VALUE);
    }

    #[test]
    fn test_out_of_order_rows_are_rejected() {
        let reference = reference(&[(0, 10.0, 10.0), (10, 20.0, 20.0), (20, 30.0, 30.0)]);
        let outcome = cross_resample(
            &driving(&["15", "5", "18", "bad"]),
            &reference,
            &SentinelPolicy::default(),
        )
        .unwrap();

        assert_eq!(outcome.table.len(), 2);
        assert_eq!(outcome.out_of_order, 1);
        assert_eq!(outcome.unparsable, 1);
        assert_eq!(outcome.out_of_range, 0);
    }

    #[test]
    fn test_reference_too_short() {
        let reference = reference(&[(0, 10.0, 10.0)]);
        assert!(matches!(
            cross_resample(&driving(&["0"]), &reference, &SentinelPolicy::default()),
            Err(CrossError::ReferenceTooShort(1))
        ));
    }

    #[test]
    fn test_combine_curing_files() {
        let dir = TempDir::new().unwrap();

        let mut curing = File::create(dir.path().join(CURING_TABLE_FILE)).unwrap();
        writeln!(curing, "timestamp,DateTime,TSP").unwrap();
        writeln!(curing, "105,1970-01-01 00:01:45,7").unwrap();
        writeln!(curing, "500,1970-01-01 00:08:20,8").unwrap();

        let mut aligned = File::create(dir.path().join(ALIGNED_TABLE_FILE)).unwrap();
        writeln!(aligned, "timestamp,0-0").unwrap();
        writeln!(aligned, "100,10").unwrap();
        writeln!(aligned, "110,30").unwrap();
        drop(curing);
        drop(aligned);

        let (output, outcome) =
            combine_curing_files(dir.path(), dir.path(), &PipelineConfig::default()).unwrap();

        assert_eq!(outcome.table.len(), 1);
        let content = fs::read_to_string(output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["timestamp,DateTime,TSP,0-0", "105,1970-01-01 00:01:45,7,20"]);
    }

    #[test]
    fn test_combine_requires_both_inputs() {
        let dir = TempDir::new().unwrap();
        let err = combine_curing_files(dir.path(), dir.path(), &PipelineConfig::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CrossError>(),
            Some(CrossError::MissingInputFile(_))
        ));
        assert!(!dir.path().join(COMBINED_TABLE_FILE).exists());
    }
}
