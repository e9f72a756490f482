//! Splitting raw hub logs into per-sensor files, and unit conversion.
//!
//! Each hub logger writes one `temperature{hub}.csv` holding interleaved
//! readings of all its sensors, distinguished by the `addr` column.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::PipelineConfig;
use crate::core::loaders::{load_hub_csv, HubRecord, LoaderError};
use crate::core::table::TextTable;
use crate::core::transforms::celsius_to_fahrenheit;
use crate::core::writers::write_text_table_csv;

use super::alignment::sensor_file_name;

/// Raw hub file name.
pub fn hub_file_name(hub: usize) -> String {
    format!("temperature{}.csv", hub)
}

/// Per-hub outcome of a split run.
#[derive(Debug, Clone, Default)]
pub struct HubSummary {
    pub hub: usize,
    pub path: PathBuf,
    /// Rows written across all sensor files of this hub.
    pub kept: usize,
    /// Rows with a negative or unparsable value, or an unknown address.
    pub dropped: usize,
    /// Set when the hub file was absent or unreadable.
    pub skipped: Option<String>,
}

/// Distribute hub records over `sensors` per-sensor tables.
///
/// Returns the tables, indexed by address, and the number of dropped records.
pub fn split_records(records: &[HubRecord], sensors: usize) -> (Vec<TextTable>, usize) {
    let mut tables: Vec<TextTable> = (0..sensors)
        .map(|_| TextTable::new(vec!["timestamp".into(), "value".into()]))
        .collect();
    let mut dropped = 0;

    for record in records {
        let valid_value = !record.value.is_nan() && record.value >= 0.0;
        let addr = usize::try_from(record.addr).ok().filter(|&a| a < sensors);

        match (valid_value, addr) {
            (true, Some(a)) => tables[a]
                .rows
                .push(vec![record.timestamp.clone(), record.value.to_string()]),
            _ => dropped += 1,
        }
    }

    (tables, dropped)
}

/// Split every declared hub file into `sensor-t-{hub}-{addr}.csv` files.
///
/// A missing hub file or one with a malformed header is logged and skipped;
/// other hubs are still processed.
pub fn split_hub_files(
    source_dir: &Path,
    target_dir: &Path,
    config: &PipelineConfig,
) -> Result<Vec<HubSummary>> {
    let sensors = config.sources.sensors_per_hub;
    let mut summaries = Vec::with_capacity(config.sources.hub_count);

    for hub in 0..config.sources.hub_count {
        let path = source_dir.join(hub_file_name(hub));
        let mut summary = HubSummary {
            hub,
            path: path.clone(),
            ..Default::default()
        };

        if !path.exists() {
            log::warn!("Failed to find {}", path.display());
            summary.skipped = Some("missing".into());
            summaries.push(summary);
            continue;
        }

        log::info!("Parsing {}", path.display());
        let records = match load_hub_csv(&path) {
            Ok(records) => records,
            Err(e @ LoaderError::MalformedHeader { .. }) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                summary.skipped = Some(e.to_string());
                summaries.push(summary);
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to load {}", path.display()))
            }
        };

        let (tables, dropped) = split_records(&records, sensors);
        for (addr, table) in tables.iter().enumerate() {
            let out = target_dir.join(sensor_file_name(&format!("{}-{}", hub, addr)));
            write_text_table_csv(&out, table)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            summary.kept += table.len();
        }
        summary.dropped = dropped;
        summaries.push(summary);
    }

    Ok(summaries)
}

/// Rewrite each `temperature{hub}.csv` as `f-temperature{hub}.csv` in Fahrenheit.
///
/// Rows with unparsable values are dropped. Returns the files written.
pub fn convert_hub_units(
    source_dir: &Path,
    target_dir: &Path,
    config: &PipelineConfig,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for hub in 0..config.sources.hub_count {
        let name = hub_file_name(hub);
        let path = source_dir.join(&name);
        if !path.exists() {
            log::warn!("Failed to find {}", path.display());
            continue;
        }

        let records = match load_hub_csv(&path) {
            Ok(records) => records,
            Err(e @ LoaderError::MalformedHeader { .. }) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to load {}", path.display()))
            }
        };

        let mut table = TextTable::new(vec!["timestamp".into(), "addr".into(), "value".into()]);
        table.rows.extend(records.iter().filter(|r| !r.value.is_nan()).map(|r| {
            vec![
                r.timestamp.clone(),
                r.addr.to_string(),
                celsius_to_fahrenheit(r.value).to_string(),
            ]
        }));

        let out = target_dir.join(format!("f-{}", name));
        write_text_table_csv(&out, &table)
            .with_context(|| format!("Failed to write {}", out.display()))?;
        log::info!("{} -> {} ({} rows)", path.display(), out.display(), table.len());
        written.push(out);
    }

    Ok(written)
}
