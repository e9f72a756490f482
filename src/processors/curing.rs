//! Normalization of raw process-control (curing) logs.
//!
//! The controller exports `Calc*.csv` files with three junk lines around the
//! header row and separate date and time columns. This module purges those
//! lines, keeps the process channels of interest and prefixes every row with
//! an integer epoch so the result can drive [`super::cross::cross_resample`].

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use regex::Regex;

use crate::config::PipelineConfig;
use crate::core::clock::EpochClock;
use crate::core::loaders::LoaderError;
use crate::core::table::TextTable;
use crate::core::writers::write_text_table_csv;

/// Name of the normalized table written by [`parse_curing_files`].
pub const CURING_TABLE_FILE: &str = "curing-data.csv";

/// Channels always carried over when present.
pub const FIXED_CHANNELS: [&str; 12] = [
    "Seg", "TSP", "HOT", "COLD", "ASP", "AMV", "TTA1", "TTA2", "PSP", "PMV", "VSPA", "VMVA",
];

/// Physical lines dropped before parsing; line 2 is the header.
const PURGED_LINES: [usize; 3] = [0, 1, 3];

/// Result of normalizing one curing log.
#[derive(Debug, Clone)]
pub struct CuringReport {
    pub source: PathBuf,
    pub purged: PathBuf,
    pub output: PathBuf,
    /// Kept channel names, in original column order.
    pub channels: Vec<String>,
    pub rows: usize,
    /// Rows dropped because their date/time did not parse.
    pub skipped: usize,
}

/// Selects which raw header columns to keep.
#[derive(Debug, Clone)]
pub struct ChannelFilter {
    patterns: Vec<Regex>,
}

impl ChannelFilter {
    pub fn new() -> Result<Self> {
        let patterns = [r"^T\d*$", r"^V\d*$"]
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("Invalid channel pattern: {}", p)))
            .collect::<Result<_>>()?;
        Ok(Self { patterns })
    }

    pub fn keeps(&self, name: &str) -> bool {
        FIXED_CHANNELS.contains(&name) || self.patterns.iter().any(|re| re.is_match(name))
    }
}

/// Find the first `Calc*.csv` file in `dir`, by sorted name.
pub fn find_curing_log(dir: &Path) -> Result<Option<PathBuf>> {
    let pattern = Regex::new(r"^Calc[[:ascii:]]*\.csv$")?;

    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| pattern.is_match(n))
        })
        .collect();

    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Copy `input` to `output` without the purged physical lines.
///
/// Bytes that are not valid UTF-8 are replaced, since controller exports are
/// not guaranteed to be UTF-8.
pub fn purge_lines(input: &Path, output: &Path) -> Result<usize> {
    let raw = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let text = String::from_utf8_lossy(&raw);

    let file = File::create(output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    let mut kept = 0;
    for (line_number, line) in text.lines().enumerate() {
        if PURGED_LINES.contains(&line_number) {
            continue;
        }
        writeln!(writer, "{}", line)?;
        kept += 1;
    }

    writer.flush()?;
    Ok(kept)
}

/// Turn a purged curing log into the normalized table.
///
/// Output header is `timestamp,DateTime,<kept channels>`. Each row carries the
/// epoch of `"<Fecha> <Hora>"`, that text itself, then the trimmed channel
/// fields.
///
/// # Errors
///
/// Returns [`LoaderError::MalformedHeader`] if `Fecha` or `Hora` is missing.
pub fn convert_curing_log(
    purged: &Path,
    clock: &EpochClock,
    filter: &ChannelFilter,
) -> Result<(TextTable, usize)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(purged)
        .with_context(|| format!("Failed to open {}", purged.display()))?;

    let raw_headers = reader.headers()?.clone();
    let position = |column: &str| {
        raw_headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| LoaderError::MalformedHeader {
                path: purged.to_path_buf(),
                column: column.to_string(),
            })
    };
    let fecha = position("Fecha")?;
    let hora = position("Hora")?;

    let kept: Vec<(usize, String)> = raw_headers
        .iter()
        .enumerate()
        .map(|(i, h)| (i, h.trim().to_string()))
        .filter(|(_, h)| filter.keeps(h))
        .collect();

    let mut headers = vec!["timestamp".to_string(), "DateTime".to_string()];
    headers.extend(kept.iter().map(|(_, h)| h.clone()));
    let mut table = TextTable::new(headers);
    let mut skipped = 0;

    for result in reader.records() {
        let record = result?;
        let date_time = format!(
            "{} {}",
            record.get(fecha).unwrap_or_default().trim(),
            record.get(hora).unwrap_or_default().trim()
        );

        let timestamp = match clock.parse(&date_time) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("{}: skipping row: {}", purged.display(), e);
                skipped += 1;
                continue;
            }
        };

        let mut row = Vec::with_capacity(kept.len() + 2);
        row.push(timestamp.to_string());
        row.push(date_time);
        row.extend(
            kept.iter()
                .map(|(i, _)| record.get(*i).unwrap_or_default().trim().to_string()),
        );
        table.rows.push(row);
    }

    Ok((table, skipped))
}

/// Normalize the first curing log found in `source_dir`.
///
/// Writes `tmp_<name>` and `curing-data.csv` into `target_dir`. Returns
/// `Ok(None)` when no curing log exists.
pub fn parse_curing_files(
    source_dir: &Path,
    target_dir: &Path,
    config: &PipelineConfig,
) -> Result<Option<CuringReport>> {
    let source = match find_curing_log(source_dir)? {
        Some(path) => path,
        None => {
            log::warn!("No Calc*.csv file found in {}", source_dir.display());
            return Ok(None);
        }
    };

    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let purged = target_dir.join(format!("tmp_{}", name));
    let output = target_dir.join(CURING_TABLE_FILE);

    log::info!("Parsing {}", source.display());
    purge_lines(&source, &purged)?;

    let clock = EpochClock::from_config(&config.clock)?;
    let filter = ChannelFilter::new()?;
    let (table, skipped) = convert_curing_log(&purged, &clock, &filter)?;

    write_text_table_csv(&output, &table)
        .with_context(|| format!("Failed to write curing table: {}", output.display()))?;
    log::info!("{} ==> {} ({} rows)", purged.display(), output.display(), table.len());

    Ok(Some(CuringReport {
        source,
        purged,
        output,
        channels: table.headers[2..].to_vec(),
        rows: table.len(),
        skipped,
    }))
}
