//! Line charts of aligned sensor tables.
//!
//! This module renders every column of an aligned table as one line over
//! time using the plotters library. Sentinel samples are gaps: the line is
//! broken around them instead of spiking to the marker value.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::sentinel::SentinelPolicy;
use crate::core::table::TimeTable;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Empty table")]
    EmptyTable,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1080;

/// Color palette, cycled over columns.
const LINE_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),   // Red
    (55, 126, 184),  // Blue
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (153, 153, 153), // Gray
    (0, 206, 209),   // Turquoise
    (138, 43, 226),  // Blue Violet
    (50, 205, 50),   // Lime Green
    (0, 191, 255),   // Deep Sky Blue
];

/// Split one column into runs of consecutive valid samples.
pub fn valid_segments(
    timestamps: &[i64],
    values: &[f64],
    policy: &SentinelPolicy,
) -> Vec<Vec<(i64, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();

    for (&t, &v) in timestamps.iter().zip(values.iter()) {
        if policy.is_valid(v) {
            current.push((t, v));
        } else if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

/// Plot every column of `table` against time and save as PNG.
///
/// No axis labels or titles are drawn; the image carries lines only.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `table` - Aligned table to plot
/// * `policy` - Validity policy deciding which samples are gaps
///
/// # Errors
///
/// Returns [`VisualizationError::EmptyTable`] if the table has no rows.
pub fn plot_aligned_table(
    output_path: &Path,
    table: &TimeTable,
    policy: &SentinelPolicy,
) -> Result<()> {
    let (t_min, t_max) = match (table.first_timestamp(), table.last_timestamp()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(VisualizationError::EmptyTable),
    };

    let series: Vec<Vec<Vec<(i64, f64)>>> = (0..table.num_columns())
        .map(|col| valid_segments(&table.timestamps, &table.column_values(col), policy))
        .collect();

    let (v_min, v_max) = compute_bounds(&series);
    let v_padding = (v_max - v_min) * 0.05;
    let t_max = if t_max == t_min { t_min + 1 } else { t_max };

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT))
        .into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(t_min..t_max, (v_min - v_padding)..(v_max + v_padding))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    for (col, segments) in series.iter().enumerate() {
        let c = LINE_COLORS[col % LINE_COLORS.len()];
        let color = RGBColor(c.0, c.1, c.2);

        for segment in segments {
            chart
                .draw_series(LineSeries::new(segment.iter().copied(), color.stroke_width(2)))
                .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
        }
    }

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Compute the value range over all segments.
fn compute_bounds(series: &[Vec<Vec<(i64, f64)>>]) -> (f64, f64) {
    let mut v_min = f64::MAX;
    let mut v_max = f64::MIN;

    for (_, v) in series.iter().flatten().flatten() {
        if *v < v_min { v_min = *v; }
        if *v > v_max { v_max = *v; }
    }

    if v_min > v_max {
        return (0.0, 1.0);
    }
    if (v_max - v_min).abs() < f64::EPSILON {
        v_min -= 1.0;
        v_max += 1.0;
    }

    (v_min, v_max)
}
