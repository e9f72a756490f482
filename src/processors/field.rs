//! Spatial reconstruction of the oven temperature field.
//!
//! Sparse sensor readings are spread over a regular 3D lattice using either
//! the nearest sensor or inverse-distance weighting. Only lattice points
//! inside a cylinder around the x-axis carry a value; everything else is 0.
//!
//! Sensor geometry is immutable per run ([`FieldLayout`]); readings at one
//! instant live in a separate [`Snapshot`] parallel to the layout, so a
//! snapshot never mutates the layout it was taken against.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{FieldConfig, InterpolationMode, OvenLayout, PipelineConfig, SensorSpec};
use crate::core::clock::EpochClock;
use crate::core::loaders::load_time_table;
use crate::core::sentinel::SentinelPolicy;
use crate::core::table::TimeTable;
use crate::core::transforms::to_lattice;
use crate::core::writers::write_vtk_structured_points;

use super::alignment::ALIGNED_TABLE_FILE;

/// Scalar array name written into every volume.
pub const SCALAR_NAME: &str = "temperature";

/// Errors that can occur during field generation.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("no layout sensor has a valid reading in the aligned table")]
    NoValidData,

    #[error("snapshot has {actual} values for a layout of {expected} sensors")]
    SnapshotMismatch { expected: usize, actual: usize },
}

/// One sensor on the centered lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorPosition {
    pub id: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl SensorPosition {
    /// Maps raw surveyed coordinates onto the lattice.
    pub fn from_spec(spec: &SensorSpec, scale: f64, center: [i64; 3]) -> Self {
        Self {
            id: spec.id.clone(),
            label: spec.label.clone(),
            x: to_lattice(spec.x, scale, center[0]),
            y: to_lattice(spec.y, scale, center[1]),
            z: to_lattice(spec.z, scale, center[2]),
        }
    }

    #[inline]
    fn distance_sq(&self, p: [f64; 3]) -> f64 {
        let dx = p[0] - self.x;
        let dy = p[1] - self.y;
        let dz = p[2] - self.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// Lattice sensor positions, sorted by id.
#[derive(Debug, Clone, Default)]
pub struct FieldLayout {
    positions: Vec<SensorPosition>,
}

impl FieldLayout {
    pub fn new(mut positions: Vec<SensorPosition>) -> Self {
        positions.sort_by(|a, b| a.id.cmp(&b.id));
        Self { positions }
    }

    pub fn from_oven(oven: &OvenLayout, config: &FieldConfig) -> Self {
        Self::new(
            oven.sensors
                .iter()
                .map(|s| SensorPosition::from_spec(s, config.scale, config.center))
                .collect(),
        )
    }

    pub fn positions(&self) -> &[SensorPosition] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Readings at one instant, parallel to a [`FieldLayout`].
///
/// `None` marks a sensor without a valid reading; it takes no part in
/// interpolation.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timestamp: i64,
    values: Vec<Option<f64>>,
}

impl Snapshot {
    /// # Errors
    ///
    /// Returns [`FieldError::SnapshotMismatch`] if `values` is not one per sensor.
    pub fn new(
        layout: &FieldLayout,
        timestamp: i64,
        values: Vec<Option<f64>>,
    ) -> std::result::Result<Self, FieldError> {
        if values.len() != layout.len() {
            return Err(FieldError::SnapshotMismatch {
                expected: layout.len(),
                actual: values.len(),
            });
        }
        Ok(Self { timestamp, values })
    }

    /// Takes the aligned-table row at `timestamp`.
    ///
    /// Returns `None` if the table has no such row.
    pub fn from_table(
        layout: &FieldLayout,
        table: &TimeTable,
        timestamp: i64,
        policy: &SentinelPolicy,
    ) -> Option<Self> {
        let row = &table.rows[table.row_at(timestamp)?];
        let values = layout
            .positions
            .iter()
            .map(|p| {
                table
                    .column_index(&p.id)
                    .and_then(|col| row.get(col).copied())
                    .filter(|&v| policy.is_valid(v))
            })
            .collect();
        Some(Self { timestamp, values })
    }

    /// Number of sensors with a valid reading.
    pub fn valid_count(&self) -> usize {
        self.values.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.valid_count() == 0
    }

    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

/// Nearest-sensor or IDW estimator over a cylindrical region.
#[derive(Debug, Clone, Copy)]
pub struct FieldInterpolator {
    pub mode: InterpolationMode,
    pub distance_power: f64,
    pub radius: f64,
}

impl FieldInterpolator {
    pub fn new(config: &FieldConfig) -> Self {
        Self {
            mode: config.mode,
            distance_power: config.distance_power,
            radius: config.radius,
        }
    }

    pub fn with_mode(mut self, mode: InterpolationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Inside the cylinder `y² + z² <= radius²`; x is unconstrained.
    #[inline]
    pub fn in_scope(&self, p: [f64; 3]) -> bool {
        p[1] * p[1] + p[2] * p[2] <= self.radius * self.radius
    }

    /// Estimate the field at lattice point `p`. Out-of-scope points are 0.
    pub fn value_at(&self, layout: &FieldLayout, snapshot: &Snapshot, p: [f64; 3]) -> f64 {
        if !self.in_scope(p) {
            return 0.0;
        }
        match self.mode {
            InterpolationMode::Nearest => self.nearest(layout, snapshot, p),
            InterpolationMode::Idw => self.idw(layout, snapshot, p),
        }
    }

    fn readings<'a>(
        layout: &'a FieldLayout,
        snapshot: &'a Snapshot,
    ) -> impl Iterator<Item = (&'a SensorPosition, f64)> + 'a {
        layout
            .positions
            .iter()
            .zip(snapshot.values.iter())
            .filter_map(|(pos, v)| v.map(|v| (pos, v)))
    }

    /// Ties go to the lowest sensor id, since positions are sorted by id and
    /// only a strictly smaller distance replaces the current best.
    fn nearest(&self, layout: &FieldLayout, snapshot: &Snapshot, p: [f64; 3]) -> f64 {
        let mut best: Option<(f64, f64)> = None;
        for (pos, value) in Self::readings(layout, snapshot) {
            let d = pos.distance_sq(p).powf(0.5 * self.distance_power);
            match best {
                Some((min, _)) if d >= min => {}
                _ => best = Some((d, value)),
            }
        }
        best.map(|(_, v)| v).unwrap_or(0.0)
    }

    fn idw(&self, layout: &FieldLayout, snapshot: &Snapshot, p: [f64; 3]) -> f64 {
        let mut weight_sum = 0.0;
        let mut value_sum = 0.0;

        for (pos, value) in Self::readings(layout, snapshot) {
            let d2 = pos.distance_sq(p);
            if d2 == 0.0 {
                return value;
            }
            let w = 1.0 / d2.powf(0.5 * self.distance_power);
            weight_sum += w;
            value_sum += w * value;
        }

        let v = value_sum / weight_sum;
        if v.is_finite() {
            v
        } else {
            log::warn!("non-finite field value at [{}, {}, {}], using 0", p[0], p[1], p[2]);
            0.0
        }
    }
}

/// Scalar values on a `[nx, ny, nz]` lattice, x varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredField {
    pub dims: [usize; 3],
    pub values: Vec<f64>,
}

impl StructuredField {
    /// Value at integer lattice offsets from the center.
    pub fn get(&self, half_extents: [i64; 3], x: i64, y: i64, z: i64) -> Option<f64> {
        let ix = usize::try_from(x + half_extents[0]).ok()?;
        let iy = usize::try_from(y + half_extents[1]).ok()?;
        let iz = usize::try_from(z + half_extents[2]).ok()?;
        if ix >= self.dims[0] || iy >= self.dims[1] || iz >= self.dims[2] {
            return None;
        }
        self.values
            .get((iz * self.dims[1] + iy) * self.dims[0] + ix)
            .copied()
    }
}

/// Evaluate the full lattice `-half..=half` on each axis.
///
/// z-slices are computed in parallel and concatenated in order.
pub fn reconstruct_field(
    interpolator: &FieldInterpolator,
    layout: &FieldLayout,
    snapshot: &Snapshot,
    half_extents: [i64; 3],
) -> StructuredField {
    let [hx, hy, hz] = half_extents.map(|h| h.max(0));
    let dims = [2 * hx as usize + 1, 2 * hy as usize + 1, 2 * hz as usize + 1];

    let slices: Vec<Vec<f64>> = (-hz..=hz)
        .into_par_iter()
        .map(|z| {
            let mut slice = Vec::with_capacity(dims[0] * dims[1]);
            for y in -hy..=hy {
                for x in -hx..=hx {
                    slice.push(interpolator.value_at(
                        layout,
                        snapshot,
                        [x as f64, y as f64, z as f64],
                    ));
                }
            }
            slice
        })
        .collect();

    StructuredField {
        dims,
        values: slices.concat(),
    }
}

/// Latest first-valid timestamp over the layout's columns.
pub fn default_start_time(
    layout: &FieldLayout,
    table: &TimeTable,
    policy: &SentinelPolicy,
) -> Option<i64> {
    layout
        .positions
        .iter()
        .filter_map(|p| table.column_index(&p.id))
        .filter_map(|col| table.first_valid_time(col, policy))
        .max()
}

/// Options of one field generation run.
#[derive(Debug, Clone)]
pub struct FieldRequest {
    pub modes: Vec<InterpolationMode>,
    /// First snapshot time; the default start time when `None`.
    pub start: Option<i64>,
    pub count: usize,
    pub step_secs: i64,
}

impl FieldRequest {
    pub fn from_config(config: &FieldConfig) -> Self {
        Self {
            modes: vec![config.mode],
            start: None,
            count: config.snapshot_count,
            step_secs: config.snapshot_step_secs,
        }
    }
}

/// Output file name for one snapshot and mode.
pub fn volume_file_name(clock: &EpochClock, timestamp: i64, mode: InterpolationMode) -> String {
    format!(
        "temperature.{}.{}.vtk",
        clock.format(timestamp, "%y%m%d-%H%M%S"),
        mode.tag()
    )
}

/// Write VTK volumes for successive snapshots of the aligned table.
///
/// Snapshots advance by `request.step_secs` and stop after `request.count`,
/// past the end of the table, or at the first snapshot without any valid
/// sensor.
///
/// # Errors
///
/// Returns [`FieldError::NoValidData`] if no start time can be derived, or a
/// loader or writer error.
pub fn generate_field_files(
    source_dir: &Path,
    target_dir: &Path,
    config: &PipelineConfig,
    request: &FieldRequest,
) -> Result<Vec<PathBuf>> {
    let table_path = source_dir.join(ALIGNED_TABLE_FILE);
    let table = load_time_table(&table_path)
        .with_context(|| format!("Failed to load aligned table: {}", table_path.display()))?;

    let oven = OvenLayout::builtin(&config.field.oven)?;
    let layout = FieldLayout::from_oven(&oven, &config.field);
    let policy = SentinelPolicy::from_config(&config.sampling);
    let clock = EpochClock::from_config(&config.clock)?;
    let interpolator = FieldInterpolator::new(&config.field);

    let start = match request.start {
        Some(t) => t,
        None => default_start_time(&layout, &table, &policy).ok_or(FieldError::NoValidData)?,
    };
    let end = table.last_timestamp().unwrap_or(start);

    let mut written = Vec::new();
    let mut t = start;
    for _ in 0..request.count {
        if t > end {
            break;
        }
        let snapshot = match Snapshot::from_table(&layout, &table, t, &policy) {
            Some(s) if !s.is_empty() => s,
            _ => {
                log::info!("No valid readings at {}, stopping", t);
                break;
            }
        };

        log::info!(
            "Snapshot at {} ({} of {} sensors)",
            clock.format(t, "%Y-%m-%d %H:%M:%S"),
            snapshot.valid_count(),
            layout.len()
        );
        for (i, pos) in layout.positions().iter().enumerate() {
            if let Some(v) = snapshot.value(i) {
                log::debug!("{} {} [{},{},{}] => {}", pos.id, pos.label, pos.x, pos.y, pos.z, v);
            }
        }

        for &mode in &request.modes {
            let field = reconstruct_field(
                &interpolator.with_mode(mode),
                &layout,
                &snapshot,
                config.field.half_extents,
            );
            let out = target_dir.join(volume_file_name(&clock, t, mode));
            write_vtk_structured_points(&out, field.dims, &field.values, SCALAR_NAME)
                .with_context(|| format!("Failed to write volume: {}", out.display()))?;
            written.push(out);
        }

        t += request.step_secs.max(1);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn position(id: &str, x: f64, y: f64, z: f64) -> SensorPosition {
        SensorPosition {
            id: id.into(),
            label: String::new(),
            x,
            y,
            z,
        }
    }

    fn interpolator(mode: InterpolationMode) -> FieldInterpolator {
        FieldInterpolator {
            mode,
            distance_power: 1.0,
            radius: 18.0,
        }
    }

    fn two_sensor_setup() -> (FieldLayout, Snapshot) {
        let layout = FieldLayout::new(vec![
            position("0-1", 4.0, 0.0, 0.0),
            position("0-0", 0.0, 0.0, 0.0),
        ]);
        // layout is sorted by id: "0-0" first
        let snapshot = Snapshot::new(&layout, 0, vec![Some(100.0), Some(200.0)]).unwrap();
        (layout, snapshot)
    }

    #[test]
    fn test_sensor_position_from_spec() {
        let spec = SensorSpec {
            id: "1-6".into(),
            label: "C28".into(),
            x: 20.5,
            y: -85.0,
            z: 277.0,
        };
        let pos = SensorPosition::from_spec(&spec, 10.0, [48, 0, 18]);
        assert_eq!((pos.x, pos.y, pos.z), (-46.0, -8.0, 9.0));
    }

    #[test]
    fn test_validity_boundary() {
        let (layout, snapshot) = two_sensor_setup();
        for mode in [InterpolationMode::Nearest, InterpolationMode::Idw] {
            let interp = interpolator(mode);
            assert!(interp.in_scope([0.0, 0.0, 0.0]));
            assert!(!interp.in_scope([0.0, 19.0, 0.0]));
            assert_eq!(interp.value_at(&layout, &snapshot, [0.0, 19.0, 0.0]), 0.0);
            assert!(interp.value_at(&layout, &snapshot, [1.0, 0.0, 0.0]) > 0.0);
        }
    }

    #[test]
    fn test_idw_exact_hit_returns_sensor_value() {
        let (layout, snapshot) = two_sensor_setup();
        let interp = interpolator(InterpolationMode::Idw);

        assert_eq!(interp.value_at(&layout, &snapshot, [4.0, 0.0, 0.0]), 200.0);

        let other = Snapshot::new(&layout, 0, vec![Some(5.0), Some(200.0)]).unwrap();
        assert_eq!(interp.value_at(&layout, &other, [4.0, 0.0, 0.0]), 200.0);
    }

    #[test]
    fn test_idw_weights_by_inverse_distance() {
        let (layout, snapshot) = two_sensor_setup();
        let interp = interpolator(InterpolationMode::Idw);

        // d = 1 and 3: (100 * 1 + 200 / 3) / (1 + 1 / 3) = 125
        let v = interp.value_at(&layout, &snapshot, [1.0, 0.0, 0.0]);
        assert!((v - 125.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_picks_closest_and_breaks_ties_by_id() {
        let (layout, snapshot) = two_sensor_setup();
        let interp = interpolator(InterpolationMode::Nearest);

        assert_eq!(interp.value_at(&layout, &snapshot, [3.0, 0.0, 0.0]), 200.0);
        assert_eq!(interp.value_at(&layout, &snapshot, [1.0, 0.0, 0.0]), 100.0);
        // equidistant from both
        assert_eq!(interp.value_at(&layout, &snapshot, [2.0, 0.0, 0.0]), 100.0);
    }

    #[test]
    fn test_missing_readings_are_ignored() {
        let (layout, _) = two_sensor_setup();
        let snapshot = Snapshot::new(&layout, 0, vec![None, Some(200.0)]).unwrap();

        let interp = interpolator(InterpolationMode::Nearest);
        assert_eq!(interp.value_at(&layout, &snapshot, [0.0, 0.0, 0.0]), 200.0);
        assert_eq!(snapshot.valid_count(), 1);
    }

    #[test]
    fn test_idw_without_readings_is_zero() {
        let (layout, _) = two_sensor_setup();
        let snapshot = Snapshot::new(&layout, 0, vec![None, None]).unwrap();

        let interp = interpolator(InterpolationMode::Idw);
        assert_eq!(interp.value_at(&layout, &snapshot, [1.0, 0.0, 0.0]), 0.0);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_snapshot_length_mismatch() {
        let (layout, _) = two_sensor_setup();
        assert!(matches!(
            Snapshot::new(&layout, 0, vec![Some(1.0)]),
            Err(FieldError::SnapshotMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_reconstruct_field_order_and_dims() {
        let (layout, snapshot) = two_sensor_setup();
        let field = reconstruct_field(
            &interpolator(InterpolationMode::Nearest),
            &layout,
            &snapshot,
            [4, 1, 1],
        );

        assert_eq!(field.dims, [9, 3, 3]);
        assert_eq!(field.values.len(), 81);
        assert_eq!(field.get([4, 1, 1], 4, 0, 0), Some(200.0));
        assert_eq!(field.get([4, 1, 1], -4, 0, 0), Some(100.0));
        // x varies fastest: index of (x=4, y=-1, z=-1) is 8
        assert_eq!(field.values[8], 200.0);
        assert_eq!(field.get([4, 1, 1], 5, 0, 0), None);
    }

    #[test]
    fn test_snapshot_from_table_and_default_start() {
        let layout = FieldLayout::new(vec![
            position("0-0", 0.0, 0.0, 0.0),
            position("0-1", 4.0, 0.0, 0.0),
        ]);
        let mut table = TimeTable::new(vec!["0-0".into(), "0-1".into(), "9-9".into()]);
        table.push_row(100, vec![10.0, 9999.0, 50.0]);
        table.push_row(110, vec![11.0, 21.0, 50.0]);
        let policy = SentinelPolicy::default();

        assert_eq!(default_start_time(&layout, &table, &policy), Some(110));

        let s = Snapshot::from_table(&layout, &table, 100, &policy).unwrap();
        assert_eq!(s.value(0), Some(10.0));
        assert_eq!(s.value(1), None);
        assert!(Snapshot::from_table(&layout, &table, 105, &policy).is_none());
    }

    #[test]
    fn test_generate_field_files() {
        let dir = TempDir::new().unwrap();
        let mut file = File::create(dir.path().join(ALIGNED_TABLE_FILE)).unwrap();
        writeln!(file, "timestamp,0-0,0-1,2-0").unwrap();
        writeln!(file, "0,100,9999,150").unwrap();
        writeln!(file, "10,110,120,160").unwrap();
        writeln!(file, "20,9999,9999,9999").unwrap();
        drop(file);

        let mut config = PipelineConfig::default();
        config.field.half_extents = [2, 2, 2];
        let request = FieldRequest {
            modes: vec![InterpolationMode::Nearest, InterpolationMode::Idw],
            start: None,
            count: 5,
            step_secs: 10,
        };

        let written = generate_field_files(dir.path(), dir.path(), &config, &request).unwrap();

        // starts at 10, stops at the all-sentinel row at 20
        assert_eq!(written.len(), 2);
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["temperature.700101-000010.0.vtk", "temperature.700101-000010.1.vtk"]
        );

        let content = fs::read_to_string(&written[0]).unwrap();
        assert!(content.contains("DIMENSIONS 5 5 5"));
        assert!(content.contains("POINT_DATA 125"));
    }
}
