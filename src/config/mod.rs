//! Configuration types for the oven sensor pipeline.

pub mod layouts;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use layouts::{OvenLayout, SensorSpec};

/// Configuration for uniform resampling and value validity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Resampling period in seconds
    #[serde(default = "default_period_secs")]
    pub period_secs: i64,

    /// Exclusive lower bound of plausible readings
    #[serde(default)]
    pub valid_low: f64,

    /// Inclusive upper bound of plausible readings
    #[serde(default = "default_valid_high")]
    pub valid_high: f64,
}

fn default_period_secs() -> i64 {
    10
}

fn default_valid_high() -> f64 {
    700.0
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            valid_low: 0.0,
            valid_high: default_valid_high(),
        }
    }
}

/// Configuration for parsing wall-clock timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Offset of the local wall-clock representation from UTC, in seconds
    #[serde(default)]
    pub utc_offset_secs: i32,

    /// Accepted `chrono` format strings, tried in order
    #[serde(default = "default_time_formats")]
    pub formats: Vec<String>,
}

fn default_time_formats() -> Vec<String> {
    [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset_secs: 0,
            formats: default_time_formats(),
        }
    }
}

/// Declared sensor set of the data logger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Number of logger hubs (one raw file per hub)
    #[serde(default = "default_hub_count")]
    pub hub_count: usize,

    /// Sensor addresses per hub
    #[serde(default = "default_sensors_per_hub")]
    pub sensors_per_hub: usize,
}

fn default_hub_count() -> usize {
    4
}

fn default_sensors_per_hub() -> usize {
    8
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            hub_count: default_hub_count(),
            sensors_per_hub: default_sensors_per_hub(),
        }
    }
}

impl SourceConfig {
    /// Sensor ids in declaration order (`"{hub}-{addr}"`).
    pub fn sensor_ids(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(self.hub_count * self.sensors_per_hub);
        for hub in 0..self.hub_count {
            for addr in 0..self.sensors_per_hub {
                ids.push(format!("{}-{}", hub, addr));
            }
        }
        ids
    }
}

/// Spatial interpolation mode for field reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    /// Value of the closest sensor
    #[default]
    Nearest,
    /// Inverse-distance weighting over all sensors
    Idw,
}

impl InterpolationMode {
    /// Numeric tag used in output file names.
    pub fn tag(&self) -> u8 {
        match self {
            InterpolationMode::Nearest => 0,
            InterpolationMode::Idw => 1,
        }
    }
}

/// Configuration for 3D field reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(default)]
    pub mode: InterpolationMode,

    /// Sensor geometry selector
    #[serde(default = "default_oven")]
    pub oven: String,

    /// Exponent applied to distances
    #[serde(default = "default_distance_power")]
    pub distance_power: f64,

    /// Raw units per lattice cell
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Lattice center in scaled coordinates
    #[serde(default = "default_center")]
    pub center: [i64; 3],

    /// Radius of the cylindrical validity region around the x-axis
    #[serde(default = "default_radius")]
    pub radius: f64,

    /// Lattice half-extents per axis
    #[serde(default = "default_half_extents")]
    pub half_extents: [i64; 3],

    /// Maximum number of snapshots per run
    #[serde(default = "default_snapshot_count")]
    pub snapshot_count: usize,

    /// Time between snapshots in seconds
    #[serde(default = "default_snapshot_step")]
    pub snapshot_step_secs: i64,
}

fn default_oven() -> String {
    "b".to_string()
}

fn default_distance_power() -> f64 {
    1.0
}

fn default_scale() -> f64 {
    10.0
}

fn default_center() -> [i64; 3] {
    [48, 0, 18]
}

fn default_radius() -> f64 {
    18.0
}

fn default_half_extents() -> [i64; 3] {
    [30, 18, 18]
}

fn default_snapshot_count() -> usize {
    3
}

fn default_snapshot_step() -> i64 {
    60 * 60
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            mode: InterpolationMode::default(),
            oven: default_oven(),
            distance_power: default_distance_power(),
            scale: default_scale(),
            center: default_center(),
            radius: default_radius(),
            half_extents: default_half_extents(),
            snapshot_count: default_snapshot_count(),
            snapshot_step_secs: default_snapshot_step(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub clock: ClockConfig,

    #[serde(default)]
    pub sources: SourceConfig,

    #[serde(default)]
    pub field: FieldConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.sampling.period_secs, 10);
        assert_eq!(config.sampling.valid_high, 700.0);
        assert_eq!(config.sources.hub_count, 4);
        assert_eq!(config.field.radius, 18.0);
        assert_eq!(config.field.mode, InterpolationMode::Nearest);
    }

    #[test]
    fn test_sensor_ids_order() {
        let sources = SourceConfig {
            hub_count: 2,
            sensors_per_hub: 2,
        };
        assert_eq!(sources.sensor_ids(), vec!["0-0", "0-1", "1-0", "1-1"]);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "field:\n  mode: idw\n  distance_power: 2.0\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.field.mode, InterpolationMode::Idw);
        assert_eq!(config.field.distance_power, 2.0);
        assert_eq!(config.field.half_extents, [30, 18, 18]);
        assert_eq!(config.sampling.period_secs, 10);
    }

    #[test]
    fn test_yaml_roundtrip_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");

        let mut config = PipelineConfig::default();
        config.field.oven = "a".to_string();
        config.to_yaml(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.field.oven, "a");
    }
}
