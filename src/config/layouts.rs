//! Static sensor geometry per oven.
//!
//! Geometry is data, not code: the built-in tables are YAML files embedded at
//! compile time, and custom layouts can be loaded from disk in the same format.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const OVEN_A: &str = include_str!("layouts/oven-a.yaml");
const OVEN_B: &str = include_str!("layouts/oven-b.yaml");

/// Errors that can occur while resolving a sensor layout.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("unknown oven layout '{0}' (expected 'a' or 'b')")]
    UnknownOven(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid layout YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One surveyed sensor in raw layout coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    /// Logger id, `"{hub}-{addr}"`
    pub id: String,
    /// Label painted on the probe
    #[serde(default)]
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Sensor geometry of one oven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvenLayout {
    pub name: String,
    pub sensors: Vec<SensorSpec>,
}

impl OvenLayout {
    /// Returns one of the embedded layouts by selector (case-insensitive).
    pub fn builtin(oven: &str) -> Result<Self, LayoutError> {
        let source = match oven.to_ascii_lowercase().as_str() {
            "a" => OVEN_A,
            "b" => OVEN_B,
            _ => return Err(LayoutError::UnknownOven(oven.to_string())),
        };
        Ok(serde_yaml::from_str(source)?)
    }

    /// Load a layout table from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, LayoutError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_layouts_parse() {
        let a = OvenLayout::builtin("a").unwrap();
        let b = OvenLayout::builtin("B").unwrap();

        assert_eq!(a.name, "a");
        assert_eq!(a.len(), 25);
        assert_eq!(b.len(), 25);

        let c28 = b.sensors.iter().find(|s| s.label == "C28").unwrap();
        assert_eq!(c28.id, "1-6");
        assert_eq!(c28.x, 20.5);
    }

    #[test]
    fn test_sensor_ids_are_unique() {
        for oven in ["a", "b"] {
            let layout = OvenLayout::builtin(oven).unwrap();
            let mut ids: Vec<&str> = layout.sensors.iter().map(|s| s.id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), layout.len(), "duplicate id in oven {}", oven);
        }
    }

    #[test]
    fn test_unknown_oven() {
        let err = OvenLayout::builtin("c").unwrap_err();
        assert!(matches!(err, LayoutError::UnknownOven(ref s) if s == "c"));
    }
}
