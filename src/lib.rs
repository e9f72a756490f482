//! Resampling and alignment pipeline for oven sensor logs.
//!
//! This crate provides tools for:
//! - Splitting raw hub logs into per-sensor streams
//! - Resampling irregular streams onto a fixed-period grid
//! - Aligning many resampled streams into one wide table with sentinel gaps
//! - Interpolating the aligned table at the timestamps of a process-control log
//! - Reconstructing 3D temperature volumes (nearest sensor or IDW) as VTK files
//!
//! # Example
//!
//! ```
//! use oven_sync::core::{Sample, SensorStream, SentinelPolicy};
//! use oven_sync::processors::{align_streams, resample_stream};
//!
//! let policy = SentinelPolicy::default();
//! let a = SensorStream::new("0-0", vec![Sample::new(95, 20.0), Sample::new(125, 23.0)]);
//! let b = SensorStream::new("0-1", vec![Sample::new(118, 30.0), Sample::new(140, 32.0)]);
//!
//! let streams = vec![
//!     resample_stream(&a, 10, &policy).unwrap(),
//!     resample_stream(&b, 10, &policy).unwrap(),
//! ];
//! let table = align_streams(&streams, 10).unwrap();
//! assert_eq!(table.timestamps, vec![100, 110, 120, 130, 140]);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{ClockConfig, FieldConfig, PipelineConfig, SamplingConfig, SourceConfig};
pub use core::sentinel::{SentinelPolicy, SENTINEL_VALUE};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
