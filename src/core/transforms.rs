//! Scalar transforms shared by the temporal and spatial pipelines.
//!
//! This module provides the single linear interpolation primitive used by
//! every resampler, the layout coordinate transform, and the temperature
//! unit conversions.

use thiserror::Error;

use super::sentinel::{Reading, SENTINEL_VALUE};

/// Errors raised by the interpolation primitive.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationError {
    /// Both bracket endpoints share a timestamp.
    #[error("degenerate interval: both bracket endpoints at t={0}")]
    DegenerateInterval(i64),
}

/// Linear interpolation between two bracketing samples.
///
/// Evaluates `(v0 * (t1 - t) + v1 * (t - t0)) / (t1 - t0)`. Callers guarantee
/// `t0 <= t <= t1`; at `t == t0` and `t == t1` the endpoint values are
/// returned exactly.
///
/// # Arguments
///
/// * `t0`, `v0` - Lower bracket endpoint
/// * `t1`, `v1` - Upper bracket endpoint
/// * `t` - Target timestamp
///
/// # Errors
///
/// Returns [`InterpolationError::DegenerateInterval`] when `t0 == t1`.
///
/// # Example
///
/// ```
/// use oven_sync::core::transforms::lerp;
///
/// assert_eq!(lerp(0, 0.0, 10, 10.0, 5).unwrap(), 5.0);
/// ```
pub fn lerp(t0: i64, v0: f64, t1: i64, v1: f64, t: i64) -> Result<f64, InterpolationError> {
    if t0 == t1 {
        return Err(InterpolationError::DegenerateInterval(t0));
    }
    if t == t0 {
        return Ok(v0);
    }
    if t == t1 {
        return Ok(v1);
    }

    let span = (t1 - t0) as f64;
    Ok((v0 * (t1 - t) as f64 + v1 * (t - t0) as f64) / span)
}

/// Linear interpolation between two classified readings.
///
/// Invalidity propagates: if either endpoint is [`Reading::Invalid`] the
/// result is [`SENTINEL_VALUE`] exactly, never a blended number.
///
/// # Errors
///
/// Returns [`InterpolationError::DegenerateInterval`] when `t0 == t1`,
/// regardless of the readings.
pub fn interpolate(
    t0: i64,
    r0: Reading,
    t1: i64,
    r1: Reading,
    t: i64,
) -> Result<f64, InterpolationError> {
    if t0 == t1 {
        return Err(InterpolationError::DegenerateInterval(t0));
    }
    match (r0, r1) {
        (Reading::Valid(v0), Reading::Valid(v1)) => lerp(t0, v0, t1, v1, t),
        _ => Ok(SENTINEL_VALUE),
    }
}

/// Map a raw layout coordinate onto the centered lattice.
///
/// The scaled coordinate is truncated toward zero before the center offset
/// is subtracted, so sensors snap onto integer lattice positions.
#[inline]
pub fn to_lattice(raw: f64, scale: f64, center: i64) -> f64 {
    (raw / scale).trunc() - center as f64
}

#[inline]
pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

#[inline]
pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}
