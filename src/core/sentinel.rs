//! Validity classification for raw sensor readings.
//!
//! Readings outside the plausible domain are never blended into interpolated
//! output. Instead they are replaced by [`SENTINEL_VALUE`], which downstream
//! plotting tools use to detect gaps.

use serde::{Deserialize, Serialize};

use crate::config::SamplingConfig;

/// Out-of-band marker written wherever no valid value is available.
pub const SENTINEL_VALUE: f64 = 9999.0;

/// A reading after range classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Valid(f64),
    Invalid,
}

impl Reading {
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Reading::Valid(_))
    }

    /// Returns the valid value or the sentinel.
    #[inline]
    pub fn value_or_sentinel(&self) -> f64 {
        match *self {
            Reading::Valid(v) => v,
            Reading::Invalid => SENTINEL_VALUE,
        }
    }
}

/// Half-open validity range `(low, high]` for raw readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentinelPolicy {
    pub low: f64,
    pub high: f64,
}

impl Default for SentinelPolicy {
    fn default() -> Self {
        Self {
            low: 0.0,
            high: 700.0,
        }
    }
}

impl SentinelPolicy {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Builds the policy from the sampling section of the pipeline config.
    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(config.valid_low, config.valid_high)
    }

    /// Classify a raw value.
    ///
    /// A value is invalid when `value <= low`, `value > high`, or when it is
    /// not a finite number (unparsable fields are carried as NaN).
    #[inline]
    pub fn classify(&self, value: f64) -> Reading {
        if value.is_finite() && value > self.low && value <= self.high {
            Reading::Valid(value)
        } else {
            Reading::Invalid
        }
    }

    #[inline]
    pub fn is_valid(&self, value: f64) -> bool {
        self.classify(value).is_valid()
    }

    #[inline]
    pub fn sentinel_value(&self) -> f64 {
        SENTINEL_VALUE
    }
}
