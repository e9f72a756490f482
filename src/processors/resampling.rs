//! Uniform resampling of one irregular sensor stream.
//!
//! [`StreamResampler`] consumes samples one at a time and emits values at
//! exact multiples of the period. It keeps a sliding two-sample bracket and a
//! pending target time; nothing is buffered beyond that, so it can be driven
//! directly from a file reader or from an in-memory [`SensorStream`].

use rayon::prelude::*;
use thiserror::Error;

use crate::core::loaders::{Sample, SensorStream};
use crate::core::sentinel::SentinelPolicy;
use crate::core::transforms::{lerp, InterpolationError};

/// Errors that can occur when configuring a resampler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResampleError {
    #[error("resampling period must be positive, got {0}")]
    InvalidPeriod(i64),
}

/// Inclusive range of emitted grid timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    #[inline]
    pub fn contains(&self, t: i64) -> bool {
        t >= self.start && t <= self.end
    }

    /// Smallest window covering both.
    pub fn union(&self, other: &TimeWindow) -> TimeWindow {
        TimeWindow {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Smallest multiple of `period` at or after `t`.
#[inline]
pub fn align_up(t: i64, period: i64) -> i64 {
    let rem = t.rem_euclid(period);
    if rem == 0 {
        t
    } else {
        t + (period - rem)
    }
}

/// Bracket state of the resampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BracketState {
    /// No valid sample seen yet.
    Seeding,
    /// Two most recent accepted samples. Right after seeding both are the seed.
    Bracketed { lower: Sample, upper: Sample },
}

/// Result of resampling one stream.
#[derive(Debug, Clone, Default)]
pub struct ResampledStream {
    pub id: String,
    /// Grid-aligned `(timestamp, value)` pairs, consecutive timestamps one period apart.
    pub points: Vec<(i64, f64)>,
    /// Emitted range, `None` when nothing was emitted.
    pub window: Option<TimeWindow>,
    /// Raw records read for this stream, valid or not.
    pub raw_count: usize,
    /// Records rejected by the validity policy.
    pub rejected: usize,
    /// Valid records discarded because they did not advance past the pending target.
    pub dropped: usize,
    /// Grid points skipped because the bracket collapsed to a single instant.
    pub degenerate: usize,
}

impl ResampledStream {
    #[inline]
    pub fn has_data(&self) -> bool {
        self.window.is_some()
    }
}

/// Sliding-bracket resampler onto a fixed-period grid.
///
/// # Example
///
/// ```
/// use oven_sync::core::{Sample, SentinelPolicy};
/// use oven_sync::processors::resampling::StreamResampler;
///
/// let mut resampler = StreamResampler::new(10, SentinelPolicy::default()).unwrap();
/// let mut out = Vec::new();
/// resampler.push(Sample::new(3, 100.0), &mut out);
/// resampler.push(Sample::new(13, 200.0), &mut out);
/// assert_eq!(out, vec![(10, 170.0)]);
/// ```
#[derive(Debug, Clone)]
pub struct StreamResampler {
    period: i64,
    policy: SentinelPolicy,
    state: BracketState,
    pending: i64,
    window: Option<TimeWindow>,
    raw_count: usize,
    rejected: usize,
    dropped: usize,
    degenerate: usize,
}

impl StreamResampler {
    /// Creates a resampler for the given period in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ResampleError::InvalidPeriod`] if `period <= 0`.
    pub fn new(period: i64, policy: SentinelPolicy) -> Result<Self, ResampleError> {
        if period <= 0 {
            return Err(ResampleError::InvalidPeriod(period));
        }
        Ok(Self {
            period,
            policy,
            state: BracketState::Seeding,
            pending: 0,
            window: None,
            raw_count: 0,
            rejected: 0,
            dropped: 0,
            degenerate: 0,
        })
    }

    #[inline]
    pub fn state(&self) -> BracketState {
        self.state
    }

    /// Next grid time awaiting emission, once seeded.
    pub fn pending_target(&self) -> Option<i64> {
        match self.state {
            BracketState::Seeding => None,
            BracketState::Bracketed { .. } => Some(self.pending),
        }
    }

    /// Feed one raw sample, appending any grid points it completes to `out`.
    ///
    /// Invalid readings are skipped entirely and never become bracket
    /// endpoints. The first valid sample only seeds the bracket. A later
    /// sample earlier than the pending target is discarded.
    pub fn push(&mut self, sample: Sample, out: &mut Vec<(i64, f64)>) {
        self.raw_count += 1;

        if !self.policy.is_valid(sample.value) {
            self.rejected += 1;
            return;
        }

        let (lower, upper) = match self.state {
            BracketState::Seeding => {
                self.pending = align_up(sample.timestamp, self.period);
                self.state = BracketState::Bracketed {
                    lower: sample,
                    upper: sample,
                };
                return;
            }
            BracketState::Bracketed { upper, .. } if sample.timestamp >= self.pending => {
                (upper, sample)
            }
            BracketState::Bracketed { .. } => {
                self.dropped += 1;
                return;
            }
        };
        self.state = BracketState::Bracketed { lower, upper };

        while upper.timestamp >= self.pending {
            let target = self.pending;
            match lerp(lower.timestamp, lower.value, upper.timestamp, upper.value, target) {
                Ok(value) => {
                    out.push((target, value));
                    self.window = Some(match self.window {
                        Some(w) => TimeWindow { start: w.start, end: target },
                        None => TimeWindow { start: target, end: target },
                    });
                }
                Err(InterpolationError::DegenerateInterval(t)) => {
                    log::warn!("skipping grid point {}: bracket collapsed at t={}", target, t);
                    self.degenerate += 1;
                }
            }
            self.pending += self.period;
        }
    }

    /// Consume the resampler and return the collected statistics with `points`.
    pub fn finish(self, id: impl Into<String>, points: Vec<(i64, f64)>) -> ResampledStream {
        ResampledStream {
            id: id.into(),
            points,
            window: self.window,
            raw_count: self.raw_count,
            rejected: self.rejected,
            dropped: self.dropped,
            degenerate: self.degenerate,
        }
    }
}

/// Resample one stream onto the `period` grid.
///
/// # Errors
///
/// Returns [`ResampleError::InvalidPeriod`] if `period <= 0`.
pub fn resample_stream(
    stream: &SensorStream,
    period: i64,
    policy: &SentinelPolicy,
) -> Result<ResampledStream, ResampleError> {
    let mut resampler = StreamResampler::new(period, *policy)?;
    let mut points = Vec::with_capacity(stream.len());

    for &sample in &stream.samples {
        resampler.push(sample, &mut points);
    }

    let mut result = resampler.finish(stream.id.clone(), points);
    // Rows with unusable timestamps still count as records of this sensor.
    result.raw_count += stream.skipped_rows;
    Ok(result)
}

/// Resample independent streams in parallel, preserving input order.
pub fn resample_all(
    streams: &[SensorStream],
    period: i64,
    policy: &SentinelPolicy,
) -> Result<Vec<ResampledStream>, ResampleError> {
    streams
        .par_iter()
        .map(|stream| resample_stream(stream, period, policy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(samples: &[(i64, f64)]) -> SensorStream {
        SensorStream::new(
            "0-0",
            samples.iter().map(|&(t, v)| Sample::new(t, v)).collect(),
        )
    }

    fn run(samples: &[(i64, f64)]) -> ResampledStream {
        resample_stream(&stream(samples), 10, &SentinelPolicy::default()).unwrap()
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(3, 10), 10);
        assert_eq!(align_up(10, 10), 10);
        assert_eq!(align_up(-3, 10), 0);
        assert_eq!(align_up(0, 10), 0);
    }

    #[test]
    fn test_invalid_period() {
        assert_eq!(
            StreamResampler::new(0, SentinelPolicy::default()).unwrap_err(),
            ResampleError::InvalidPeriod(0)
        );
    }

    #[test]
    fn test_first_sample_only_seeds() {
        let mut resampler = StreamResampler::new(10, SentinelPolicy::default()).unwrap();
        let mut out = Vec::new();

        assert_eq!(resampler.state(), BracketState::Seeding);
        resampler.push(Sample::new(3, 100.0), &mut out);

        assert!(out.is_empty());
        assert_eq!(resampler.pending_target(), Some(10));
        assert!(matches!(resampler.state(), BracketState::Bracketed { .. }));
    }

    #[test]
    fn test_interpolates_between_bracket() {
        let result = run(&[(3, 100.0), (14, 210.0), (25, 320.0)]);

        // (100 * 4 + 210 * 7) / 11 = 170
        assert_eq!(result.points.len(), 2);
        assert_eq!(result.points[0].0, 10);
        assert!((result.points[0].1 - 170.0).abs() < 1e-9);
        assert_eq!(result.points[1].0, 20);
        assert!((result.points[1].1 - 270.0).abs() < 1e-9);
        assert_eq!(result.window, Some(TimeWindow { start: 10, end: 20 }));
    }

    #[test]
    fn test_resampling_is_idempotent_on_aligned_input() {
        let input = [(100, 20.0), (110, 21.5), (120, 23.0), (130, 22.0)];
        let first = run(&input);
        assert_eq!(first.points, input.to_vec());

        let second = run(&first.points);
        assert_eq!(second.points, first.points);
    }

    #[test]
    fn test_output_grid_is_uniform() {
        let result = run(&[(1, 10.0), (7, 11.0), (33, 12.0), (34, 13.0), (61, 14.0), (95, 15.0)]);

        assert!(!result.points.is_empty());
        for pair in result.points.windows(2) {
            assert_eq!(pair[1].0 - pair[0].0, 10);
        }
        for (t, _) in &result.points {
            assert_eq!(t % 10, 0);
        }
    }

    #[test]
    fn test_gap_spanning_several_periods() {
        let result = run(&[(5, 0.5), (45, 4.5)]);
        let times: Vec<i64> = result.points.iter().map(|p| p.0).collect();
        assert_eq!(times, vec![10, 20, 30, 40]);
        assert!((result.points[2].1 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_readings_never_seed_or_bracket() {
        let result = run(&[(0, -1.0), (3, 100.0), (8, 9999.0), (13, 200.0)]);

        assert_eq!(result.rejected, 2);
        assert_eq!(result.raw_count, 4);
        assert_eq!(result.points.len(), 1);
        assert_eq!(result.points[0].0, 10);
        assert!((result.points[0].1 - 170.0).abs() < 1e-9);
    }

    #[test]
    fn test_late_samples_are_dropped() {
        let result = run(&[(3, 100.0), (14, 210.0), (12, 300.0), (25, 320.0)]);
        assert_eq!(result.dropped, 1);
        assert_eq!(result.points.len(), 2);
    }

    #[test]
    fn test_duplicate_aligned_seed_skips_grid_point() {
        let result = run(&[(10, 1.0), (10, 2.0), (20, 3.0)]);

        assert_eq!(result.degenerate, 1);
        assert_eq!(result.points, vec![(20, 3.0)]);
        assert_eq!(result.window, Some(TimeWindow { start: 20, end: 20 }));
    }

    #[test]
    fn test_no_data_has_no_window() {
        let result = run(&[(3, 100.0)]);
        assert!(result.points.is_empty());
        assert!(!result.has_data());
        assert_eq!(result.window, None);

        let empty = run(&[]);
        assert_eq!(empty.raw_count, 0);
        assert_eq!(empty.window, None);
    }

    #[test]
    fn test_resample_all_preserves_order() {
        let mut a = stream(&[(0, 1.0), (10, 2.0)]);
        a.id = "a".into();
        let mut b = stream(&[(5, 1.0), (25, 3.0)]);
        b.id = "b".into();

        let results = resample_all(&[a, b], 10, &SentinelPolicy::default()).unwrap();
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "b");
        assert_eq!(results[1].points, vec![(10, 1.5), (20, 2.5)]);
    }
}
