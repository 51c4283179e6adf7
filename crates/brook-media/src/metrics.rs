use std::time::Duration;

/// Fraction of remaining content already buffered ahead of the playhead,
/// clamped to [0, 1]. Returns 0.0 while the duration is unknown.
pub fn buffer_health(position: f64, buffered_end: f64, duration: f64) -> f64 {
    if !duration.is_finite() || duration <= 0.0 {
        return 0.0;
    }
    ((buffered_end - position) / duration).clamp(0.0, 1.0)
}

/// A single goodput reading taken from two consecutive progress ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputSample {
    pub bits_per_second: u64,
    pub taken_at: Duration,
}

/// Opportunistic download-speed estimator.
///
/// Each sample is computed from the immediately preceding reading and
/// overwrites the previous one; there is no averaging. A sample older than
/// `max_sample_age` is never reported, so a stale measurement cannot drive
/// a quality decision.
#[derive(Debug, Clone)]
pub struct ThroughputEstimator {
    max_sample_age: Duration,
    last_reading: Option<(u64, Duration)>,
    sample: Option<ThroughputSample>,
}

impl ThroughputEstimator {
    pub fn new(max_sample_age: Duration) -> Self {
        Self {
            max_sample_age,
            last_reading: None,
            sample: None,
        }
    }

    /// Record the engine's cumulative downloaded byte count at `now`.
    ///
    /// Returns the freshly computed bits-per-second value once two
    /// consecutive readings are available.
    pub fn record(&mut self, cumulative_bytes: u64, now: Duration) -> Option<u64> {
        let Some((previous_bytes, previous_at)) = self.last_reading else {
            self.last_reading = Some((cumulative_bytes, now));
            return None;
        };

        if cumulative_bytes < previous_bytes {
            // Byte counter went backwards: the source was swapped out from
            // under us. Restart sampling from this reading.
            self.sample = None;
            self.last_reading = Some((cumulative_bytes, now));
            return None;
        }

        let elapsed = now.saturating_sub(previous_at);
        if elapsed.is_zero() {
            return None;
        }

        let bits = (cumulative_bytes - previous_bytes).saturating_mul(8);
        let bits_per_second = (bits as f64 / elapsed.as_secs_f64()) as u64;
        self.last_reading = Some((cumulative_bytes, now));
        self.sample = Some(ThroughputSample {
            bits_per_second,
            taken_at: now,
        });
        Some(bits_per_second)
    }

    /// Latest sample in bits per second, unless none exists or it has aged
    /// out.
    pub fn estimate(&self, now: Duration) -> Option<u64> {
        self.sample
            .filter(|sample| now.saturating_sub(sample.taken_at) <= self.max_sample_age)
            .map(|sample| sample.bits_per_second)
    }

    /// Drop the pending reading and the sample. Called on seeks and source
    /// swaps, where the engine's byte counter restarts.
    pub fn invalidate(&mut self) {
        self.last_reading = None;
        self.sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_AGE: Duration = Duration::from_secs(5);

    #[test]
    fn health_is_fraction_of_duration() {
        let health = buffer_health(10.0, 40.0, 100.0);
        assert!((health - 0.3).abs() < 1e-9);
    }

    #[test]
    fn health_clamps_to_unit_interval() {
        assert_eq!(buffer_health(90.0, 20.0, 100.0), 0.0);
        assert_eq!(buffer_health(0.0, 500.0, 100.0), 1.0);
    }

    #[test]
    fn health_is_zero_without_duration() {
        assert_eq!(buffer_health(5.0, 30.0, 0.0), 0.0);
        assert_eq!(buffer_health(5.0, 30.0, f64::NAN), 0.0);
    }

    #[test]
    fn needs_two_readings_for_a_sample() {
        let mut estimator = ThroughputEstimator::new(MAX_AGE);
        assert_eq!(estimator.record(1_000_000, Duration::from_secs(1)), None);
        assert_eq!(estimator.estimate(Duration::from_secs(1)), None);
    }

    #[test]
    fn computes_bits_per_second_from_consecutive_ticks() {
        let mut estimator = ThroughputEstimator::new(MAX_AGE);
        estimator.record(0, Duration::from_secs(1));
        let bps = estimator.record(1_000_000, Duration::from_secs(2));
        assert_eq!(bps, Some(8_000_000));
        assert_eq!(estimator.estimate(Duration::from_secs(2)), Some(8_000_000));
    }

    #[test]
    fn sample_overwrites_previous_sample() {
        let mut estimator = ThroughputEstimator::new(MAX_AGE);
        estimator.record(0, Duration::from_secs(1));
        estimator.record(1_000_000, Duration::from_secs(2));
        estimator.record(1_250_000, Duration::from_secs(3));
        assert_eq!(estimator.estimate(Duration::from_secs(3)), Some(2_000_000));
    }

    #[test]
    fn stale_sample_is_never_reported() {
        let mut estimator = ThroughputEstimator::new(MAX_AGE);
        estimator.record(0, Duration::from_secs(1));
        estimator.record(1_000_000, Duration::from_secs(2));
        assert_eq!(estimator.estimate(Duration::from_secs(7)), Some(8_000_000));
        assert_eq!(estimator.estimate(Duration::from_secs(8)), None);
    }

    #[test]
    fn counter_regression_restarts_sampling() {
        let mut estimator = ThroughputEstimator::new(MAX_AGE);
        estimator.record(5_000_000, Duration::from_secs(1));
        estimator.record(6_000_000, Duration::from_secs(2));
        assert_eq!(estimator.record(100, Duration::from_secs(3)), None);
        assert_eq!(estimator.estimate(Duration::from_secs(3)), None);

        let bps = estimator.record(200_100, Duration::from_secs(4));
        assert_eq!(bps, Some(1_600_000));
    }

    #[test]
    fn zero_elapsed_tick_is_ignored() {
        let mut estimator = ThroughputEstimator::new(MAX_AGE);
        estimator.record(0, Duration::from_secs(1));
        assert_eq!(estimator.record(9_999, Duration::from_secs(1)), None);
        assert_eq!(estimator.estimate(Duration::from_secs(1)), None);
    }

    #[test]
    fn invalidate_clears_reading_and_sample() {
        let mut estimator = ThroughputEstimator::new(MAX_AGE);
        estimator.record(0, Duration::from_secs(1));
        estimator.record(1_000_000, Duration::from_secs(2));
        estimator.invalidate();
        assert_eq!(estimator.estimate(Duration::from_secs(2)), None);
        assert_eq!(estimator.record(0, Duration::from_secs(3)), None);
    }
}
