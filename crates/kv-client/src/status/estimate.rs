//! Remaining-time estimate

use std::time::Duration;

/// Linear remaining-time estimate, cached per progress percentage.
///
/// The estimate is only recomputed when the percentage moves, so elapsed
/// time ticking between percent steps leaves it untouched.
#[derive(Debug, Clone, Default)]
pub struct RemainingEstimator {
    /// Percentage the cached value was computed for
    last_percent: Option<u8>,
    cached: Duration,
}

impl RemainingEstimator {
    /// Create an estimator with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time for `percent` (0-100) after `elapsed`.
    ///
    /// Degenerate inputs (zero percent, zero elapsed) yield zero.
    pub fn remaining(&mut self, percent: u8, elapsed: Duration) -> Duration {
        if self.last_percent == Some(percent) {
            return self.cached;
        }

        let remaining = if percent > 0 && !elapsed.is_zero() {
            let fraction = f64::from(percent.min(100)) / 100.0;
            let total = elapsed.as_secs_f64() / fraction;
            Duration::try_from_secs_f64(total - elapsed.as_secs_f64()).unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        };

        self.last_percent = Some(percent);
        self.cached = remaining;
        remaining
    }

    /// Forget the cache
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_way() {
        let mut est = RemainingEstimator::new();
        assert_eq!(est.remaining(50, Duration::from_secs(100)), Duration::from_secs(100));
    }

    #[test]
    fn test_cached_while_percent_unchanged() {
        let mut est = RemainingEstimator::new();
        let first = est.remaining(25, Duration::from_secs(60));
        assert_eq!(first, Duration::from_secs(180));

        let second = est.remaining(25, Duration::from_secs(90));
        assert_eq!(second, first);

        let third = est.remaining(50, Duration::from_secs(90));
        assert_eq!(third, Duration::from_secs(90));
    }

    #[test]
    fn test_degenerate_inputs_are_zero() {
        let mut est = RemainingEstimator::new();
        assert_eq!(est.remaining(0, Duration::from_secs(10)), Duration::ZERO);
        assert_eq!(est.remaining(10, Duration::ZERO), Duration::ZERO);
        assert_eq!(est.remaining(100, Duration::from_secs(10)), Duration::ZERO);
    }

    #[test]
    fn test_reset_forces_recompute() {
        let mut est = RemainingEstimator::new();
        est.remaining(50, Duration::from_secs(10));
        est.reset();
        assert_eq!(est.remaining(50, Duration::from_secs(20)), Duration::from_secs(20));
    }
}
