//! Backoff between reconnect attempts

use std::time::Duration;

use kv_core::config::WebsocketConfig;

/// Exponential backoff with jitter for reconnection attempts.
///
/// With a multiplier of 1.0 and no jitter this is a fixed delay.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// First delay, restored by [`reset`](Self::reset)
    initial: Duration,
    /// Current delay
    current: Duration,
    /// Maximum delay
    max: Duration,
    /// Multiplier
    multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    jitter: f64,
}

impl ExponentialBackoff {
    /// Create a new backoff from the `[websocket]` section
    pub fn from_config(config: &WebsocketConfig) -> Self {
        Self::new(
            config.reconnect_delay,
            config.max_reconnect_delay,
            config.backoff_multiplier,
            config.reconnect_jitter,
        )
    }

    /// Create a new backoff with custom parameters
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            initial,
            current: initial,
            max,
            multiplier,
            jitter,
        }
    }

    /// Get the next delay and advance the backoff
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;

        let next = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max);
        self.current = std::cmp::min(next, self.max);

        let jitter_amount = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        delay + Duration::try_from_secs_f64(jitter_amount).unwrap_or(Duration::ZERO)
    }

    /// Back to the initial delay
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_fixed_delay() {
        let mut backoff = ExponentialBackoff::from_config(&WebsocketConfig::default());
        for _ in 0..5 {
            assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        }
    }

    #[test]
    fn test_backoff_increases_and_caps() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(4), 2.0, 0.0);

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn test_reset() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), 3.0, 0.0);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_bounds() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(2), Duration::from_secs(2), 1.0, 0.5);
        for _ in 0..20 {
            let d = backoff.next_delay();
            assert!(d >= Duration::from_secs(2) && d <= Duration::from_secs(3));
        }
    }
}
