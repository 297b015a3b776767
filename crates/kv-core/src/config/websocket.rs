//! Transport tuning

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// `[websocket]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebsocketConfig {
    /// Delay before the first reconnect attempt
    #[serde(with = "duration_secs")]
    pub reconnect_delay: Duration,

    /// Upper bound for the reconnect delay
    #[serde(with = "duration_secs")]
    pub max_reconnect_delay: Duration,

    /// Growth factor between consecutive failed attempts (1.0 = fixed delay)
    pub backoff_multiplier: f64,

    /// Random extra delay as a fraction of the current delay (0.0 to 1.0)
    pub reconnect_jitter: f64,

    /// Budget for opening the socket and completing the handshake
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Interval between pings; zero disables keepalive
    #[serde(with = "duration_secs")]
    pub ping_interval: Duration,

    /// How long to wait for any inbound frame after a ping
    #[serde(with = "duration_secs")]
    pub ping_timeout: Duration,

    /// Budget for writing one frame
    #[serde(with = "duration_secs")]
    pub send_timeout: Duration,

    /// Budget for the worker to exit during stop
    #[serde(with = "duration_secs")]
    pub thread_join_timeout: Duration,
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(2),
            max_reconnect_delay: Duration::from_secs(30),
            backoff_multiplier: 1.0,
            reconnect_jitter: 0.0,
            connect_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(5),
            thread_join_timeout: Duration::from_secs(3),
        }
    }
}

impl WebsocketConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconnect_delay.is_zero() {
            return Err(ConfigError::Invalid(
                "websocket.reconnect_delay must be > 0".to_string(),
            ));
        }
        if self.max_reconnect_delay < self.reconnect_delay {
            return Err(ConfigError::Invalid(
                "websocket.max_reconnect_delay must be >= reconnect_delay".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "websocket.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reconnect_jitter) {
            return Err(ConfigError::Invalid(
                "websocket.reconnect_jitter must be between 0 and 1".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() || self.send_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "websocket.connect_timeout and send_timeout must be > 0".to_string(),
            ));
        }
        if !self.ping_interval.is_zero() && self.ping_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "websocket.ping_timeout must be > 0 when pings are enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether keepalive pings are enabled
    pub fn pings_enabled(&self) -> bool {
        !self.ping_interval.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WebsocketConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.thread_join_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_parse_fractional() {
        let config: WebsocketConfig = toml::from_str("reconnect_delay = 0.5\nping_interval = 0").unwrap();
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
        assert!(!config.pings_enabled());
        assert_eq!(config.send_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_shrinking_backoff() {
        let config = WebsocketConfig {
            backoff_multiplier: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let config = WebsocketConfig {
            reconnect_delay: Duration::from_secs(10),
            max_reconnect_delay: Duration::from_secs(5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_jitter_and_timeouts() {
        let config = WebsocketConfig {
            reconnect_jitter: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WebsocketConfig {
            send_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WebsocketConfig {
            ping_interval: Duration::ZERO,
            ping_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
