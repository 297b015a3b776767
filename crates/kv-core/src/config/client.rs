//! Client configuration

use serde::{Deserialize, Serialize};

use super::responses::ResponseTemplates;
use super::websocket::WebsocketConfig;
use crate::error::ConfigError;

/// Full configuration consumed by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote endpoint
    pub klipper: KlipperConfig,

    /// Transport tuning
    pub websocket: WebsocketConfig,

    /// Admission templates for free-text events
    pub response: ResponseTemplates,
}

impl ClientConfig {
    /// WebSocket URL of the remote endpoint
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        self.klipper.endpoint()
    }
}

/// Location of the remote Moonraker host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KlipperConfig {
    /// Hostname or IP address. Without it the client idles in its retry loop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// TCP port
    pub port: u16,

    /// HTTP path of the WebSocket endpoint
    pub websocket_path: String,
}

impl Default for KlipperConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 7125,
            websocket_path: "/websocket".to_string(),
        }
    }
}

impl KlipperConfig {
    /// Build `ws://host:port/path`
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::MissingField("klipper.host".to_string()))?;

        if self.port == 0 {
            return Err(ConfigError::Invalid("klipper.port must not be 0".to_string()));
        }

        let path = self.websocket_path.trim();
        let separator = if path.starts_with('/') { "" } else { "/" };
        Ok(format!("ws://{}:{}{}{}", host, self.port, separator, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_defaults() {
        let config = KlipperConfig {
            host: Some("192.168.1.50".to_string()),
            ..Default::default()
        };
        assert_eq!(config.endpoint().unwrap(), "ws://192.168.1.50:7125/websocket");
    }

    #[test]
    fn test_endpoint_adds_leading_slash() {
        let config = KlipperConfig {
            host: Some("printer".to_string()),
            port: 80,
            websocket_path: "ws".to_string(),
        };
        assert_eq!(config.endpoint().unwrap(), "ws://printer:80/ws");
    }

    #[test]
    fn test_missing_host() {
        let config = KlipperConfig::default();
        assert!(matches!(config.endpoint(), Err(ConfigError::MissingField(_))));

        let config = KlipperConfig {
            host: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.endpoint(), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            [klipper]
            host = "voron.local"
            "#,
        )
        .unwrap();
        assert_eq!(config.klipper.port, 7125);
        assert_eq!(config.endpoint().unwrap(), "ws://voron.local:7125/websocket");
        assert!(config.response.is_empty());
    }
}
