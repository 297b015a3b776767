//! Configuration management for klipper-voice
//!
//! The client never caches configuration beyond a single operation: every
//! connect attempt, reconfigure and text-event admission asks the
//! [`ConfigProvider`] for a fresh [`ClientConfig`] snapshot.
//!
//! # Example
//!
//! ```toml
//! [klipper]
//! host = "voron.local"
//! port = 7125
//! websocket_path = "/websocket"
//!
//! [websocket]
//! reconnect_delay = 2
//! ping_interval = 30
//! ping_timeout = 10
//! send_timeout = 5
//! thread_join_timeout = 3
//!
//! [response.filament]
//! runout = ["// Filament runout", "echo: Filament runout detected"]
//! ```

mod client;
mod provider;
mod responses;
pub mod serde_utils;
mod websocket;

pub use client::{ClientConfig, KlipperConfig};
pub use provider::{ChangedSections, ConfigProvider, SharedConfig};
pub use responses::{ResponseTemplates, TemplateMatch};
pub use websocket::WebsocketConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("klipper-voice")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_load_missing_file() {
        let result: Result<ClientConfig, _> = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[klipper]\nhost = \"printer.lan\"\n[websocket]\nreconnect_delay = 1.5\n",
        )
        .unwrap();

        let loaded: ClientConfig = load_config(&path).unwrap();
        assert_eq!(loaded.klipper.host.as_deref(), Some("printer.lan"));
        assert_eq!(loaded.websocket.reconnect_delay, Duration::from_millis(1500));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not a valid toml").unwrap();
        let result: Result<ClientConfig, _> = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
