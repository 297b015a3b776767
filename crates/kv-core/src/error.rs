//! Core error types for klipper-voice

use std::path::PathBuf;
use thiserror::Error;

/// Transport-level errors.
///
/// None of these reach facade callers; the connection manager logs them
/// and takes the reconnect path.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// No usable endpoint in the configuration
    #[error("Endpoint not configured: {0}")]
    EndpointNotConfigured(#[from] ConfigError),

    /// Opening the socket failed
    #[error("Failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    /// Writing a frame failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Writing a frame did not finish in time
    #[error("Send timed out after {0:?}")]
    SendTimeout(std::time::Duration),

    /// The remote side closed the socket
    #[error("Connection closed: {0}")]
    Closed(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
