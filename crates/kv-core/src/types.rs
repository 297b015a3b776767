//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Print state reported by the firmware
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintState {
    /// Idle, no job loaded
    Standby,
    /// Job running
    Printing,
    /// Job paused
    Paused,
    /// Job finished
    Complete,
    /// Firmware reported an error
    Error,
    /// Nothing received yet, or a state this client does not model
    #[default]
    Unknown,
}

impl PrintState {
    /// Parse the firmware's `print_stats.state` string.
    ///
    /// Anything unrecognized maps to `Unknown`, including the firmware's own
    /// `"cancelled"`: cancellation is inferred from a later STANDBY instead.
    pub fn from_remote(value: &str) -> Self {
        match value {
            "standby" => Self::Standby,
            "printing" => Self::Printing,
            "paused" => Self::Paused,
            "complete" => Self::Complete,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standby => "standby",
            Self::Printing => "printing",
            Self::Paused => "paused",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PrintState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the current or most recent print run.
///
/// Derived by the status machine; consumers cannot set it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionState {
    /// Run in progress, or no run observed yet
    #[default]
    Pending,
    /// Run reached COMPLETE
    Complete,
    /// Run went back to STANDBY without completing (best-effort inference)
    Cancelled,
}

impl fmt::Display for CompletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionState::Pending => write!(f, "pending"),
            CompletionState::Complete => write!(f, "complete"),
            CompletionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Transport state of the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// No socket; waiting to (re)connect or stopped
    #[default]
    Idle,
    /// Opening the socket
    Connecting,
    /// Socket open, subscribe held back while a restart is pending
    Connected,
    /// Socket open, subscribe request sent, no ack yet
    Subscribing,
    /// Subscription acknowledged; push updates flowing
    Subscribed,
    /// Tearing the socket down
    Closing,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Idle => write!(f, "idle"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Subscribing => write!(f, "subscribing"),
            ConnectionStatus::Subscribed => write!(f, "subscribed"),
            ConnectionStatus::Closing => write!(f, "closing"),
        }
    }
}
