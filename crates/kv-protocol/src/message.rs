//! Typed inbound messages
//!
//! The codec turns every inbound frame into exactly one [`Message`]. The
//! dispatch layer in the client matches on it exhaustively, so adding a new
//! kind of frame is a compile-time change rather than a silently ignored
//! method name.
//!
//! # Status payload
//!
//! Status frames carry a partial, nested map keyed by printer object name:
//!
//! ```json
//! {"print_stats": {"state": "printing", "print_duration": 100.0},
//!  "heater_bed": {"temperature": 59.8}}
//! ```
//!
//! Only the objects and fields listed in
//! [`QUERY_OBJECTS`](crate::envelope::QUERY_OBJECTS) are modelled. Absent
//! fields stay `None`; a field of the wrong JSON type is also `None` so one
//! odd value cannot discard the rest of the update.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::request::RequestId;

/// Lifecycle notices pushed by the remote host about the firmware process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleNotice {
    /// Firmware entered shutdown (typically an MCU fault)
    Shutdown,
    /// Firmware (re)started and is ready; subscriptions must be re-issued
    Ready,
    /// The host lost its connection to the firmware
    Disconnected,
}

impl LifecycleNotice {
    /// Map a notification method name to a lifecycle notice
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "notify_klippy_shutdown" => Some(Self::Shutdown),
            "notify_klippy_ready" => Some(Self::Ready),
            "notify_klippy_disconnected" => Some(Self::Disconnected),
            _ => None,
        }
    }

    /// Notification method name for this notice
    pub fn method(&self) -> &'static str {
        match self {
            Self::Shutdown => "notify_klippy_shutdown",
            Self::Ready => "notify_klippy_ready",
            Self::Disconnected => "notify_klippy_disconnected",
        }
    }
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Acknowledgment of the subscribe request
    SubscribeAck { id: RequestId },

    /// Response to a status query
    QueryResult {
        id: RequestId,
        status: StatusMap,
        /// Payload as received, for diagnostics
        raw: Value,
    },

    /// Pushed partial status update
    StatusNotification {
        status: StatusMap,
        /// Payload as received, for diagnostics
        raw: Value,
    },

    /// Free-text line emitted by the firmware (already trimmed)
    TextEvent { text: String },

    /// Firmware lifecycle notice
    Lifecycle(LifecycleNotice),

    /// A request was answered with a JSON-RPC error object
    RequestFailed {
        id: Option<RequestId>,
        message: String,
    },

    /// Malformed JSON, unknown method or unexpected shape
    Unparseable { reason: String },
}

/// Partial printer status
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusMap {
    #[serde(default, deserialize_with = "lenient")]
    pub print_stats: Option<PrintStats>,
    #[serde(default, deserialize_with = "lenient")]
    pub display_status: Option<DisplayStatus>,
    #[serde(default, deserialize_with = "lenient")]
    pub heater_bed: Option<HeaterStatus>,
    #[serde(default, deserialize_with = "lenient")]
    pub extruder: Option<HeaterStatus>,
    #[serde(default, deserialize_with = "lenient")]
    pub fan: Option<FanStatus>,
}

/// `print_stats` object
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PrintStats {
    #[serde(default, deserialize_with = "lenient")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub filename: Option<String>,
    /// Fraction in `[0, 1]`
    #[serde(default, deserialize_with = "lenient")]
    pub progress: Option<f64>,
    /// Seconds
    #[serde(default, deserialize_with = "lenient")]
    pub print_duration: Option<f64>,
    /// Millimetres of filament
    #[serde(default, deserialize_with = "lenient")]
    pub filament_used: Option<f64>,
}

/// `display_status` object
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DisplayStatus {
    /// Fraction in `[0, 1]`
    #[serde(default, deserialize_with = "lenient")]
    pub progress: Option<f64>,
}

/// `heater_bed` / `extruder` objects
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HeaterStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub target: Option<f64>,
}

/// `fan` object
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FanStatus {
    /// Duty cycle fraction in `[0, 1]`
    #[serde(default, deserialize_with = "lenient")]
    pub speed: Option<f64>,
}

impl StatusMap {
    /// Build from a JSON value; anything that is not an object yields `None`
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Print progress fraction, preferring `print_stats` over `display_status`
    pub fn progress(&self) -> Option<f64> {
        self.print_stats
            .as_ref()
            .and_then(|s| s.progress)
            .or_else(|| self.display_status.as_ref().and_then(|d| d.progress))
    }
}

/// Deserialize an optional leaf, mapping type mismatches to `None`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}
