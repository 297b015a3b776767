//! JSON-RPC envelopes
//!
//! Every frame on the socket is a single JSON-RPC 2.0 object carried in a
//! WebSocket text message:
//! - outbound: `{"jsonrpc": "2.0", "id": <u64>, "method": <str>, "params": {...}}`
//! - inbound responses: `{"id": <u64>, "result": {...}}` or `{"id": <u64>, "error": {...}}`
//! - inbound notifications: `{"method": <str>, "params": [...]}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version carried in every outbound envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Printer objects and fields tracked by the client.
///
/// Sent verbatim as the `objects` parameter of both query and subscribe.
pub const QUERY_OBJECTS: &[(&str, &[&str])] = &[
    (
        "print_stats",
        &["state", "filename", "progress", "print_duration", "filament_used"],
    ),
    ("display_status", &["progress"]),
    ("heater_bed", &["temperature", "target"]),
    ("extruder", &["temperature", "target"]),
    ("fan", &["speed"]),
];

/// Build the `objects` parameter from [`QUERY_OBJECTS`]
pub fn query_objects_param() -> Value {
    let objects = QUERY_OBJECTS
        .iter()
        .map(|(object, fields)| {
            let fields = fields.iter().map(|f| Value::from(*f)).collect();
            ((*object).to_string(), Value::Array(fields))
        })
        .collect::<serde_json::Map<_, _>>();
    Value::Object(objects)
}

/// Outbound request envelope
#[derive(Debug, Serialize)]
pub struct OutboundEnvelope<'a> {
    pub jsonrpc: &'a str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

/// Inbound frame, before dispatch
///
/// All members are optional so that responses and notifications share one
/// shape; the codec decides what the frame is from which members are present.
#[derive(Debug, Default, Deserialize)]
pub struct InboundEnvelope {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

impl InboundEnvelope {
    /// Numeric correlation id, if the frame carries one
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.as_ref().and_then(Value::as_u64)
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}
