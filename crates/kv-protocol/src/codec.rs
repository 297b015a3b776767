//! Text-frame codec for the JSON-RPC protocol

use serde_json::Value;

use crate::envelope::{query_objects_param, InboundEnvelope, OutboundEnvelope, JSONRPC_VERSION};
use crate::error::ProtocolError;
use crate::message::{LifecycleNotice, Message, StatusMap};
use crate::request::{Request, RequestId, RequestKind};

const METHOD_STATUS_UPDATE: &str = "notify_status_update";
const METHOD_GCODE_RESPONSE: &str = "notify_gcode_response";

/// Codec for encoding requests and decoding inbound frames.
///
/// Stateless; decoding never fails past this boundary.
#[derive(Debug, Default, Clone, Copy)]
pub struct MoonrakerCodec;

impl MoonrakerCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self
    }

    /// Encode a request into the text payload of a WebSocket frame
    pub fn encode(&self, request: &Request) -> Result<String, ProtocolError> {
        let params = match request.kind {
            RequestKind::QueryObjects | RequestKind::SubscribeObjects => {
                serde_json::json!({ "objects": query_objects_param() })
            }
        };
        let envelope = OutboundEnvelope {
            jsonrpc: JSONRPC_VERSION,
            id: request.id.as_u64(),
            method: request.kind.method(),
            params,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decode the text payload of an inbound frame
    pub fn decode(&self, text: &str) -> Message {
        let envelope: InboundEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                return Message::Unparseable {
                    reason: format!("invalid JSON: {}", e),
                }
            }
        };

        if let Some(notice) = envelope.method.as_deref().and_then(LifecycleNotice::from_method) {
            return Message::Lifecycle(notice);
        }

        let id = envelope.numeric_id().map(RequestId::new);

        if let (Some(id), Some(result)) = (id, envelope.result.as_ref()) {
            if id == RequestId::SUBSCRIBE {
                return Message::SubscribeAck { id };
            }
            if id == RequestId::QUERY {
                let raw = result
                    .get("status")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default()));
                return match StatusMap::from_value(&raw) {
                    Some(status) => Message::QueryResult { id, status, raw },
                    None => Message::Unparseable {
                        reason: "query result status is not an object".to_string(),
                    },
                };
            }
        }

        match envelope.method.as_deref() {
            Some(METHOD_STATUS_UPDATE) => {
                return match first_param(&envelope) {
                    Some(raw) => match StatusMap::from_value(raw) {
                        Some(status) => Message::StatusNotification {
                            status,
                            raw: raw.clone(),
                        },
                        None => Message::Unparseable {
                            reason: "status update payload is not an object".to_string(),
                        },
                    },
                    None => Message::Unparseable {
                        reason: "status update without params".to_string(),
                    },
                };
            }
            Some(METHOD_GCODE_RESPONSE) => {
                return match first_param(&envelope).and_then(Value::as_str) {
                    Some(text) => Message::TextEvent {
                        text: text.trim().to_string(),
                    },
                    None => Message::Unparseable {
                        reason: "gcode response without text".to_string(),
                    },
                };
            }
            _ => {}
        }

        if let Some(error) = envelope.error {
            return Message::RequestFailed {
                id,
                message: error.message,
            };
        }

        let reason = match (envelope.method, id) {
            (Some(method), _) => format!("unhandled method '{}'", method),
            (None, Some(id)) => format!("response to unknown {}", id),
            (None, None) => "unrecognized frame shape".to_string(),
        };
        Message::Unparseable { reason }
    }
}

fn first_param(envelope: &InboundEnvelope) -> Option<&Value> {
    envelope.params.as_ref().and_then(Value::as_array).and_then(|p| p.first())
}
