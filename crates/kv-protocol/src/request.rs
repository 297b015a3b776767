//! Outbound requests and their correlation ids

use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON-RPC correlation id attached to outbound requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Create a new request ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Reserved id for the subscribe handshake
    pub const SUBSCRIBE: RequestId = RequestId(1);

    /// Reserved id for the initial and on-demand status query
    pub const QUERY: RequestId = RequestId(2);
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RequestId::SUBSCRIBE => write!(f, "subscribe#{}", self.0),
            RequestId::QUERY => write!(f, "query#{}", self.0),
            _ => write!(f, "request#{}", self.0),
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Kind of request the client sends to the remote host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// One-shot query of the tracked printer objects
    QueryObjects,
    /// Subscribe to push notifications for the tracked printer objects
    SubscribeObjects,
}

impl RequestKind {
    /// JSON-RPC method name
    pub fn method(&self) -> &'static str {
        match self {
            RequestKind::QueryObjects => "printer.objects.query",
            RequestKind::SubscribeObjects => "printer.objects.subscribe",
        }
    }
}

/// An outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Correlation id echoed back in the response
    pub id: RequestId,
    /// What is being requested
    pub kind: RequestKind,
}

impl Request {
    /// Status query with the reserved query id
    pub fn query() -> Self {
        Self {
            id: RequestId::QUERY,
            kind: RequestKind::QueryObjects,
        }
    }

    /// Subscription with the reserved subscribe id
    pub fn subscribe() -> Self {
        Self {
            id: RequestId::SUBSCRIBE,
            kind: RequestKind::SubscribeObjects,
        }
    }
}
