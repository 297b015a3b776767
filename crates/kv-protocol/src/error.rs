//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding outbound requests.
///
/// Decoding never fails: malformed inbound frames become
/// [`Message::Unparseable`](crate::Message::Unparseable).
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
