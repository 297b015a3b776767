//! kv-protocol: Wire protocol for the klipper-voice client
//!
//! This crate defines the JSON-RPC envelopes exchanged with the remote
//! Moonraker host over a WebSocket, and the typed messages the client
//! dispatches on after decoding.

pub mod error;
pub mod envelope;
pub mod message;
pub mod codec;
pub mod request;

pub use error::ProtocolError;
pub use envelope::{JSONRPC_VERSION, QUERY_OBJECTS};
pub use message::{
    DisplayStatus, FanStatus, HeaterStatus, LifecycleNotice, Message, PrintStats, StatusMap,
};
pub use codec::MoonrakerCodec;
pub use request::{Request, RequestId, RequestKind};
