//! kv-core: Core types and configuration for klipper-voice
//!
//! This crate provides the print-state vocabulary, the error taxonomy and
//! the configuration structures shared by the protocol client and the
//! daemon binary.

pub mod config;
pub mod error;
pub mod types;

pub use error::{ConfigError, ConnectionError};
pub use types::{CompletionState, ConnectionStatus, PrintState};
