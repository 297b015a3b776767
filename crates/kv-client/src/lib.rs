//! kv-client: Persistent Moonraker client for klipper-voice
//!
//! The client keeps one WebSocket open to the printer's Moonraker host,
//! folds pushed status updates into a [`MachineStatus`] record and buffers
//! matched firmware messages for consumers that poll at their own pace.
//!
//! ```no_run
//! # async fn demo() {
//! use kv_client::KlipperClient;
//! use kv_core::config::ClientConfig;
//!
//! let mut config = ClientConfig::default();
//! config.klipper.host = Some("voron.local".to_string());
//!
//! let client = KlipperClient::with_config(config);
//! client.start();
//! println!("{:?}", client.snapshot().print_state);
//! client.stop().await;
//! # }
//! ```

pub mod client;
pub mod facade;
pub mod mailbox;
pub mod state;
pub mod status;
pub mod tunnel;

pub use client::KlipperClient;
pub use mailbox::{Offer, ResponseMailbox};
pub use state::{LifecycleFlags, SharedState};
pub use status::{MachineStatus, StatusChange, StatusMachine, Transition};
