//! Transport to the Moonraker host

mod connector;
mod reconnect;

pub use connector::{ActiveConnection, TunnelEvent};
pub use reconnect::ExponentialBackoff;
