//! Consumer-facing accessors
//!
//! Everything here takes a lock, copies or mutates, and returns. None of it
//! waits on the connection worker or touches the network.

use serde_json::Value;

use kv_core::ConnectionStatus;
use kv_protocol::LifecycleNotice;

use crate::client::{KlipperClient, WorkerCommand};
use crate::state::LifecycleFlags;
use crate::status::MachineStatus;

impl KlipperClient {
    /// Copy of the current printer status
    pub fn snapshot(&self) -> MachineStatus {
        self.inner.state.snapshot()
    }

    /// Whether a matched response is waiting to be consumed
    pub fn has_pending_response(&self) -> bool {
        self.inner.state.has_pending_response()
    }

    /// The matched response currently waiting, if any
    pub fn pending_response(&self) -> Option<String> {
        self.inner.state.pending_response()
    }

    /// Mark the current response consumed and move to the next queued one.
    ///
    /// Returns the new current response.
    pub fn clear_response(&self) -> Option<String> {
        self.inner.state.clear_response()
    }

    /// Set the shared "estimate announced" flag
    pub fn set_announced(&self, value: bool) {
        self.inner.state.set_announced(value);
    }

    /// Shared "estimate announced" flag
    pub fn is_announced(&self) -> bool {
        self.inner.state.is_announced()
    }

    /// Lifecycle notices not yet acknowledged
    pub fn lifecycle(&self) -> LifecycleFlags {
        self.inner.state.lifecycle()
    }

    /// Clear one lifecycle flag. Returns whether it was raised.
    pub fn acknowledge(&self, notice: LifecycleNotice) -> bool {
        self.inner.state.acknowledge(notice)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.state.connection()
    }

    /// Socket open, whether or not the subscription is in place
    pub fn is_connected(&self) -> bool {
        matches!(
            self.connection_status(),
            ConnectionStatus::Connected
                | ConnectionStatus::Subscribing
                | ConnectionStatus::Subscribed
        )
    }

    pub fn is_subscribed(&self) -> bool {
        self.connection_status() == ConnectionStatus::Subscribed
    }

    /// Most recent status payload as received
    pub fn last_raw_status(&self) -> Option<Value> {
        self.inner.state.last_raw_status()
    }

    /// Ask the worker for a fresh status query.
    ///
    /// Returns `false` if the request was dropped because there is no open
    /// connection or the worker is busy.
    pub fn query_status(&self) -> bool {
        if !self.is_connected() {
            tracing::debug!("Not connected, dropping status query");
            return false;
        }

        let worker = self.inner.worker.lock();
        let Some(worker) = worker.as_ref() else {
            return false;
        };
        match worker.commands.try_send(WorkerCommand::QueryStatus) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Status query dropped: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_core::config::ClientConfig;

    #[test]
    fn test_idle_client_facade() {
        let client = KlipperClient::with_config(ClientConfig::default());
        assert_eq!(client.snapshot(), MachineStatus::default());
        assert!(!client.has_pending_response());
        assert_eq!(client.clear_response(), None);
        assert!(!client.is_connected());
        assert!(!client.query_status());
        assert!(client.last_raw_status().is_none());
    }

    #[test]
    fn test_announced_flag() {
        let client = KlipperClient::with_config(ClientConfig::default());
        assert!(!client.is_announced());
        client.set_announced(true);
        assert!(client.clone().is_announced());
        client.set_announced(false);
        assert!(!client.is_announced());
    }

    #[test]
    fn test_connected_without_subscription() {
        let client = KlipperClient::with_config(ClientConfig::default());
        client.inner.state.set_connection(ConnectionStatus::Connected);
        assert!(client.is_connected());
        assert!(!client.is_subscribed());

        client.inner.state.set_connection(ConnectionStatus::Connecting);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_safe() {
        let client = KlipperClient::with_config(ClientConfig::default());
        client.stop().await;
        client.stop().await;
        assert!(!client.is_running());
        assert_eq!(client.connection_status(), ConnectionStatus::Idle);
    }
}
