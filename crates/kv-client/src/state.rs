//! State shared between the connection worker and facade callers
//!
//! Lock discipline:
//! - `inner` guards the status machine, the mailbox, lifecycle flags and
//!   the connection status. Critical sections are short and never span an
//!   `.await`.
//! - `announced` guards the single cross-cutting announcement flag.
//! - When both are needed, `inner` is taken first.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use kv_core::config::ResponseTemplates;
use kv_core::ConnectionStatus;
use kv_protocol::{LifecycleNotice, StatusMap};

use crate::mailbox::{Offer, ResponseMailbox};
use crate::status::{MachineStatus, StatusChange, StatusMachine};

/// Firmware lifecycle notices not yet acknowledged by an observer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleFlags {
    /// Firmware restarted and reported ready
    pub klipper_ready: bool,
    /// Firmware shut down (MCU fault)
    pub klipper_shutdown: bool,
    /// Host lost its connection to the firmware
    pub klipper_disconnected: bool,
}

impl LifecycleFlags {
    fn slot(&mut self, notice: LifecycleNotice) -> &mut bool {
        match notice {
            LifecycleNotice::Ready => &mut self.klipper_ready,
            LifecycleNotice::Shutdown => &mut self.klipper_shutdown,
            LifecycleNotice::Disconnected => &mut self.klipper_disconnected,
        }
    }

    /// Whether `notice` is raised
    pub fn is_raised(&self, notice: LifecycleNotice) -> bool {
        match notice {
            LifecycleNotice::Ready => self.klipper_ready,
            LifecycleNotice::Shutdown => self.klipper_shutdown,
            LifecycleNotice::Disconnected => self.klipper_disconnected,
        }
    }

    /// Raised notices
    pub fn raised(&self) -> Vec<LifecycleNotice> {
        [
            LifecycleNotice::Ready,
            LifecycleNotice::Shutdown,
            LifecycleNotice::Disconnected,
        ]
        .into_iter()
        .filter(|n| self.is_raised(*n))
        .collect()
    }
}

#[derive(Debug, Default)]
struct StateInner {
    machine: StatusMachine,
    mailbox: ResponseMailbox,
    lifecycle: LifecycleFlags,
    connection: ConnectionStatus,
    last_raw: Option<Value>,
}

/// Status, mailbox and flags behind the documented locks
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<StateInner>,
    announced: Mutex<bool>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a status payload in, clearing the announcement on a new run
    pub fn apply_status(&self, status: &StatusMap, raw: Value) -> StatusChange {
        let mut inner = self.inner.lock();
        inner.last_raw = Some(raw);
        let change = inner.machine.apply_partial(status);
        if change.transition.is_some_and(|t| t.reset_announcement) {
            *self.announced.lock() = false;
        }
        change
    }

    /// Run a text event through the admission filter
    pub fn offer_response(&self, text: &str, templates: &ResponseTemplates) -> Offer {
        let mut inner = self.inner.lock();
        let offer = inner.mailbox.offer(text, templates);
        if offer == Offer::Current {
            inner.machine.set_last_response(Some(text.to_string()));
        }
        offer
    }

    /// Advance the mailbox; returns the new current item
    pub fn clear_response(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        let next = inner.mailbox.clear_and_advance().map(str::to_string);
        inner.machine.set_last_response(next.clone());
        next
    }

    pub fn pending_response(&self) -> Option<String> {
        self.inner.lock().mailbox.peek().map(str::to_string)
    }

    pub fn has_pending_response(&self) -> bool {
        self.inner.lock().mailbox.has_pending()
    }

    pub fn snapshot(&self) -> MachineStatus {
        self.inner.lock().machine.status().clone()
    }

    pub fn last_raw_status(&self) -> Option<Value> {
        self.inner.lock().last_raw.clone()
    }

    pub fn set_announced(&self, value: bool) {
        *self.announced.lock() = value;
    }

    pub fn is_announced(&self) -> bool {
        *self.announced.lock()
    }

    pub fn record_lifecycle(&self, notice: LifecycleNotice) {
        *self.inner.lock().lifecycle.slot(notice) = true;
    }

    pub fn lifecycle(&self) -> LifecycleFlags {
        self.inner.lock().lifecycle
    }

    /// Clear one lifecycle flag; returns whether it was raised
    pub fn acknowledge(&self, notice: LifecycleNotice) -> bool {
        std::mem::take(self.inner.lock().lifecycle.slot(notice))
    }

    pub fn set_connection(&self, status: ConnectionStatus) {
        self.inner.lock().connection = status;
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.inner.lock().connection
    }

    /// State after `stop`: status back to defaults, mailbox kept
    pub fn reset_after_stop(&self) {
        let mut inner = self.inner.lock();
        inner.machine.reset();
        inner.connection = ConnectionStatus::Idle;
        inner.last_raw = None;
    }

    /// State after a remote restart: status, mailbox and announcement cleared
    pub fn full_reset(&self) {
        let mut inner = self.inner.lock();
        inner.machine.reset();
        inner.mailbox.clear();
        inner.machine.set_last_response(None);
        inner.connection = ConnectionStatus::Idle;
        inner.last_raw = None;
        *self.announced.lock() = false;
    }
}
