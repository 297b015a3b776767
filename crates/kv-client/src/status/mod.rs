//! Printer status tracking
//!
//! [`StatusMachine`] owns the canonical [`MachineStatus`] record. Partial
//! status maps from the remote host are folded in field by field; a field
//! is only written when its value actually differs, so [`StatusChange`]
//! never reports a change that did not happen.
//!
//! # Print-state transitions
//!
//! | entering   | effect                                                          |
//! |------------|-----------------------------------------------------------------|
//! | `Printing` | new run unless resuming from `Paused`; completion back to `Pending` |
//! | `Complete` | completion `Complete` unless already settled                    |
//! | `Standby`  | completion `Cancelled` if a run was started and never completed |
//!
//! Cancellation is inferred: the firmware never reports it on its own, so a
//! run that drops back to `Standby` (including after a transient disconnect)
//! is classified as cancelled. Treat it as best-effort.

mod estimate;

pub use estimate::RemainingEstimator;

use serde::Serialize;
use std::time::Duration;

use kv_core::config::serde_utils::duration_secs;
use kv_core::{CompletionState, PrintState};
use kv_protocol::StatusMap;

/// Snapshot of everything known about the printer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MachineStatus {
    pub print_state: PrintState,
    /// Derived from print-state transitions
    pub completion_state: CompletionState,
    /// Whole percent, 0-100
    pub progress_percent: u8,
    #[serde(serialize_with = "duration_secs::serialize")]
    pub elapsed_time: Duration,
    /// Derived from progress and elapsed time
    #[serde(serialize_with = "duration_secs::serialize")]
    pub remaining_time: Duration,
    /// Millimetres
    pub filament_used: f64,
    pub filename: Option<String>,
    pub bed_temp: f64,
    pub bed_target: f64,
    pub extruder_temp: f64,
    pub extruder_target: f64,
    /// Percent with one decimal
    pub fan_percent: f64,
    /// Current head of the response mailbox
    pub last_response: Option<String>,
}

/// A print-state change and its side effects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PrintState,
    pub to: PrintState,
    /// The shared "announced" flag has to be cleared
    pub reset_announcement: bool,
}

/// Result of folding one partial update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusChange {
    /// At least one field changed
    pub changed: bool,
    pub transition: Option<Transition>,
}

/// Owner of [`MachineStatus`] and the print-state machine
#[derive(Debug, Default)]
pub struct StatusMachine {
    status: MachineStatus,
    /// A run entered `Printing` and has not completed or been cancelled
    print_started: bool,
    estimator: RemainingEstimator,
}

impl StatusMachine {
    /// Create a machine with default status
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status
    pub fn status(&self) -> &MachineStatus {
        &self.status
    }

    /// Mirror the mailbox head into the status record
    pub fn set_last_response(&mut self, text: Option<String>) {
        self.status.last_response = text;
    }

    /// Fold a partial status update into the record
    pub fn apply_partial(&mut self, update: &StatusMap) -> StatusChange {
        let mut change = StatusChange::default();

        if let Some(stats) = &update.print_stats {
            if let Some(state) = stats.state.as_deref() {
                let state = PrintState::from_remote(state);
                if state != self.status.print_state {
                    change.transition = self.advance_state(state);
                    change.changed = true;
                }
            }
        }

        let s = &mut self.status;
        let mut timing_touched = false;

        if let Some(stats) = &update.print_stats {
            if let Some(filename) = &stats.filename {
                let filename = Some(filename.clone()).filter(|f| !f.is_empty());
                change.changed |= set_if_changed(&mut s.filename, filename);
            }
            if let Some(elapsed) = stats.print_duration.and_then(seconds) {
                change.changed |= set_if_changed(&mut s.elapsed_time, elapsed);
                timing_touched = true;
            }
            if let Some(used) = stats.filament_used.filter(|v| v.is_finite()) {
                change.changed |= set_if_changed(&mut s.filament_used, used.max(0.0));
            }
        }

        if let Some(percent) = update.progress().and_then(to_percent) {
            change.changed |= set_if_changed(&mut s.progress_percent, percent);
            timing_touched = true;
        }

        if let Some(bed) = &update.heater_bed {
            if let Some(t) = bed.temperature.filter(|v| v.is_finite()) {
                change.changed |= set_if_changed(&mut s.bed_temp, t);
            }
            if let Some(t) = bed.target.filter(|v| v.is_finite()) {
                change.changed |= set_if_changed(&mut s.bed_target, t);
            }
        }

        if let Some(extruder) = &update.extruder {
            if let Some(t) = extruder.temperature.filter(|v| v.is_finite()) {
                change.changed |= set_if_changed(&mut s.extruder_temp, t);
            }
            if let Some(t) = extruder.target.filter(|v| v.is_finite()) {
                change.changed |= set_if_changed(&mut s.extruder_target, t);
            }
        }

        if let Some(speed) = update.fan.as_ref().and_then(|f| f.speed) {
            if speed.is_finite() {
                let percent = (speed.clamp(0.0, 1.0) * 1000.0).round() / 10.0;
                change.changed |= set_if_changed(&mut s.fan_percent, percent);
            }
        }

        if timing_touched {
            let remaining = self.estimator.remaining(s.progress_percent, s.elapsed_time);
            change.changed |= set_if_changed(&mut s.remaining_time, remaining);
        }

        change
    }

    /// Move the print-state machine to `next`.
    ///
    /// Returns `None` when `next` equals the current state.
    pub fn advance_state(&mut self, next: PrintState) -> Option<Transition> {
        let from = self.status.print_state;
        if from == next {
            return None;
        }
        self.status.print_state = next;

        let mut reset_announcement = false;
        match next {
            PrintState::Printing => {
                if from != PrintState::Paused {
                    reset_announcement = true;
                }
                self.print_started = true;
                self.status.completion_state = CompletionState::Pending;
            }
            PrintState::Complete => {
                reset_announcement = true;
                if self.status.completion_state == CompletionState::Pending {
                    self.status.completion_state = CompletionState::Complete;
                    self.print_started = false;
                }
            }
            PrintState::Standby => {
                reset_announcement = true;
                if self.print_started {
                    self.status.completion_state = CompletionState::Cancelled;
                    self.print_started = false;
                }
            }
            PrintState::Paused | PrintState::Error | PrintState::Unknown => {}
        }

        tracing::debug!(
            "Print state {} -> {} (completion: {})",
            from,
            next,
            self.status.completion_state
        );

        Some(Transition {
            from,
            to: next,
            reset_announcement,
        })
    }

    /// Back to defaults, keeping the mirrored mailbox head
    pub fn reset(&mut self) {
        let last_response = self.status.last_response.take();
        *self = Self::default();
        self.status.last_response = last_response;
    }
}

fn set_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}

/// Progress fraction to whole percent, truncating
fn to_percent(fraction: f64) -> Option<u8> {
    if !fraction.is_finite() {
        return None;
    }
    Some((fraction.clamp(0.0, 1.0) * 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(value: serde_json::Value) -> StatusMap {
        StatusMap::from_value(&value).unwrap()
    }

    fn state(machine: &mut StatusMachine, s: &str) -> StatusChange {
        machine.apply_partial(&update(json!({"print_stats": {"state": s}})))
    }

    #[test]
    fn test_end_to_end_print_run() {
        let mut machine = StatusMachine::new();
        state(&mut machine, "printing");
        machine.apply_partial(&update(json!({
            "print_stats": {"progress": 0.5, "print_duration": 100.0}
        })));

        let s = machine.status();
        assert_eq!(s.print_state, PrintState::Printing);
        assert_eq!(s.progress_percent, 50);
        assert_eq!(s.remaining_time, Duration::from_secs(100));

        state(&mut machine, "complete");
        assert_eq!(machine.status().completion_state, CompletionState::Complete);
    }

    #[test]
    fn test_identical_update_reports_no_change() {
        let mut machine = StatusMachine::new();
        let payload = update(json!({
            "print_stats": {"state": "printing", "filename": "cube.gcode"},
            "heater_bed": {"temperature": 60.0, "target": 60.0},
            "fan": {"speed": 0.5}
        }));
        assert!(machine.apply_partial(&payload).changed);

        let again = machine.apply_partial(&payload);
        assert!(!again.changed);
        assert!(again.transition.is_none());
    }

    #[test]
    fn test_single_field_change() {
        let mut machine = StatusMachine::new();
        machine.apply_partial(&update(json!({"extruder": {"temperature": 200.0, "target": 210.0}})));
        let before = machine.status().clone();

        let change = machine.apply_partial(&update(json!({"extruder": {"temperature": 205.0}})));
        assert!(change.changed);

        let after = machine.status();
        assert_eq!(after.extruder_temp, 205.0);
        assert_eq!(after.extruder_target, before.extruder_target);
        assert_eq!(after.bed_temp, before.bed_temp);
    }

    #[test]
    fn test_empty_and_unknown_updates_change_nothing() {
        let mut machine = StatusMachine::new();
        assert!(!machine.apply_partial(&update(json!({}))).changed);
        assert!(!machine.apply_partial(&update(json!({"toolhead": {"x": 1}}))).changed);
        assert_eq!(machine.status(), &MachineStatus::default());
    }

    #[test]
    fn test_remaining_time_cached_per_percent() {
        let mut machine = StatusMachine::new();
        machine.apply_partial(&update(json!({
            "print_stats": {"progress": 0.25, "print_duration": 60.0}
        })));
        assert_eq!(machine.status().remaining_time, Duration::from_secs(180));

        machine.apply_partial(&update(json!({"print_stats": {"print_duration": 75.0}})));
        assert_eq!(machine.status().elapsed_time, Duration::from_secs(75));
        assert_eq!(machine.status().remaining_time, Duration::from_secs(180));

        machine.apply_partial(&update(json!({"display_status": {"progress": 0.5}})));
        assert_eq!(machine.status().remaining_time, Duration::from_secs(75));
    }

    #[test]
    fn test_percent_and_fan_conversion() {
        let mut machine = StatusMachine::new();
        machine.apply_partial(&update(json!({
            "print_stats": {"progress": 0.999},
            "fan": {"speed": 0.3333}
        })));
        assert_eq!(machine.status().progress_percent, 99);
        assert_eq!(machine.status().fan_percent, 33.3);
    }

    #[test]
    fn test_cancel_inferred_from_standby() {
        let mut machine = StatusMachine::new();
        state(&mut machine, "printing");
        let change = state(&mut machine, "standby");
        assert_eq!(machine.status().completion_state, CompletionState::Cancelled);
        assert!(change.transition.unwrap().reset_announcement);
    }

    #[test]
    fn test_standby_without_run_is_not_cancel() {
        let mut machine = StatusMachine::new();
        state(&mut machine, "standby");
        assert_eq!(machine.status().completion_state, CompletionState::Pending);

        state(&mut machine, "printing");
        state(&mut machine, "complete");
        state(&mut machine, "standby");
        assert_eq!(machine.status().completion_state, CompletionState::Complete);
    }

    #[test]
    fn test_pause_resume_keeps_announcement() {
        let mut machine = StatusMachine::new();
        let start = state(&mut machine, "printing").transition.unwrap();
        assert!(start.reset_announcement);

        let pause = state(&mut machine, "paused").transition.unwrap();
        assert!(!pause.reset_announcement);

        let resume = state(&mut machine, "printing").transition.unwrap();
        assert_eq!(resume.from, PrintState::Paused);
        assert!(!resume.reset_announcement);
    }

    #[test]
    fn test_error_then_printing_resets_announcement() {
        let mut machine = StatusMachine::new();
        state(&mut machine, "printing");
        state(&mut machine, "error");
        let restart = state(&mut machine, "printing").transition.unwrap();
        assert!(restart.reset_announcement);
        assert_eq!(machine.status().completion_state, CompletionState::Pending);
    }

    #[test]
    fn test_new_run_after_completion_is_pending() {
        let mut machine = StatusMachine::new();
        state(&mut machine, "printing");
        state(&mut machine, "complete");
        state(&mut machine, "printing");
        assert_eq!(machine.status().completion_state, CompletionState::Pending);
    }

    #[test]
    fn test_advance_same_state_is_noop() {
        let mut machine = StatusMachine::new();
        assert!(machine.advance_state(PrintState::Unknown).is_none());
        assert!(machine.advance_state(PrintState::Printing).is_some());
        assert!(machine.advance_state(PrintState::Printing).is_none());
    }

    #[test]
    fn test_reset_keeps_mirrored_response() {
        let mut machine = StatusMachine::new();
        state(&mut machine, "printing");
        machine.set_last_response(Some("// Filament runout".to_string()));

        machine.reset();
        assert_eq!(machine.status().print_state, PrintState::Unknown);
        assert_eq!(
            machine.status().last_response.as_deref(),
            Some("// Filament runout")
        );

        // A run started before the reset must not be cancelled by the next standby
        state(&mut machine, "standby");
        assert_eq!(machine.status().completion_state, CompletionState::Pending);
    }

    #[test]
    fn test_non_finite_values_ignored() {
        let mut machine = StatusMachine::new();
        machine.apply_partial(&update(json!({"heater_bed": {"temperature": 55.0}})));
        assert!(!machine.apply_partial(&update(json!({"heater_bed": {"temperature": null}}))).changed);
        assert_eq!(machine.status().bed_temp, 55.0);
    }
}
