// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{Duration, NaiveDateTime};
use tracing::{debug, warn};

use crate::events::AppointmentEventKind;
use crate::models::{AppointmentError, AppointmentStatus};

/// Who is driving a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTrigger {
    /// Payment collaborator reported success.
    Payment,
    /// Explicit cancellation by a guardian, staff, or the payment collaborator.
    Cancellation,
    /// Clinical-record collaborator filed the consultation.
    ClinicalRecord,
    /// No-show sweeper. The only trigger allowed to reach `NoShow`.
    Sweeper,
}

/// State machine: `PendingPayment -> Confirmed -> Completed`, any non-terminal
/// state `-> Cancelled`, and `Confirmed -> NoShow` from the sweeper only.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate a transition and return the event it emits.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
        trigger: TransitionTrigger,
    ) -> Result<AppointmentEventKind, AppointmentError> {
        debug!("Validating status transition from {} to {} ({:?})", current_status, new_status, trigger);

        if !self.get_valid_transitions(current_status, trigger).contains(&new_status) {
            warn!(
                "Invalid status transition attempted: {} -> {} ({:?})",
                current_status, new_status, trigger
            );
            return Err(AppointmentError::InvalidStateTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(match new_status {
            AppointmentStatus::Confirmed => AppointmentEventKind::Confirmed,
            AppointmentStatus::Cancelled => AppointmentEventKind::Cancelled,
            AppointmentStatus::Completed => AppointmentEventKind::Completed,
            AppointmentStatus::NoShow => AppointmentEventKind::NoShow,
            AppointmentStatus::PendingPayment => AppointmentEventKind::Created,
        })
    }

    /// All statuses reachable from `current_status` by `trigger`.
    pub fn get_valid_transitions(
        &self,
        current_status: AppointmentStatus,
        trigger: TransitionTrigger,
    ) -> Vec<AppointmentStatus> {
        use AppointmentStatus::*;

        match (current_status, trigger) {
            (PendingPayment, TransitionTrigger::Payment) => vec![Confirmed],
            (PendingPayment, TransitionTrigger::Cancellation) => vec![Cancelled],
            (Confirmed, TransitionTrigger::Cancellation) => vec![Cancelled],
            (Confirmed, TransitionTrigger::ClinicalRecord) => vec![Completed],
            (Confirmed, TransitionTrigger::Sweeper) => vec![NoShow],
            // Terminal states and mismatched triggers
            _ => vec![],
        }
    }

    /// Confirmed and its end time plus grace is strictly in the past.
    pub fn should_mark_no_show(
        &self,
        current_status: AppointmentStatus,
        scheduled_end_time: NaiveDateTime,
        current_time: NaiveDateTime,
        grace: Duration,
    ) -> bool {
        current_status == AppointmentStatus::Confirmed && scheduled_end_time + grace < current_time
    }
}
