// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{Actor, AppointmentError, AppointmentSlot, SlotStatus};

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// All valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: SlotStatus) -> &'static [SlotStatus] {
        match current_status {
            SlotStatus::Available => &[SlotStatus::Booked, SlotStatus::Cancelled],
            SlotStatus::Booked => &[SlotStatus::Confirmed, SlotStatus::Cancelled],
            SlotStatus::Confirmed => &[SlotStatus::InProgress, SlotStatus::Cancelled],
            SlotStatus::InProgress => &[SlotStatus::Completed, SlotStatus::Cancelled],
            // Terminal states
            SlotStatus::Completed | SlotStatus::Cancelled | SlotStatus::NoShow => &[],
        }
    }

    pub fn validate_status_transition(
        &self,
        current_status: SlotStatus,
        new_status: SlotStatus,
    ) -> Result<(), AppointmentError> {
        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::IllegalTransition {
                from: current_status,
                to: new_status,
            });
        }

        debug!("Status transition validated: {} -> {}", current_status, new_status);
        Ok(())
    }

    /// Check that `actor` may move `slot` into `new_status`.
    pub fn authorize_transition(
        &self,
        slot: &AppointmentSlot,
        new_status: SlotStatus,
        actor: Actor,
    ) -> Result<(), AppointmentError> {
        let owns_slot = |actor: Actor| match actor {
            Actor::Admin => true,
            Actor::Doctor(doctor_id) => doctor_id == slot.doctor_id,
            Actor::Patient(_) => false,
        };

        let allowed = match new_status {
            SlotStatus::Cancelled => match actor {
                Actor::Patient(patient_id) => slot.patient_id == Some(patient_id),
                other => owns_slot(other),
            },
            SlotStatus::Booked => {
                if let Actor::Patient(patient_id) = actor {
                    if slot.patient_id.is_some_and(|bound| bound != patient_id) {
                        return Err(AppointmentError::Conflict(
                            "Slot is already bound to another patient".to_string(),
                        ));
                    }
                    true
                } else {
                    false
                }
            }
            SlotStatus::Confirmed | SlotStatus::InProgress | SlotStatus::Completed => owns_slot(actor),
            SlotStatus::Available | SlotStatus::NoShow => false,
        };

        if !allowed {
            warn!("{:?} may not move slot {} to {}", actor, slot.id, new_status);
            return Err(AppointmentError::Forbidden(format!(
                "Not allowed to set this appointment to {}",
                new_status
            )));
        }
        Ok(())
    }

    /// Cancellation reasons must carry text.
    pub fn require_cancellation_reason(&self, reason: Option<&str>) -> Result<String, AppointmentError> {
        match reason.map(str::trim) {
            Some(reason) if !reason.is_empty() => Ok(reason.to_string()),
            _ => Err(AppointmentError::ValidationError(
                "A cancellation reason is required".to_string(),
            )),
        }
    }
}
