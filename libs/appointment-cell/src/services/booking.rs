// libs/appointment-cell/src/services/booking.rs
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::services::DoctorService;
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, User};

use crate::models::{
    Actor, AppointmentError, AppointmentSlot, BookSlotRequest, SlotPage, SlotStatistics, SlotStatus,
    SlotStatusRow, SLOT_PAGE_SIZE,
};
use crate::services::lifecycle::AppointmentLifecycleService;

/// One page of `slots`; pages are 1-based and anything before the first page is empty.
pub fn paginate(slots: Vec<AppointmentSlot>, page: i64) -> SlotPage {
    let total = slots.len();
    let page_slots = if page < 1 {
        Vec::new()
    } else {
        let from = (page as usize - 1).saturating_mul(SLOT_PAGE_SIZE);
        slots.into_iter().skip(from).take(SLOT_PAGE_SIZE).collect()
    };

    SlotPage {
        page,
        page_size: SLOT_PAGE_SIZE,
        total,
        slots: page_slots,
    }
}

fn status_filter(statuses: &[SlotStatus]) -> String {
    let names: Vec<&str> = statuses.iter().map(SlotStatus::as_str).collect();
    format!("in.({})", names.join(","))
}

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    patients: PatientService,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            patients: PatientService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    async fn fetch_slots(&self, path: &str, auth_token: &str) -> Result<Vec<AppointmentSlot>, AppointmentError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(AppointmentError::from))
            .collect()
    }

    pub async fn get_slot(&self, slot_id: Uuid, auth_token: &str) -> Result<AppointmentSlot, AppointmentError> {
        debug!("Fetching appointment slot: {}", slot_id);

        let path = format!("/rest/v1/appointment_slots?id=eq.{}", slot_id);
        self.fetch_slots(&path, auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or(AppointmentError::NotFound)
    }

    /// Map the authenticated user onto the doctor or patient record they act as.
    pub async fn resolve_actor(&self, user: &User, auth_token: &str) -> Result<Actor, AppointmentError> {
        match user.role() {
            Some(Role::Admin) => Ok(Actor::Admin),
            Some(Role::Doctor) => {
                let doctor = self.doctors
                    .find_by_user_id(&user.id, auth_token)
                    .await?
                    .ok_or_else(|| AppointmentError::Forbidden("No doctor profile for this account".to_string()))?;
                Ok(Actor::Doctor(doctor.id))
            }
            Some(Role::Patient) => {
                let patient = self.patients
                    .find_by_user_id(&user.id, auth_token)
                    .await?
                    .ok_or_else(|| AppointmentError::Forbidden("No patient profile for this account".to_string()))?;
                Ok(Actor::Patient(patient.id))
            }
            None => Err(AppointmentError::Forbidden("Account has no recognised role".to_string())),
        }
    }

    /// Slot visible to `actor`: admins see all, doctors their own, patients the ones bound to them.
    pub async fn get_slot_for(&self, slot_id: Uuid, actor: Actor, auth_token: &str) -> Result<AppointmentSlot, AppointmentError> {
        let slot = self.get_slot(slot_id, auth_token).await?;
        let visible = match actor {
            Actor::Admin => true,
            Actor::Doctor(doctor_id) => slot.doctor_id == doctor_id,
            Actor::Patient(patient_id) => slot.patient_id == Some(patient_id),
        };
        if !visible {
            return Err(AppointmentError::Forbidden("Not a party to this appointment".to_string()));
        }
        Ok(slot)
    }

    /// Does the patient already hold an active booking at this date and time?
    async fn patient_has_conflict(
        &self,
        patient_id: Uuid,
        slot: &AppointmentSlot,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointment_slots?select=id&patient_id=eq.{}&date=eq.{}&start_time=eq.{}&status={}",
            patient_id,
            slot.date,
            slot.start_time.format("%H:%M:%S"),
            status_filter(&SlotStatus::ACTIVE_BOOKING)
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;
        Ok(!result.is_empty())
    }

    /// Conditional update: applies only while the row still holds `expected`.
    async fn compare_and_set(
        &self,
        slot_id: Uuid,
        expected: SlotStatus,
        mut update: Map<String, Value>,
        auth_token: &str,
    ) -> Result<AppointmentSlot, AppointmentError> {
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!(
            "/rest/v1/appointment_slots?id=eq.{}&status=eq.{}",
            slot_id, expected
        );
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        match result.into_iter().next() {
            Some(row) => Ok(serde_json::from_value(row)?),
            None => {
                warn!("Slot {} changed concurrently; expected status {}", slot_id, expected);
                Err(AppointmentError::Conflict(
                    "Appointment slot was modified by another request".to_string(),
                ))
            }
        }
    }

    /// AVAILABLE -> BOOKED for the calling patient.
    pub async fn book_slot(
        &self,
        user: &User,
        request: BookSlotRequest,
        auth_token: &str,
    ) -> Result<AppointmentSlot, AppointmentError> {
        let actor = self.resolve_actor(user, auth_token).await?;
        let slot = self.get_slot(request.slot_id, auth_token).await?;

        if slot.status != SlotStatus::Available {
            return Err(AppointmentError::SlotNotAvailable(slot.status));
        }

        self.book(slot, actor, request.reason, request.notes, auth_token).await
    }

    async fn book(
        &self,
        slot: AppointmentSlot,
        actor: Actor,
        reason: Option<String>,
        notes: Option<String>,
        auth_token: &str,
    ) -> Result<AppointmentSlot, AppointmentError> {
        self.lifecycle.validate_status_transition(slot.status, SlotStatus::Booked)?;
        self.lifecycle.authorize_transition(&slot, SlotStatus::Booked, actor)?;

        let Actor::Patient(patient_id) = actor else {
            return Err(AppointmentError::Forbidden("Only patients can book appointments".to_string()));
        };

        if self.patient_has_conflict(patient_id, &slot, auth_token).await? {
            return Err(AppointmentError::Conflict(format!(
                "Patient already has an appointment on {} at {}",
                slot.date, slot.start_time
            )));
        }

        let mut update = Map::new();
        update.insert("status".to_string(), json!(SlotStatus::Booked));
        update.insert("patient_id".to_string(), json!(patient_id));
        if let Some(reason) = reason {
            update.insert("reason".to_string(), json!(reason));
        }
        if let Some(notes) = notes {
            update.insert("notes".to_string(), json!(notes));
        }

        let booked = self.compare_and_set(slot.id, SlotStatus::Available, update, auth_token).await?;
        info!("Slot {} booked by patient {}", booked.id, patient_id);
        Ok(booked)
    }

    /// Move a slot to `new_status` on behalf of `user`.
    pub async fn transition_slot(
        &self,
        user: &User,
        slot_id: Uuid,
        new_status: SlotStatus,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<AppointmentSlot, AppointmentError> {
        let actor = self.resolve_actor(user, auth_token).await?;
        let slot = self.get_slot(slot_id, auth_token).await?;

        if new_status == SlotStatus::Booked {
            return self.book(slot, actor, reason, None, auth_token).await;
        }

        self.lifecycle.authorize_transition(&slot, new_status, actor)?;
        self.lifecycle.validate_status_transition(slot.status, new_status)?;

        let mut update = Map::new();
        if new_status == SlotStatus::Cancelled {
            let reason = self.lifecycle.require_cancellation_reason(reason.as_deref())?;
            update.insert("cancellation_reason".to_string(), json!(reason));
        }
        update.insert("status".to_string(), json!(new_status));

        let from = slot.status;
        let updated = self.compare_and_set(slot.id, from, update, auth_token).await?;
        info!("Slot {} moved from {} to {}", updated.id, from, updated.status);
        Ok(updated)
    }

    pub async fn cancel_slot(
        &self,
        user: &User,
        slot_id: Uuid,
        reason: &str,
        auth_token: &str,
    ) -> Result<AppointmentSlot, AppointmentError> {
        self.transition_slot(user, slot_id, SlotStatus::Cancelled, Some(reason.to_string()), auth_token).await
    }

    /// AVAILABLE slots of an approved doctor within `[from, to]`.
    pub async fn list_available_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<AppointmentSlot>, AppointmentError> {
        if to < from {
            return Err(AppointmentError::ValidationError(format!(
                "Range end {} is before start {}",
                to, from
            )));
        }
        self.doctors.get_approved_doctor(doctor_id, auth_token).await?;

        let path = format!(
            "/rest/v1/appointment_slots?doctor_id=eq.{}&status=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,start_time.asc",
            doctor_id,
            SlotStatus::Available,
            from,
            to
        );
        self.fetch_slots(&path, auth_token).await
    }

    /// Upcoming AVAILABLE slots of an approved doctor, two per page.
    pub async fn list_slots_page(
        &self,
        doctor_id: Uuid,
        page: i64,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<SlotPage, AppointmentError> {
        self.doctors.get_approved_doctor(doctor_id, auth_token).await?;
        if page < 1 {
            return Ok(paginate(Vec::new(), page));
        }

        let path = format!(
            "/rest/v1/appointment_slots?doctor_id=eq.{}&status=eq.{}&date=gte.{}&order=date.asc,start_time.asc",
            doctor_id,
            SlotStatus::Available,
            today
        );
        let slots = self.fetch_slots(&path, auth_token).await?;
        Ok(paginate(slots, page))
    }

    /// Caseload of the calling doctor.
    pub async fn list_for_doctor(
        &self,
        user: &User,
        status: Option<SlotStatus>,
        auth_token: &str,
    ) -> Result<Vec<AppointmentSlot>, AppointmentError> {
        let Actor::Doctor(doctor_id) = self.resolve_actor(user, auth_token).await? else {
            return Err(AppointmentError::Forbidden("Only doctors have a caseload".to_string()));
        };

        let status_clause = match status {
            Some(status) => format!("status=eq.{}", status),
            None => format!("status=neq.{}", SlotStatus::Available),
        };
        let path = format!(
            "/rest/v1/appointment_slots?doctor_id=eq.{}&{}&order=date.asc,start_time.asc",
            doctor_id, status_clause
        );
        self.fetch_slots(&path, auth_token).await
    }

    /// Appointments of one patient; visible to that patient and to admins.
    pub async fn list_for_patient(
        &self,
        user: &User,
        patient_id: Uuid,
        status: Option<SlotStatus>,
        auth_token: &str,
    ) -> Result<Vec<AppointmentSlot>, AppointmentError> {
        let patient = self.patients.get_patient(patient_id, auth_token).await?;

        match self.resolve_actor(user, auth_token).await? {
            Actor::Admin => {}
            Actor::Patient(id) if id == patient.id => {}
            _ => {
                return Err(AppointmentError::Forbidden(
                    "Not allowed to view this patient's appointments".to_string(),
                ))
            }
        }

        let mut path = format!("/rest/v1/appointment_slots?patient_id=eq.{}", patient.id);
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        path.push_str("&order=date.asc,start_time.asc");
        self.fetch_slots(&path, auth_token).await
    }

    /// Every slot in the clinic, optionally narrowed to one status.
    pub async fn list_all(
        &self,
        status: Option<SlotStatus>,
        auth_token: &str,
    ) -> Result<Vec<AppointmentSlot>, AppointmentError> {
        let mut path = "/rest/v1/appointment_slots?order=date.asc,start_time.asc".to_string();
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        self.fetch_slots(&path, auth_token).await
    }

    /// All slots of any doctor, whatever the doctor's approval status.
    pub async fn list_for_doctor_id(
        &self,
        doctor_id: Uuid,
        status: Option<SlotStatus>,
        auth_token: &str,
    ) -> Result<Vec<AppointmentSlot>, AppointmentError> {
        let doctor = self.doctors.get_doctor(doctor_id, auth_token).await?;

        let mut path = format!("/rest/v1/appointment_slots?doctor_id=eq.{}", doctor.id);
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        path.push_str("&order=date.asc,start_time.asc");
        self.fetch_slots(&path, auth_token).await
    }

    pub async fn statistics(&self, auth_token: &str) -> Result<SlotStatistics, AppointmentError> {
        let rows: Vec<SlotStatusRow> = self.supabase.request(
            Method::GET,
            "/rest/v1/appointment_slots?select=status",
            Some(auth_token),
            None,
        ).await?;

        let stats = SlotStatistics::tally(rows.into_iter().map(|row| row.status));
        debug!("Slot statistics: {:?}", stats);
        Ok(stats)
    }
}
