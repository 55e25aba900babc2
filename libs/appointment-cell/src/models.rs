use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use patient_cell::models::PatientError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT SLOT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl SlotStatus {
    pub const ALL: [SlotStatus; 7] = [
        SlotStatus::Available,
        SlotStatus::Booked,
        SlotStatus::Confirmed,
        SlotStatus::InProgress,
        SlotStatus::Completed,
        SlotStatus::Cancelled,
        SlotStatus::NoShow,
    ];

    /// Statuses that hold a patient's time.
    pub const ACTIVE_BOOKING: [SlotStatus; 3] = [
        SlotStatus::Booked,
        SlotStatus::Confirmed,
        SlotStatus::InProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
            SlotStatus::Confirmed => "confirmed",
            SlotStatus::InProgress => "in_progress",
            SlotStatus::Completed => "completed",
            SlotStatus::Cancelled => "cancelled",
            SlotStatus::NoShow => "no_show",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotStatus::Completed | SlotStatus::Cancelled | SlotStatus::NoShow)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Row inserted by the slot generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSlot {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
}

/// `(date, start_time)` of an existing slot, used for the generator's existence check.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

// ==============================================================================
// ACTORS
// ==============================================================================

/// The party requesting a slot change, resolved from the authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin,
    Doctor(Uuid),
    Patient(Uuid),
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    pub slot_id: Uuid,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSlotStatusRequest {
    pub status: SlotStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelSlotRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotStatusQuery {
    pub status: Option<SlotStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: i64,
}

fn first_page() -> i64 {
    1
}

pub const SLOT_PAGE_SIZE: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct SlotPage {
    pub page: i64,
    pub page_size: usize,
    pub total: usize,
    pub slots: Vec<AppointmentSlot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateSlotsRequest {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub weeks: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub doctor_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub created: usize,
    pub skipped_entries: usize,
}

/// Clinic-wide slot counts for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlotStatistics {
    pub total: usize,
    pub available: usize,
    /// Booked and confirmed slots.
    pub scheduled: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl SlotStatistics {
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = SlotStatus>,
    {
        statuses.into_iter().fold(Self::default(), |mut stats, status| {
            stats.total += 1;
            match status {
                SlotStatus::Available => stats.available += 1,
                SlotStatus::Booked | SlotStatus::Confirmed => stats.scheduled += 1,
                SlotStatus::Completed => stats.completed += 1,
                SlotStatus::Cancelled => stats.cancelled += 1,
                SlotStatus::InProgress | SlotStatus::NoShow => {}
            }
            stats
        })
    }
}

/// Status column alone, as read for statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotStatusRow {
    pub status: SlotStatus,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment slot not found")]
    NotFound,

    #[error("Appointment slot not available (status: {0})")]
    SlotNotAvailable(SlotStatus),

    #[error("Illegal status transition from {from} to {to}")]
    IllegalTransition { from: SlotStatus, to: SlotStatus },

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for AppointmentError {
    fn from(e: anyhow::Error) -> Self {
        AppointmentError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for AppointmentError {
    fn from(e: serde_json::Error) -> Self {
        AppointmentError::DatabaseError(format!("Failed to decode slot data: {}", e))
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound | DoctorError::ProfileNotFound => AppointmentError::DoctorNotFound,
            DoctorError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            DoctorError::Forbidden(msg) => AppointmentError::Forbidden(msg),
            DoctorError::Conflict(msg) => AppointmentError::Conflict(msg),
            DoctorError::Storage(msg) | DoctorError::Database(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

impl From<PatientError> for AppointmentError {
    fn from(e: PatientError) -> Self {
        match e {
            PatientError::NotFound => AppointmentError::PatientNotFound,
            PatientError::AlreadyExists => AppointmentError::Conflict(e.to_string()),
            PatientError::Unauthorized => AppointmentError::Forbidden(e.to_string()),
            PatientError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            PatientError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::PatientNotFound => AppError::NotFound(e.to_string()),
            AppointmentError::SlotNotAvailable(_)
            | AppointmentError::IllegalTransition { .. }
            | AppointmentError::Conflict(_) => AppError::Conflict(e.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
