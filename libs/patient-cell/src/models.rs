use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: String,
    pub full_name: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub full_name: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub full_name: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl UpdatePatientRequest {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.medical_history.is_none()
            && self.allergies.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.address.is_none()
    }
}

pub(crate) fn validate_email(email: Option<&str>) -> Result<(), PatientError> {
    match email {
        Some(email) if !email.contains('@') || email.trim() != email => Err(
            PatientError::ValidationError(format!("Invalid email address: {}", email)),
        ),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Patient profile already exists for this account")]
    AlreadyExists,

    #[error("Unauthorized access to patient data")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for PatientError {
    fn from(e: anyhow::Error) -> Self {
        PatientError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for PatientError {
    fn from(e: serde_json::Error) -> Self {
        PatientError::DatabaseError(format!("Failed to decode patient data: {}", e))
    }
}

impl From<PatientError> for AppError {
    fn from(e: PatientError) -> Self {
        match e {
            PatientError::NotFound => AppError::NotFound(e.to_string()),
            PatientError::AlreadyExists => AppError::Conflict(e.to_string()),
            PatientError::Unauthorized => AppError::Forbidden(e.to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
