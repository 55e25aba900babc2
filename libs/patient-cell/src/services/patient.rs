use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{validate_email, CreatePatientRequest, Patient, PatientError, UpdatePatientRequest};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch_one(&self, path: &str, auth_token: &str) -> Result<Option<Patient>, PatientError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await?;

        match result.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        debug!("Fetching patient: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        self.fetch_one(&path, auth_token).await?.ok_or(PatientError::NotFound)
    }

    pub async fn find_by_user_id(&self, user_id: &str, auth_token: &str) -> Result<Option<Patient>, PatientError> {
        let path = format!("/rest/v1/patients?user_id=eq.{}", user_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn get_own_profile(&self, user_id: &str, auth_token: &str) -> Result<Patient, PatientError> {
        self.find_by_user_id(user_id, auth_token)
            .await?
            .ok_or(PatientError::NotFound)
    }

    /// Create the patient profile bound to `user_id`; one profile per account.
    pub async fn create_profile(
        &self,
        user_id: &str,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        validate_email(request.email.as_deref())?;

        if self.find_by_user_id(user_id, auth_token).await?.is_some() {
            return Err(PatientError::AlreadyExists);
        }

        let now = Utc::now().to_rfc3339();
        let patient_data = json!({
            "user_id": user_id,
            "full_name": request.full_name,
            "medical_history": request.medical_history,
            "allergies": request.allergies,
            "phone": request.phone,
            "email": request.email,
            "address": request.address,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/patients",
            Some(auth_token),
            Some(patient_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Failed to create patient profile".to_string()))?;
        let patient: Patient = serde_json::from_value(row)?;
        info!("Patient profile {} created for user {}", patient.id, user_id);
        Ok(patient)
    }

    pub async fn update_own_profile(
        &self,
        user_id: &str,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        validate_email(request.email.as_deref())?;
        let patient = self.get_own_profile(user_id, auth_token).await?;

        if request.is_empty() {
            return Ok(patient);
        }

        let mut update = Map::new();
        let fields = [
            ("full_name", request.full_name),
            ("medical_history", request.medical_history),
            ("allergies", request.allergies),
            ("phone", request.phone),
            ("email", request.email),
            ("address", request.address),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                update.insert(name.to_string(), json!(value));
            }
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}", patient.id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;
        let updated: Patient = serde_json::from_value(row)?;
        info!("Patient profile {} updated", updated.id);
        Ok(updated)
    }
}
