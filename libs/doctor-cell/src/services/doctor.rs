use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::storage::{LocalFileStorage, StorageError};

use crate::models::{
    Doctor, DoctorError, DoctorSearchFilters, DoctorStatus, NewDoctorProfile,
    PhotoUploadRequest, UpdateDoctorProfileRequest,
};

pub struct DoctorService {
    supabase: SupabaseClient,
    storage: LocalFileStorage,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            storage: LocalFileStorage::new(config),
        }
    }

    async fn fetch_one(&self, path: &str, auth_token: &str) -> Result<Option<Doctor>, DoctorError> {
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

    async fn patch_doctor(
        &self,
        doctor_id: Uuid,
        update: Value,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    /// Get doctor by ID regardless of approval status
    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        self.fetch_one(&path, auth_token).await?.ok_or(DoctorError::NotFound)
    }

    /// Get an approved doctor; pending and rejected profiles read as missing.
    pub async fn get_approved_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        let doctor = self.get_doctor(doctor_id, auth_token).await?;
        if !doctor.is_approved() {
            debug!("Doctor {} is {}, hiding from public view", doctor_id, doctor.status.as_str());
            return Err(DoctorError::NotFound);
        }
        Ok(doctor)
    }

    pub async fn find_by_user_id(&self, user_id: &str, auth_token: &str) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        self.fetch_one(&path, auth_token).await
    }

    /// Profile owned by the calling doctor account
    pub async fn get_own_profile(&self, user_id: &str, auth_token: &str) -> Result<Doctor, DoctorError> {
        self.find_by_user_id(user_id, auth_token)
            .await?
            .ok_or(DoctorError::ProfileNotFound)
    }

    /// Insert the default PENDING profile for a newly registered doctor
    pub async fn create_profile(
        &self,
        profile: NewDoctorProfile,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Creating doctor profile for user: {}", profile.user_id);

        let mut data = serde_json::to_value(&profile)?;
        if let Value::Object(ref mut map) = data {
            let now = Utc::now().to_rfc3339();
            map.insert("created_at".to_string(), json!(now));
            map.insert("updated_at".to_string(), json!(now));
        }

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctors",
            Some(auth_token),
            Some(data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::Database("Failed to create doctor profile".to_string()))?;
        let doctor: Doctor = serde_json::from_value(row)?;
        info!("Doctor profile {} created with status {}", doctor.id, doctor.status.as_str());
        Ok(doctor)
    }

    /// Update the caller's own profile and mark it configured
    pub async fn update_own_profile(
        &self,
        user_id: &str,
        request: UpdateDoctorProfileRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        request.validate()?;
        let doctor = self.get_own_profile(user_id, auth_token).await?;

        let mut update = Map::new();
        if let Some(name) = request.full_name {
            update.insert("full_name".to_string(), json!(name));
        }
        if let Some(specialty) = request.specialty {
            update.insert("specialty".to_string(), json!(specialty.trim()));
        }
        if let Some(fee) = request.consultation_fee {
            update.insert("consultation_fee".to_string(), json!(fee));
        }
        if let Some(location) = request.location {
            update.insert("location".to_string(), json!(location));
        }
        if let Some(duration) = request.consultation_duration {
            update.insert("consultation_duration".to_string(), json!(duration));
        }
        if let Some(bio) = request.bio {
            update.insert("bio".to_string(), json!(bio));
        }
        update.insert("profile_configured".to_string(), json!(true));
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self.patch_doctor(doctor.id, Value::Object(update), auth_token).await?;
        info!("Doctor profile {} updated", updated.id);
        Ok(updated)
    }

    /// Search approved doctors by specialty and location substrings
    pub async fn search_doctors(
        &self,
        filters: &DoctorSearchFilters,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Searching doctors with filters: {:?}", filters);

        let mut query_parts = vec![format!("status=eq.{}", DoctorStatus::Approved.as_str())];
        if let Some(specialty) = filters.specialty_term() {
            query_parts.push(format!("specialty=ilike.*{}*", urlencoding::encode(&specialty)));
        }
        if let Some(location) = filters.location_term() {
            query_parts.push(format!("location=ilike.*{}*", urlencoding::encode(&location)));
        }
        query_parts.push("order=full_name.asc".to_string());

        let path = format!("/rest/v1/doctors?{}", query_parts.join("&"));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let mut doctors = Vec::with_capacity(result.len());
        for row in result {
            let doctor: Doctor = serde_json::from_value(row)?;
            if filters.matches(&doctor) {
                doctors.push(doctor);
            } else {
                warn!("Dropping doctor {} returned by search but not matching filters", doctor.id);
            }
        }

        debug!("Found {} doctors", doctors.len());
        Ok(doctors)
    }

    pub async fn list_by_status(
        &self,
        status: DoctorStatus,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?status=eq.{}&order=created_at.asc", status.as_str());
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(DoctorError::from))
            .collect()
    }

    /// Admin decision on a doctor registration
    pub async fn set_status(
        &self,
        doctor_id: Uuid,
        status: DoctorStatus,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let current = self.get_doctor(doctor_id, auth_token).await?;
        if current.status == status {
            debug!("Doctor {} already {}", doctor_id, status.as_str());
            return Ok(current);
        }

        let update = json!({
            "status": status,
            "updated_at": Utc::now().to_rfc3339()
        });
        let doctor = self.patch_doctor(doctor_id, update, auth_token).await?;
        info!(
            "Doctor {} moved from {} to {}",
            doctor_id,
            current.status.as_str(),
            doctor.status.as_str()
        );
        Ok(doctor)
    }

    /// Store a new profile photo for the caller and record its reference
    pub async fn upload_photo(
        &self,
        user_id: &str,
        upload: PhotoUploadRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let doctor = self.get_own_profile(user_id, auth_token).await?;

        let reference = self.storage
            .save_profile_photo(&upload.data, upload.content_type.as_deref())
            .await
            .map_err(|e| match e {
                StorageError::Io(io) => DoctorError::Storage(io.to_string()),
                other => DoctorError::ValidationError(other.to_string()),
            })?;

        let update = json!({
            "photo_url": reference,
            "updated_at": Utc::now().to_rfc3339()
        });
        let updated = self.patch_doctor(doctor.id, update, auth_token).await?;

        if let Some(previous) = doctor.photo_url.as_deref().filter(|p| *p != reference) {
            if let Err(e) = self.storage.remove(previous).await {
                warn!("Could not remove previous photo {} of doctor {}: {}", previous, doctor.id, e);
            }
        }

        Ok(updated)
    }
}
