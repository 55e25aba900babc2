use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, DoctorError, UpdateWeeklyScheduleRequest, WeeklyScheduleEntry};

/// Notified after a doctor's weekly schedule has been replaced.
#[async_trait]
pub trait ScheduleObserver: Send + Sync {
    async fn schedule_saved(&self, doctor: &Doctor, auth_token: &str);
}

/// Observers installed on the doctor router.
#[derive(Clone, Default)]
pub struct ScheduleHooks {
    observers: Vec<Arc<dyn ScheduleObserver>>,
}

impl ScheduleHooks {
    pub fn new(observers: Vec<Arc<dyn ScheduleObserver>>) -> Self {
        Self { observers }
    }

    pub async fn notify(&self, doctor: &Doctor, auth_token: &str) {
        for observer in &self.observers {
            observer.schedule_saved(doctor, auth_token).await;
        }
    }
}

pub struct ScheduleService {
    supabase: SupabaseClient,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_schedule(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<WeeklyScheduleEntry>, DoctorError> {
        debug!("Fetching weekly schedule for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/weekly_schedule_entries?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
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

    /// Replace the doctor's weekly template wholesale.
    pub async fn replace_schedule(
        &self,
        doctor: &Doctor,
        request: UpdateWeeklyScheduleRequest,
        auth_token: &str,
    ) -> Result<Vec<WeeklyScheduleEntry>, DoctorError> {
        request.validate()?;

        let duration = request.duration_minutes;
        let entries = request.into_entries(doctor.id);

        // New rows go in before the superseded ones are removed, so a failed insert
        // leaves the previous template in place.
        let previous_ids: Vec<String> = self
            .get_schedule(doctor.id, auth_token)
            .await?
            .into_iter()
            .filter_map(|entry| entry.id)
            .map(|id| id.to_string())
            .collect();

        let saved = if entries.is_empty() {
            warn!("Doctor {} saved an empty weekly schedule", doctor.id);
            Vec::new()
        } else {
            let rows: Vec<Value> = entries
                .iter()
                .map(|entry| -> Result<Value, serde_json::Error> {
                    let mut row = serde_json::to_value(entry)?;
                    if let Value::Object(ref mut map) = row {
                        map.remove("id");
                    }
                    Ok(row)
                })
                .collect::<Result<_, _>>()?;

            let result: Vec<Value> = self.supabase.request_with_headers(
                Method::POST,
                "/rest/v1/weekly_schedule_entries",
                Some(auth_token),
                Some(Value::Array(rows)),
                Some(SupabaseClient::representation_headers()),
            ).await?;

            result
                .into_iter()
                .map(|row| serde_json::from_value(row).map_err(DoctorError::from))
                .collect::<Result<Vec<WeeklyScheduleEntry>, _>>()?
        };

        if !previous_ids.is_empty() {
            let delete_path = format!(
                "/rest/v1/weekly_schedule_entries?doctor_id=eq.{}&id=in.({})",
                doctor.id,
                previous_ids.join(",")
            );
            let _: Value = self.supabase.request(
                Method::DELETE,
                &delete_path,
                Some(auth_token),
                None,
            ).await?;
            debug!("Removed {} superseded schedule entries of doctor {}", previous_ids.len(), doctor.id);
        }

        if duration != doctor.consultation_duration {
            let path = format!("/rest/v1/doctors?id=eq.{}", doctor.id);
            let _: Value = self.supabase.request(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(serde_json::json!({ "consultation_duration": duration })),
            ).await?;
        }

        info!("Doctor {} weekly schedule replaced with {} entries", doctor.id, saved.len());
        Ok(saved)
    }
}
