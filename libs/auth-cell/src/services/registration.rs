// libs/auth-cell/src/services/registration.rs
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::models::NewDoctorProfile;
use doctor_cell::services::DoctorService;
use patient_cell::models::CreatePatientRequest;
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::Role;

use crate::models::{AuthError, NewUserRecord, RegisterRequest, RegisteredUser, RegistrationResponse};

#[instrument(skip(password))]
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(password_hash.to_string())
}

pub struct RegistrationService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    patients: PatientService,
    /// Registration runs without a caller token.
    service_key: String,
}

impl RegistrationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            patients: PatientService::new(config),
            service_key: config.background_key().to_string(),
        }
    }

    async fn username_taken(&self, username: &str) -> Result<bool, AuthError> {
        let path = format!(
            "/rest/v1/users?select=id&username=eq.{}",
            urlencoding::encode(username)
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;
        Ok(!result.is_empty())
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<RegistrationResponse, AuthError> {
        let role = request.validate()?;
        let username = request.username.trim().to_string();
        debug!("Registering user {} as {}", username, role);

        if self.username_taken(&username).await? {
            return Err(AuthError::UsernameTaken(username));
        }

        let record = NewUserRecord {
            id: Uuid::new_v4(),
            username,
            password_hash: hash_password(&request.password)?,
            full_name: request.name.trim().to_string(),
            role,
            enabled: true,
        };

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/users",
            Some(&self.service_key),
            Some(serde_json::to_value(&record)?),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let user: RegisteredUser = match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)?,
            None => return Err(AuthError::DatabaseError("Failed to create user".to_string())),
        };
        info!("Registered user {} ({})", user.username, user.role);

        let profile_created = self.create_role_profile(&user).await;

        Ok(RegistrationResponse { user, profile_created })
    }

    /// Best effort: the account exists whether or not the profile row could be written.
    async fn create_role_profile(&self, user: &RegisteredUser) -> bool {
        let user_id = user.id.to_string();

        let outcome = match user.role {
            Role::Doctor => self.doctors
                .create_profile(NewDoctorProfile::pending(&user_id, &user.full_name), &self.service_key)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Role::Patient => {
                let request = CreatePatientRequest {
                    full_name: Some(user.full_name.clone()),
                    ..Default::default()
                };
                self.patients
                    .create_profile(&user_id, request, &self.service_key)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            Role::Admin => return false,
        };

        match outcome {
            Ok(()) => true,
            Err(e) => {
                warn!("Profile creation for user {} failed: {}", user.id, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{PasswordHash, PasswordVerifier};

    #[test]
    fn hashes_verify_and_are_salted() {
        let first = hash_password("correct-horse").unwrap();
        let second = hash_password("correct-horse").unwrap();
        assert_ne!(first, second);

        let parsed = PasswordHash::new(&first).unwrap();
        assert!(Argon2::default().verify_password(b"correct-horse", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong-horse", &parsed).is_err());
    }
}
