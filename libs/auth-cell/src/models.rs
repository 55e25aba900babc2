use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::auth::Role;
use shared_models::error::AppError;

const USERNAME_PATTERN: &str = r"^[A-Za-z0-9_.-]{3,32}$";

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: Option<String>,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl RegisterRequest {
    /// Checks the request and returns the role to register with. A blank role means patient.
    pub fn validate(&self) -> Result<Role, AuthError> {
        let username_regex = Regex::new(USERNAME_PATTERN)
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;
        if !username_regex.is_match(self.username.trim()) {
            return Err(AuthError::ValidationError(
                "Username must be 3-32 characters of letters, digits, '.', '_' or '-'".to_string(),
            ));
        }

        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        if let Some(confirm) = &self.confirm_password {
            if confirm != &self.password {
                return Err(AuthError::ValidationError("Passwords do not match".to_string()));
            }
        }

        if self.name.trim().is_empty() {
            return Err(AuthError::ValidationError("Name is required".to_string()));
        }

        let role = match self.role.as_deref().map(str::trim) {
            None | Some("") => Role::Patient,
            Some(raw) => raw.parse::<Role>().map_err(AuthError::ValidationError)?,
        };

        if role == Role::Admin {
            return Err(AuthError::ValidationError(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }

        Ok(role)
    }
}

/// Row stored in the `users` table.
#[derive(Debug, Clone, Serialize)]
pub struct NewUserRecord {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub user: RegisteredUser,
    /// Whether the role-specific profile row was created alongside the account.
    pub profile_created: bool,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::DatabaseError(e.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::ValidationError(msg) => AppError::ValidationError(msg),
            AuthError::UsernameTaken(_) => AppError::Conflict(e.to_string()),
            AuthError::Hashing(msg) => AppError::Internal(msg),
            AuthError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
