use std::env;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_SLOT_HORIZON_WEEKS: i64 = 4;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    /// Root directory for uploaded profile photos.
    pub storage_root: PathBuf,
    pub slot_horizon_weeks: i64,
    /// Period of the background slot generation job. `None` disables it.
    pub slot_generation_interval_hours: Option<u64>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, background jobs will use the anon key");
                    String::new()
                }),
            storage_root: env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    warn!("STORAGE_ROOT not set, using ./uploads");
                    PathBuf::from("./uploads")
                }),
            slot_horizon_weeks: parse_var("SLOT_HORIZON_WEEKS")
                .filter(|weeks: &i64| *weeks > 0)
                .unwrap_or(DEFAULT_SLOT_HORIZON_WEEKS),
            slot_generation_interval_hours: parse_var("SLOT_GENERATION_INTERVAL_HOURS")
                .filter(|hours: &u64| *hours > 0),
            port: parse_var("PORT").unwrap_or(DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Key used by jobs that run outside a user request.
    pub fn background_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("{} has an invalid value '{}', ignoring", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_keys(service: &str) -> AppConfig {
        AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            supabase_service_role_key: service.to_string(),
            storage_root: PathBuf::from("./uploads"),
            slot_horizon_weeks: DEFAULT_SLOT_HORIZON_WEEKS,
            slot_generation_interval_hours: None,
            port: DEFAULT_PORT,
        }
    }

    #[test]
    fn background_key_prefers_service_role() {
        assert_eq!(config_with_keys("service").background_key(), "service");
        assert_eq!(config_with_keys("").background_key(), "anon");
    }

    #[test]
    fn configured_requires_gateway_settings() {
        let mut config = config_with_keys("");
        assert!(config.is_configured());
        config.supabase_jwt_secret.clear();
        assert!(!config.is_configured());
    }
}
