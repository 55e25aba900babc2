use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::{appointment_routes, patient_appointment_routes};
use appointment_cell::services::SlotGenerationObserver;
use auth_cell::router::auth_routes;
use doctor_cell::router::doctor_routes;
use doctor_cell::services::{ScheduleHooks, ScheduleObserver};
use patient_cell::router::patient_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    // Saving a weekly schedule regenerates the doctor's slot horizon.
    let slot_generation: Arc<dyn ScheduleObserver> = Arc::new(SlotGenerationObserver::new(state.clone()));
    let schedule_hooks = ScheduleHooks::new(vec![slot_generation]);

    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone(), schedule_hooks))
        .nest(
            "/patients",
            patient_routes(state.clone()).merge(patient_appointment_routes(state.clone())),
        )
        .nest("/appointments", appointment_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use shared_utils::test_utils::TestConfig;
    use tower::ServiceExt;

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        create_router(TestConfig::default().to_arc())
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn root_responds() {
        assert_eq!(status_of("GET", "/").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_surfaces_are_mounted_behind_auth() {
        assert_eq!(status_of("GET", "/doctors/profile").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("GET", "/patients/profile").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("GET", "/appointments/mine").await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of("GET", "/patients/3f1c9a52-0000-4000-8000-000000000000/appointments").await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of("POST", "/appointments/generate").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("GET", "/appointments/admin/stats").await, StatusCode::UNAUTHORIZED);
    }
}
