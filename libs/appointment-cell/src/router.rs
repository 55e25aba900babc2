// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/doctors/{doctor_id}/available", get(handlers::list_available_slots))
        .route("/doctors/{doctor_id}/slots", get(handlers::list_slots_page));

    let protected_routes = Router::new()
        .route("/", post(handlers::book_slot))
        .route("/mine", get(handlers::list_my_caseload))
        .route(
            "/{slot_id}",
            get(handlers::get_slot).delete(handlers::cancel_slot),
        )
        .route("/{slot_id}/status", put(handlers::update_slot_status))

        // Admin slot generation
        .route("/generate", post(handlers::generate_all_slots))
        .route("/generate/{doctor_id}", post(handlers::generate_doctor_slots))

        // Admin oversight
        .route("/admin/all", get(handlers::list_all_appointments))
        .route("/admin/doctor/{doctor_id}", get(handlers::list_doctor_appointments))
        .route("/admin/stats", get(handlers::appointment_statistics))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Appointment listings served under the patient resource.
pub fn patient_appointment_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/{patient_id}/appointments", get(handlers::list_patient_appointments))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
