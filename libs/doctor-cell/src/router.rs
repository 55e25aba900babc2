use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Extension, Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::ScheduleHooks;

pub fn doctor_routes(state: Arc<AppConfig>, hooks: ScheduleHooks) -> Router {
    let public_routes = Router::new()
        .route("/search", get(handlers::search_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/schedule", get(handlers::get_doctor_schedule))
        .route("/{doctor_id}/availability", get(handlers::get_daily_availability));

    let protected_routes = Router::new()
        // Own profile management
        .route("/profile", get(handlers::get_own_profile).put(handlers::update_own_profile))
        .route("/profile/schedule", put(handlers::update_own_schedule))
        .route("/profile/photo", post(handlers::upload_profile_photo))

        // Admin approval panel
        .route("/admin/pending", get(handlers::list_pending_doctors))
        .route("/admin/{doctor_id}/approve", post(handlers::approve_doctor))
        .route("/admin/{doctor_id}/reject", post(handlers::reject_doctor))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(Extension(hooks))
        .with_state(state)
}
