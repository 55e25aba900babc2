use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    DoctorSearchFilters, DoctorStatus, PhotoUploadRequest, UpdateDoctorProfileRequest,
    UpdateWeeklyScheduleRequest,
};
use crate::services::{AvailabilityService, DoctorService, ScheduleHooks, ScheduleService};

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn search_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(filters): Query<DoctorSearchFilters>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctors = doctor_service
        .search_doctors(&filters, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service
        .get_approved_doctor(doctor_id, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_doctor_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = &state.supabase_anon_key;
    let doctor = DoctorService::new(&state).get_approved_doctor(doctor_id, token).await?;
    let entries = ScheduleService::new(&state).get_schedule(doctor.id, token).await?;

    Ok(Json(json!({
        "doctor_id": doctor.id,
        "consultation_duration": doctor.consultation_duration,
        "entries": entries
    })))
}

#[axum::debug_handler]
pub async fn get_daily_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let availability = availability_service
        .get_daily_availability(doctor_id, query.date, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!(availability)))
}

// ==============================================================================
// DOCTOR PROFILE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_own_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;

    let doctor = DoctorService::new(&state)
        .get_own_profile(&user.id, auth.token())
        .await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_own_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorProfileRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;

    let doctor = DoctorService::new(&state)
        .update_own_profile(&user.id, request, auth.token())
        .await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_own_schedule(
    State(state): State<Arc<AppConfig>>,
    Extension(hooks): Extension<ScheduleHooks>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateWeeklyScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;
    let token = auth.token();

    let doctor = DoctorService::new(&state).get_own_profile(&user.id, token).await?;
    let entries = ScheduleService::new(&state)
        .replace_schedule(&doctor, request, token)
        .await?;

    hooks.notify(&doctor, token).await;

    Ok(Json(json!({
        "doctor_id": doctor.id,
        "entries": entries
    })))
}

#[axum::debug_handler]
pub async fn upload_profile_photo(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(upload): Json<PhotoUploadRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;

    let doctor = DoctorService::new(&state)
        .upload_photo(&user.id, upload, auth.token())
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor.id,
        "photo_url": doctor.photo_url
    })))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_pending_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let doctors = DoctorService::new(&state)
        .list_by_status(DoctorStatus::Pending, auth.token())
        .await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn approve_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let doctor = DoctorService::new(&state)
        .set_status(doctor_id, DoctorStatus::Approved, auth.token())
        .await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn reject_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let doctor = DoctorService::new(&state)
        .set_status(doctor_id, DoctorStatus::Rejected, auth.token())
        .await?;

    Ok(Json(json!(doctor)))
}
