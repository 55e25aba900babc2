// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    BookSlotRequest, CancelSlotRequest, DateRangeQuery, GenerateSlotsRequest, PageQuery,
    SlotStatusQuery, UpdateSlotStatusRequest,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::generator::{default_horizon, SlotGenerationService};

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let (default_from, default_to) = default_horizon(Utc::now().date_naive(), state.slot_horizon_weeks);
    let from = range.from.unwrap_or(default_from);
    let to = range.to.unwrap_or(default_to);

    let slots = AppointmentBookingService::new(&state)
        .list_available_slots(doctor_id, from, to, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "from": from,
        "to": to,
        "slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn list_slots_page(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let page = AppointmentBookingService::new(&state)
        .list_slots_page(doctor_id, query.page, Utc::now().date_naive(), &state.supabase_anon_key)
        .await?;

    Ok(Json(json!(page)))
}

// ==============================================================================
// AUTHENTICATED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Patient])?;

    let slot = AppointmentBookingService::new(&state)
        .book_slot(&user, request, auth.token())
        .await?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn get_slot(
    State(state): State<Arc<AppConfig>>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let actor = service.resolve_actor(&user, auth.token()).await?;
    let slot = service.get_slot_for(slot_id, actor, auth.token()).await?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn update_slot_status(
    State(state): State<Arc<AppConfig>>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateSlotStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let slot = AppointmentBookingService::new(&state)
        .transition_slot(&user, slot_id, request.status, request.reason, auth.token())
        .await?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn cancel_slot(
    State(state): State<Arc<AppConfig>>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let slot = AppointmentBookingService::new(&state)
        .cancel_slot(&user, slot_id, &request.reason, auth.token())
        .await?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn list_my_caseload(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SlotStatusQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;

    let slots = AppointmentBookingService::new(&state)
        .list_for_doctor(&user, query.status, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn list_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<SlotStatusQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let slots = AppointmentBookingService::new(&state)
        .list_for_patient(&user, patient_id, query.status, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": slots,
        "total": slots.len()
    })))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn generate_doctor_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(request): Query<GenerateSlotsRequest>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let service = SlotGenerationService::new(&state);
    let from = request.from.unwrap_or_else(|| Utc::now().date_naive());
    let to = match request.to {
        Some(to) => to,
        None => default_horizon(from, request.weeks.unwrap_or(state.slot_horizon_weeks)).1,
    };

    let report = service.generate_slots(doctor_id, from, to, auth.token()).await?;

    Ok(Json(json!(report)))
}

#[axum::debug_handler]
pub async fn generate_all_slots(
    State(state): State<Arc<AppConfig>>,
    Query(request): Query<GenerateSlotsRequest>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let service = SlotGenerationService::new(&state);
    let (from, to) = service.horizon_from_today(request.weeks);
    let reports = service
        .generate_for_all_approved(request.weeks, auth.token())
        .await?;
    let created: usize = reports.iter().map(|r| r.created).sum();

    Ok(Json(json!({
        "doctors": reports.len(),
        "created": created,
        "from": from,
        "to": to,
        "reports": reports
    })))
}

#[axum::debug_handler]
pub async fn list_all_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SlotStatusQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let slots = AppointmentBookingService::new(&state)
        .list_all(query.status, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotStatusQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let slots = AppointmentBookingService::new(&state)
        .list_for_doctor_id(doctor_id, query.status, auth.token())
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn appointment_statistics(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let stats = AppointmentBookingService::new(&state)
        .statistics(auth.token())
        .await?;

    Ok(Json(json!(stats)))
}
