// libs/availability-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use shared_database::AppState;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AvailabilityError, AvailabilityRecord, AvailabilityView, ReplaceAvailabilityRequest,
    UpdateSlotsRequest,
};
use crate::services::sanitize;
use crate::services::store::AvailabilityService;
use crate::services::window::CalendarWindow;

#[derive(Debug, Deserialize)]
pub struct AvailabilityViewQuery {
    pub viewport_width: Option<u32>,
    pub page: Option<u32>,
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_availability_public(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
    Query(query): Query<AvailabilityViewQuery>,
) -> Result<Json<AvailabilityView>, AppError> {
    let service = AvailabilityService::new(state.store.clone());
    let now = Utc::now().naive_utc();

    let record = service.read_sanitized(&doctor_id, now).await.map_err(availability_error)?;

    let mut window = CalendarWindow::new(query.viewport_width.unwrap_or(0));
    window.ensure_anchor(&record, now.date());
    window.jump_to_page(query.page.unwrap_or(0));

    Ok(Json(AvailabilityView {
        doctor_id,
        window: window.dates().into_iter().map(crate::models::DateKey).collect(),
        next_available: sanitize::next_available(&record, now),
        slots_by_date: record.slots_by_date,
    }))
}

// ==============================================================================
// PROTECTED PROVIDER HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn replace_availability(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(request): Json<ReplaceAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_schedule_edit(&user, &doctor_id)?;

    let record = AvailabilityRecord {
        slots_by_date: request.slots_by_date,
    };
    record.validate().map_err(availability_error)?;

    let service = AvailabilityService::new(state.store.clone());
    service.replace(&doctor_id, &record).await.map_err(availability_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "slots_by_date": record.slots_by_date
    })))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(request): Json<UpdateSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_schedule_edit(&user, &doctor_id)?;

    if request.add.is_empty() && request.remove.is_empty() {
        return Err(AppError::BadRequest("Nothing to add or remove".to_string()));
    }

    let service = AvailabilityService::new(state.store.clone());
    let record = service
        .apply_update(&doctor_id, &request.add, &request.remove)
        .await
        .map_err(availability_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "slots_by_date": record.slots_by_date
    })))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    authorize_schedule_edit(&user, &doctor_id)?;

    let service = AvailabilityService::new(state.store.clone());
    service.delete(&doctor_id).await.map_err(availability_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "deleted": true
    })))
}

// Doctors edit their own schedule; admins can edit anyone's.
fn authorize_schedule_edit(user: &User, doctor_id: &str) -> Result<(), AppError> {
    if user.id == doctor_id || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Auth(
            "Not authorized to edit this doctor's schedule".to_string(),
        ))
    }
}

fn availability_error(e: AvailabilityError) -> AppError {
    match e {
        AvailabilityError::StoreUnavailable(msg) => AppError::Store(msg),
        AvailabilityError::Contention => {
            AppError::Conflict("Availability was modified concurrently".to_string())
        }
        AvailabilityError::InvalidSlot(msg) => AppError::ValidationError(msg),
        AvailabilityError::Malformed(msg) => AppError::Internal(msg),
    }
}
