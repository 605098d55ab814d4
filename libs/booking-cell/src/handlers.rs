// libs/booking-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use availability_cell::services::store::AvailabilityService;
use shared_database::AppState;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentStatus, BookSlotRequest, BookingError, BookingPrerequisites,
    SelectionError, UpdateStatusRequest, VisitDetails,
};
use crate::services::appointments::AppointmentService;
use crate::services::commit::BookingCommitService;
use crate::services::selection::SlotSelection;

/// Books one slot as the authenticated patient. Runs the whole viewer flow in
/// order: sanitize availability, drive the selection machine through date and
/// time, then the atomic commit.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Appointment>, AppError> {
    let now = Utc::now().naive_utc();

    let availability = AvailabilityService::new(state.store.clone());
    let record = availability
        .read_sanitized(&request.doctor_id, now)
        .await
        .map_err(|e| AppError::Store(e.to_string()))?;

    let mut selection = SlotSelection::new();
    selection.prerequisites = BookingPrerequisites {
        reason: request.reason.clone(),
        insurance: request.insurance.clone(),
        patient_type: request.patient_type,
    };

    selection
        .toggle_date(request.date, &record, now)
        .map_err(selection_error)?;
    selection
        .pick_time(request.time, &record)
        .map_err(selection_error)?;
    let (date, time) = selection.begin_commit().map_err(selection_error)?;

    let visit_details = VisitDetails {
        reason: request.reason,
        insurance: request.insurance,
        // begin_commit re-validated the prerequisites, patient_type is set
        patient_type: request.patient_type.ok_or_else(|| {
            AppError::BadRequest("patient_type is required".to_string())
        })?,
        notes: request.notes,
    };

    let commit = BookingCommitService::new(state.store.clone());
    match commit
        .book(&request.doctor_id, &user, date, time, visit_details)
        .await
    {
        Ok(appointment) => {
            selection.complete().map_err(selection_error)?;
            Ok(Json(appointment))
        }
        Err(e) => {
            selection.fail().map_err(selection_error)?;
            Err(booking_error(e))
        }
    }
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let service = AppointmentService::new(state.store.clone());
    let appointment = service.get(appointment_id).await.map_err(booking_error)?;

    authorize_appointment_access(&user, &appointment)?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(state.store.clone());
    let appointments = service
        .list_for_patient(&user.id)
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if user.id != doctor_id && !user.is_admin() {
        return Err(AppError::Auth(
            "Not authorized to view this doctor's appointments".to_string(),
        ));
    }

    let service = AppointmentService::new(state.store.clone());
    let appointments = service
        .list_for_doctor(&doctor_id)
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Appointment>, AppError> {
    let service = AppointmentService::new(state.store.clone());
    let appointment = service.get(appointment_id).await.map_err(booking_error)?;

    authorize_status_change(&user, &appointment, request.status)?;

    let updated = service
        .update_status(appointment_id, request.status)
        .await
        .map_err(booking_error)?;
    Ok(Json(updated))
}

fn authorize_appointment_access(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    if user.id == appointment.patient_id || user.id == appointment.doctor_id || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Auth(
            "Not authorized to view this appointment".to_string(),
        ))
    }
}

// The doctor (or an admin) drives the lifecycle; the patient may only cancel.
fn authorize_status_change(
    user: &User,
    appointment: &Appointment,
    next: AppointmentStatus,
) -> Result<(), AppError> {
    if user.id == appointment.doctor_id || user.is_admin() {
        return Ok(());
    }
    if user.id == appointment.patient_id && next == AppointmentStatus::Cancelled {
        return Ok(());
    }
    Err(AppError::Auth(
        "Not authorized to change this appointment's status".to_string(),
    ))
}

fn selection_error(e: SelectionError) -> AppError {
    match e {
        SelectionError::IncompletePrerequisites(fields) => {
            let names: Vec<&str> = fields
                .iter()
                .map(|f| match f {
                    crate::models::PrerequisiteField::Reason => "reason",
                    crate::models::PrerequisiteField::Insurance => "insurance",
                    crate::models::PrerequisiteField::PatientType => "patient_type",
                })
                .collect();
            AppError::BadRequest(format!("Missing booking prerequisites: {}", names.join(", ")))
        }
        SelectionError::NoSlotsOnDate | SelectionError::SlotNotOffered => {
            AppError::Conflict("This time was just taken".to_string())
        }
        SelectionError::InvalidTransition(what) => {
            AppError::Internal(format!("invalid selection transition: {}", what))
        }
    }
}

fn booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::StoreUnavailable(msg) => AppError::Store(msg),
        BookingError::SlotNoLongerAvailable => {
            AppError::Conflict("This time was just taken".to_string())
        }
        BookingError::SchedulingFailed(msg) => AppError::Conflict(msg),
        BookingError::NotFound(id) => AppError::NotFound(format!("Appointment {}", id)),
        BookingError::InvalidStatusTransition { from, to } => {
            AppError::BadRequest(format!("Cannot change status from {} to {}", from, to))
        }
        BookingError::Malformed(msg) => AppError::Internal(msg),
    }
}
