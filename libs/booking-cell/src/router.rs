// libs/booking-cell/src/router.rs
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Every booking route requires an authenticated caller; an unauthenticated
/// viewer never reaches slot selection.
pub fn booking_routes(state: AppState) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/me", get(handlers::get_my_appointments))
        .route("/doctor/{doctor_id}", get(handlers::get_doctor_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
