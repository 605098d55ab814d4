use axum::{
    Router,
    routing::get,
};

use availability_cell::router::availability_routes;
use booking_cell::router::booking_routes;
use shared_database::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "MediFind API is running!" }))
        .nest("/doctors", availability_routes(state.clone()))
        .nest("/appointments", booking_routes(state))
}
