// libs/availability-cell/src/router.rs
use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_routes(state: AppState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_availability_public));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route(
            "/{doctor_id}/availability",
            put(handlers::replace_availability)
                .patch(handlers::update_availability)
                .delete(handlers::delete_availability),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
