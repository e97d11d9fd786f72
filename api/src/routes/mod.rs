//! HTTP route entry point for `/api/...`.
//!
//! Route groups:
//! - `/health` -> Health check endpoint (public)
//! - `/attendance` -> Session lifecycle, recognition, manual marks, records
//!   and alerts (teacher role required)

use crate::auth::guards::allow_teacher;
use crate::routes::{attendance::attendance_routes, health::health_routes};
use axum::{Router, middleware::from_fn};
use util::state::AppState;

pub mod attendance;
pub mod health;

/// Builds the complete application router for all HTTP endpoints.
///
/// The returned router has `AppState` as its state type and mounts all API
/// routes under their respective base paths.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest(
            "/attendance",
            attendance_routes().route_layer(from_fn(allow_teacher)),
        )
        .with_state(app_state)
}
