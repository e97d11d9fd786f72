//! Attendance endpoints: session lifecycle, recognition batches, manual
//! marks, records and derived alerts.

use axum::{
    Router,
    routing::{get, post, put},
};
use util::state::AppState;

pub mod common;
pub mod get;
pub mod post;
pub mod put;

pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(post::open_session))
        .route("/sessions/open", get(get::open_session_for_scope))
        .route("/sessions/{session_id}/close", put(put::close_session))
        .route("/sessions/{session_id}/recognize", post(post::recognize))
        .route("/sessions/{session_id}/manual", post(post::manual_mark))
        .route("/sessions/{session_id}/records", get(get::list_records))
        .route(
            "/sessions/{session_id}/alerts",
            post(post::regenerate_alerts).get(get::list_alerts),
        )
}
