use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use super::common::{SessionResponse, error_message, error_status};
use services::session_lifecycle;

/// PUT /api/attendance/sessions/{session_id}/close
///
/// Closes the session, stamping `closed_at`. Idempotent: closing an already
/// closed session returns it unchanged. Only the starter may close.
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Option<SessionResponse>>>) {
    match session_lifecycle::close_session(state.db(), state.clock(), session_id, claims.sub).await
    {
        Ok(session) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(SessionResponse::from(session)),
                "Attendance session closed",
            )),
        ),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::error(error_message(&e))),
        ),
    }
}
