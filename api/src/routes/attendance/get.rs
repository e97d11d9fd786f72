use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use super::common::{OpenSessionQuery, SessionResponse, error_message, error_status};
use db::models::attendance_alert::Model as AlertModel;
use db::models::attendance_record::{
    Column as RecordCol, Entity as RecordEntity, Model as RecordModel,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use services::{alerts, session_lifecycle};

/// GET /api/attendance/sessions/open?class_subject_id=...
///
/// Looks up today's open session for a class subject. `data` is `null` when
/// none exists; that is a normal answer, not a 404.
pub async fn open_session_for_scope(
    State(state): State<AppState>,
    Extension(AuthUser(_claims)): Extension<AuthUser>,
    Query(query): Query<OpenSessionQuery>,
) -> (StatusCode, Json<ApiResponse<Option<SessionResponse>>>) {
    match session_lifecycle::get_open_session(state.db(), state.clock(), query.class_subject_id)
        .await
    {
        Ok(Some(session)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(SessionResponse::from(session)),
                "Open session found",
            )),
        ),
        Ok(None) => (
            StatusCode::OK,
            Json(ApiResponse::success(None, "No open session for today")),
        ),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::error(error_message(&e))),
        ),
    }
}

/// GET /api/attendance/sessions/{session_id}/records
pub async fn list_records(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(_claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Vec<RecordModel>>>) {
    match RecordEntity::find()
        .filter(RecordCol::SessionId.eq(session_id))
        .order_by_asc(RecordCol::StudentId)
        .all(state.db())
        .await
    {
        Ok(records) => (
            StatusCode::OK,
            Json(ApiResponse::success(records, "Attendance records fetched")),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Internal server error")),
            )
        }
    }
}

/// GET /api/attendance/sessions/{session_id}/alerts
pub async fn list_alerts(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(_claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Vec<AlertModel>>>) {
    match alerts::list_for_session(state.db(), session_id).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(rows, "Alerts fetched")),
        ),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::error(error_message(&e))),
        ),
    }
}
