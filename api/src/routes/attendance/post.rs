use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use super::common::{ManualMarkReq, OpenSessionReq, SessionResponse, error_message, error_status};
use db::models::attendance_alert::Model as AlertModel;
use db::models::attendance_record::Model as RecordModel;
use services::{AttendanceError, MarkMode};
use services::alerts::{self, AlertThresholds};
use services::manual;
use services::reconciler::{self, RecognitionResult};
use services::session_lifecycle;

/// POST /api/attendance/sessions
///
/// Opens today's session for a class subject. The date always comes from the
/// server clock. Returns `409 Conflict` with the existing session id when the
/// scope already has an open session.
pub async fn open_session(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<OpenSessionReq>,
) -> (StatusCode, Json<ApiResponse<Value>>) {
    match session_lifecycle::open_session(
        state.db(),
        state.clock(),
        body.class_subject_id,
        claims.sub,
        body.manual_allowed.unwrap_or(false),
    )
    .await
    {
        Ok(session) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                json!(SessionResponse::from(session)),
                "Attendance session opened",
            )),
        ),
        Err(AttendanceError::SessionAlreadyOpen { existing_id }) => (
            StatusCode::CONFLICT,
            Json(ApiResponse {
                success: false,
                data: json!({ "existing_session_id": existing_id }),
                message: error_message(&AttendanceError::SessionAlreadyOpen { existing_id }),
            }),
        ),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::error(error_message(&e))),
        ),
    }
}

/// POST /api/attendance/sessions/{session_id}/recognize
///
/// Multipart body: one or more `images` file parts and a `mode` text part
/// (`entry` or `exit`). Recognizes enrolled students across all images and
/// applies one mark per distinct student. An empty result list is a normal
/// outcome, not an error.
pub async fn recognize(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    mut multipart: Multipart,
) -> (StatusCode, Json<ApiResponse<Vec<RecognitionResult>>>) {
    let mut images: Vec<Vec<u8>> = Vec::new();
    let mut mode: Option<MarkMode> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ApiResponse::error(format!("Malformed multipart body: {e}"))),
                );
            }
        };

        match field.name() {
            Some("images") => match field.bytes().await {
                Ok(bytes) => images.push(bytes.to_vec()),
                Err(e) => {
                    return (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        Json(ApiResponse::error(format!("Failed to read image part: {e}"))),
                    );
                }
            },
            Some("mode") => {
                let text = field.text().await.unwrap_or_default();
                mode = match text.as_str() {
                    "entry" => Some(MarkMode::Entry),
                    "exit" => Some(MarkMode::Exit),
                    _ => {
                        return (
                            StatusCode::UNPROCESSABLE_ENTITY,
                            Json(ApiResponse::error("mode must be 'entry' or 'exit'")),
                        );
                    }
                };
            }
            _ => {}
        }
    }

    let Some(mode) = mode else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::error("Missing 'mode' field")),
        );
    };

    match reconciler::reconcile(
        state.db(),
        state.clock(),
        state.encoder(),
        session_id,
        claims.sub,
        &images,
        mode,
    )
    .await
    {
        Ok(results) => {
            let message = if results.is_empty() {
                "No enrolled students recognized".to_owned()
            } else {
                format!("Marked {} student(s)", results.len())
            };
            (StatusCode::OK, Json(ApiResponse::success(results, message)))
        }
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::error(error_message(&e))),
        ),
    }
}

/// POST /api/attendance/sessions/{session_id}/manual
///
/// Marks a single student by id, bypassing recognition. Only permitted on
/// open sessions that were created with manual marking allowed.
pub async fn manual_mark(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<ManualMarkReq>,
) -> (StatusCode, Json<ApiResponse<Option<RecordModel>>>) {
    match manual::mark_manual(
        state.db(),
        state.clock(),
        session_id,
        body.student_id,
        body.mode,
        claims.sub,
    )
    .await
    {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(Some(record), "Attendance marked manually")),
        ),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::error(error_message(&e))),
        ),
    }
}

/// POST /api/attendance/sessions/{session_id}/alerts
///
/// Recomputes the session's alerts from its records using the configured
/// thresholds. Safe to call repeatedly.
pub async fn regenerate_alerts(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Vec<AlertModel>>>) {
    match alerts::regenerate_for_session(
        state.db(),
        state.clock(),
        session_id,
        claims.sub,
        AlertThresholds::from_config(),
    )
    .await
    {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(rows, "Alerts regenerated")),
        ),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::error(error_message(&e))),
        ),
    }
}
