use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use services::{AttendanceError, MarkMode};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: i64,
    pub class_subject_id: i64,
    pub date: String,
    pub started_by: i64,
    pub status: String,
    pub manual_allowed: bool,
    pub closed_at: Option<String>,
    pub created_at: String,
}

impl From<db::models::attendance_session::Model> for SessionResponse {
    fn from(m: db::models::attendance_session::Model) -> Self {
        use db::models::attendance_session::SessionStatus;
        Self {
            id: m.id,
            class_subject_id: m.class_subject_id,
            date: m.date.to_string(),
            started_by: m.started_by,
            status: match m.status {
                SessionStatus::Open => "open".to_owned(),
                SessionStatus::Closed => "closed".to_owned(),
            },
            manual_allowed: m.manual_allowed,
            closed_at: m.closed_at.map(|t| t.to_rfc3339()),
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
pub struct OpenSessionReq {
    pub class_subject_id: i64,
    pub manual_allowed: Option<bool>,
}

#[derive(Deserialize)]
pub struct OpenSessionQuery {
    pub class_subject_id: i64,
}

#[derive(Deserialize)]
pub struct ManualMarkReq {
    pub student_id: i64,
    pub mode: MarkMode,
}

/// Maps a service error to an HTTP status. Database failures never leak
/// their detail to the client.
pub fn error_status(err: &AttendanceError) -> StatusCode {
    match err {
        AttendanceError::NotAssigned
        | AttendanceError::NotAuthorized
        | AttendanceError::ManualNotAllowed => StatusCode::FORBIDDEN,
        AttendanceError::SessionAlreadyOpen { .. } => StatusCode::CONFLICT,
        AttendanceError::SessionNotFound
        | AttendanceError::SessionClosedOrNotFound
        | AttendanceError::StudentNotFound => StatusCode::NOT_FOUND,
        AttendanceError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Client-facing message for a service error.
pub fn error_message(err: &AttendanceError) -> String {
    match err {
        AttendanceError::Db(e) => {
            tracing::error!(error = %e, "Database error");
            "Internal server error".to_owned()
        }
        other => other.to_string(),
    }
}
