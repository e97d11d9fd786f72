//! Manual override marking.
//!
//! Same session-state and authorization preconditions as recognition, but for
//! one explicitly identified student and with no matching involved.

use crate::error::AttendanceError;
use crate::record_update::{self, MarkMode};
use db::models::attendance_record::{Method, Model as RecordModel};
use db::models::attendance_session::Entity as SessionEntity;
use db::models::user::Model as UserModel;
use sea_orm::{DatabaseConnection, EntityTrait};
use util::clock::Clock;

/// Marks entry or exit for a single student without recognition.
///
/// Requires an open session whose starter is the caller and that permits
/// manual marking. The student id must resolve to a `student`-role user.
pub async fn mark_manual(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    session_id: i64,
    student_id: i64,
    mode: MarkMode,
    caller_id: i64,
) -> Result<RecordModel, AttendanceError> {
    let session = SessionEntity::find_by_id(session_id)
        .one(db)
        .await?
        .filter(|s| s.is_open())
        .ok_or(AttendanceError::SessionClosedOrNotFound)?;

    if session.started_by != caller_id {
        return Err(AttendanceError::NotAuthorized);
    }

    if !session.manual_allowed {
        return Err(AttendanceError::ManualNotAllowed);
    }

    let student = UserModel::find_student(db, student_id)
        .await?
        .ok_or(AttendanceError::StudentNotFound)?;

    let record =
        record_update::apply_mark(db, session_id, student.id, mode, Method::Manual, clock.now())
            .await?;

    tracing::info!(
        session_id,
        student_id,
        mode = ?mode,
        "Applied manual attendance mark"
    );
    Ok(record)
}
