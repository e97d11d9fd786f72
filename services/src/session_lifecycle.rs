//! Session open/close state machine.
//!
//! Scope key is (class subject, calendar date from the injected clock). The
//! open-existence check and the insert run in one transaction, and the
//! partial unique index on open sessions backstops the race where two open
//! calls pass the check concurrently.

use crate::error::AttendanceError;
use db::models::attendance_session::{
    ActiveModel, Column, Entity, Model as SessionModel, SessionStatus,
};
use db::models::class_subject::Entity as ClassSubjectEntity;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set, TransactionTrait,
};
use util::clock::Clock;

fn is_unique_violation(err: &DbErr) -> bool {
    // SQLite reports the partial index as a plain UNIQUE constraint failure.
    err.to_string().to_uppercase().contains("UNIQUE")
}

/// Opens a new attendance session for today, in status `open`.
///
/// The date comes from the server clock, never from the client. Fails with
/// [`AttendanceError::NotAssigned`] when the caller is not the teacher on the
/// class subject, and [`AttendanceError::SessionAlreadyOpen`] when the scope
/// already has an open session.
pub async fn open_session(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    class_subject_id: i64,
    requesting_teacher_id: i64,
    manual_allowed: bool,
) -> Result<SessionModel, AttendanceError> {
    let assignment = ClassSubjectEntity::find_by_id(class_subject_id)
        .one(db)
        .await?
        .ok_or(AttendanceError::NotAssigned)?;

    if assignment.teacher_id != requesting_teacher_id {
        return Err(AttendanceError::NotAssigned);
    }

    let today = clock.today();
    let txn = db.begin().await?;

    if let Some(existing) = SessionModel::find_open(&txn, class_subject_id, today).await? {
        txn.rollback().await?;
        return Err(AttendanceError::SessionAlreadyOpen {
            existing_id: existing.id,
        });
    }

    let inserted = ActiveModel {
        class_subject_id: Set(class_subject_id),
        date: Set(today),
        started_by: Set(requesting_teacher_id),
        status: Set(SessionStatus::Open),
        manual_allowed: Set(manual_allowed),
        closed_at: Set(None),
        created_at: Set(clock.now()),
        ..Default::default()
    }
    .insert(&txn)
    .await;

    match inserted {
        Ok(session) => {
            txn.commit().await?;
            tracing::info!(
                session_id = session.id,
                class_subject_id,
                teacher_id = requesting_teacher_id,
                "Opened attendance session"
            );
            Ok(session)
        }
        Err(e) if is_unique_violation(&e) => {
            // Lost the creation race; surface the winner's id.
            txn.rollback().await?;
            match SessionModel::find_open(db, class_subject_id, today).await? {
                Some(existing) => Err(AttendanceError::SessionAlreadyOpen {
                    existing_id: existing.id,
                }),
                None => Err(AttendanceError::Db(e)),
            }
        }
        Err(e) => {
            txn.rollback().await?;
            Err(AttendanceError::Db(e))
        }
    }
}

/// The open session for (class subject, today), if any. A query, not a failure.
pub async fn get_open_session(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    class_subject_id: i64,
) -> Result<Option<SessionModel>, AttendanceError> {
    Ok(SessionModel::find_open(db, class_subject_id, clock.today()).await?)
}

/// Transitions a session open -> closed, stamping `closed_at`.
///
/// Idempotent when already closed. Only the teacher who started the session
/// may close it. A closed session is never reopened; the next day's flow
/// creates a fresh session instead.
pub async fn close_session(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    session_id: i64,
    caller_id: i64,
) -> Result<SessionModel, AttendanceError> {
    let session = Entity::find_by_id(session_id)
        .one(db)
        .await?
        .ok_or(AttendanceError::SessionNotFound)?;

    if session.started_by != caller_id {
        return Err(AttendanceError::NotAuthorized);
    }

    if session.status == SessionStatus::Closed {
        return Ok(session);
    }

    let mut active = session.into_active_model();
    active.status = Set(SessionStatus::Closed);
    active.closed_at = Set(Some(clock.now()));
    let closed = active.update(db).await?;

    tracing::info!(session_id, "Closed attendance session");
    Ok(closed)
}

/// Convenience used by tests and seeding: all sessions for a scope, any status.
pub async fn sessions_for_scope(
    db: &DatabaseConnection,
    class_subject_id: i64,
    date: chrono::NaiveDate,
) -> Result<Vec<SessionModel>, DbErr> {
    Entity::find()
        .filter(Column::ClassSubjectId.eq(class_subject_id))
        .filter(Column::Date.eq(date))
        .all(db)
        .await
}
