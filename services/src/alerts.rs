//! Alert derivation.
//!
//! Alerts are derived annotations over a session's records and are never
//! authoritative. Regeneration is idempotent: the session's existing alerts
//! are deleted and recomputed from the records, so re-running the deriver
//! never accumulates duplicates.

use crate::error::AttendanceError;
use chrono::Duration;
use db::models::attendance_alert::{
    ActiveModel as AlertActive, AlertType, Column as AlertCol, Entity as AlertEntity,
    Model as AlertModel,
};
use db::models::attendance_record::{Column as RecordCol, Entity as RecordEntity};
use db::models::attendance_session::{Entity as SessionEntity, Model as SessionModel};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use util::clock::Clock;

/// Thresholds for time-based alerts. Institution policy, so both are plain
/// configuration with no enforced default: an unset threshold disables that
/// check entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertThresholds {
    pub late_entry_grace: Option<Duration>,
    pub early_exit_cutoff: Option<Duration>,
}

impl AlertThresholds {
    pub fn from_config() -> Self {
        Self {
            late_entry_grace: util::config::late_entry_grace_minutes().map(Duration::minutes),
            early_exit_cutoff: util::config::early_exit_cutoff_minutes().map(Duration::minutes),
        }
    }
}

/// Regenerates alerts for one session from its records.
///
/// Only the teacher who started the session may regenerate its alerts, since
/// this rewrites the session's alert rows. Works for open sessions too, but
/// close-dependent checks (`early_exit`, `missing_exit`) only fire once the
/// session has a `closed_at`.
pub async fn regenerate_for_session(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    session_id: i64,
    caller_id: i64,
    thresholds: AlertThresholds,
) -> Result<Vec<AlertModel>, AttendanceError> {
    let session: SessionModel = SessionEntity::find_by_id(session_id)
        .one(db)
        .await?
        .ok_or(AttendanceError::SessionNotFound)?;

    if session.started_by != caller_id {
        return Err(AttendanceError::NotAuthorized);
    }

    let records = RecordEntity::find()
        .filter(RecordCol::SessionId.eq(session_id))
        .all(db)
        .await?;

    // delete-then-reinsert keeps regeneration idempotent
    AlertEntity::delete_many()
        .filter(AlertCol::SessionId.eq(session_id))
        .exec(db)
        .await?;

    let now = clock.now();
    let mut alerts = Vec::new();

    for record in &records {
        if let (Some(grace), Some(entry_time)) = (thresholds.late_entry_grace, record.entry_time) {
            let deadline = session.created_at + grace;
            if entry_time > deadline {
                let minutes = (entry_time - session.created_at).num_minutes();
                alerts.push((
                    record.student_id,
                    AlertType::LateEntry,
                    format!("Entered {minutes} minutes after session start"),
                ));
            }
        }

        if let (Some(cutoff), Some(closed_at), Some(exit_time)) = (
            thresholds.early_exit_cutoff,
            session.closed_at,
            record.exit_time,
        ) {
            let earliest_normal = closed_at - cutoff;
            if exit_time < earliest_normal {
                let minutes = (closed_at - exit_time).num_minutes();
                alerts.push((
                    record.student_id,
                    AlertType::EarlyExit,
                    format!("Exited {minutes} minutes before session close"),
                ));
            }
        }

        if session.closed_at.is_some() && record.entry_time.is_some() && record.exit_time.is_none()
        {
            alerts.push((
                record.student_id,
                AlertType::MissingExit,
                "No exit recorded before session close".to_owned(),
            ));
        }
    }

    let mut inserted = Vec::with_capacity(alerts.len());
    for (student_id, alert_type, message) in alerts {
        let row = AlertActive {
            session_id: Set(session_id),
            student_id: Set(student_id),
            alert_type: Set(alert_type),
            message: Set(message),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        inserted.push(row);
    }

    tracing::debug!(
        session_id,
        count = inserted.len(),
        "Regenerated attendance alerts"
    );
    Ok(inserted)
}

/// All alerts currently stored for a session.
pub async fn list_for_session(
    db: &DatabaseConnection,
    session_id: i64,
) -> Result<Vec<AlertModel>, AttendanceError> {
    Ok(AlertEntity::find()
        .filter(AlertCol::SessionId.eq(session_id))
        .all(db)
        .await?)
}
