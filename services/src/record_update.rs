//! Shared record-update algorithm.
//!
//! One attendance record exists per (session, student), created lazily on the
//! first mark. Entry and exit sides are mutated independently: the entry
//! triple freezes after its first timestamped write, while the exit triple is
//! overwritten by every exit mark so the latest exit wins. Get-or-create is
//! atomic via the composite primary key with conflict-as-fetch, which is what
//! keeps concurrent marks for the same pair from producing two rows.

use crate::error::AttendanceError;
use chrono::{DateTime, Utc};
use db::models::attendance_record::{
    ActiveModel, Column, Entity, EntryStatus, ExitStatus, Method, Model as RecordModel,
};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel, Set};
use serde::{Deserialize, Serialize};

/// Which side of the record a mark addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkMode {
    Entry,
    Exit,
}

fn entry_status_for(method: Method) -> EntryStatus {
    match method {
        Method::Facial => EntryStatus::Present,
        Method::Manual => EntryStatus::ManualPresent,
    }
}

fn exit_status_for(method: Method) -> ExitStatus {
    match method {
        Method::Facial => ExitStatus::Present,
        Method::Manual => ExitStatus::ManualExit,
    }
}

/// Applies one mark to the (session, student) record, creating it if needed.
///
/// Safe to call repeatedly with the same arguments: repeats never create a
/// second row, repeated entry marks are no-ops once `entry_time` is set, and
/// repeated exit marks simply overwrite the exit triple.
pub async fn apply_mark(
    db: &DatabaseConnection,
    session_id: i64,
    student_id: i64,
    mode: MarkMode,
    method: Method,
    now: DateTime<Utc>,
) -> Result<RecordModel, AttendanceError> {
    let fresh = match mode {
        MarkMode::Entry => ActiveModel {
            session_id: Set(session_id),
            student_id: Set(student_id),
            entry_status: Set(entry_status_for(method)),
            entry_method: Set(Some(method)),
            entry_time: Set(Some(now)),
            exit_status: Set(None),
            exit_method: Set(None),
            exit_time: Set(None),
        },
        // An exit mark with no prior record: the student leaves without a
        // recorded entry. Entry side stays absent with no timestamp.
        MarkMode::Exit => ActiveModel {
            session_id: Set(session_id),
            student_id: Set(student_id),
            entry_status: Set(EntryStatus::Absent),
            entry_method: Set(None),
            entry_time: Set(None),
            exit_status: Set(Some(exit_status_for(method))),
            exit_method: Set(Some(method)),
            exit_time: Set(Some(now)),
        },
    };

    let inserted = Entity::insert(fresh)
        .on_conflict(
            OnConflict::columns([Column::SessionId, Column::StudentId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let existing = Entity::find_by_id((session_id, student_id))
        .one(db)
        .await?
        .ok_or_else(|| {
            AttendanceError::Db(DbErr::Custom(
                "attendance record vanished during update".into(),
            ))
        })?;

    if inserted > 0 {
        // Fresh row already carries this mark.
        return Ok(existing);
    }

    let mut active = existing.clone().into_active_model();
    let mut dirty = false;

    match mode {
        MarkMode::Entry => {
            // Write-once-then-frozen: only the first timestamped entry sticks.
            if existing.entry_time.is_none() {
                active.entry_status = Set(entry_status_for(method));
                active.entry_method = Set(Some(method));
                active.entry_time = Set(Some(now));
                dirty = true;
            }
        }
        MarkMode::Exit => {
            // Exit is last-write-wins.
            active.exit_status = Set(Some(exit_status_for(method)));
            active.exit_method = Set(Some(method));
            active.exit_time = Set(Some(now));
            dirty = true;
        }
    }

    if dirty {
        Ok(active.update(db).await?)
    } else {
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use db::models::attendance_session::{ActiveModel as SessionActive, SessionStatus};
    use db::models::class::Model as ClassModel;
    use db::models::class_subject::Model as ClassSubjectModel;
    use db::models::subject::Model as SubjectModel;
    use db::models::user::{Model as UserModel, Role};
    use db::test_utils::setup_test_db;
    use sea_orm::PaginatorTrait;

    async fn seed_session(db: &DatabaseConnection) -> (i64, i64) {
        let teacher = UserModel::create(db, "t", "t@test.com", "pw", None, Role::Teacher)
            .await
            .unwrap();
        let student = UserModel::create(db, "s", "s@test.com", "pw", None, Role::Student)
            .await
            .unwrap();
        let class = ClassModel::create(db, "BE IT 2nd", 2026, 4, "IT").await.unwrap();
        let subject = SubjectModel::create(db, "Databases", "IT204").await.unwrap();
        let cs = ClassSubjectModel::create(db, class.id, subject.id, teacher.id)
            .await
            .unwrap();

        let now = Utc.with_ymd_and_hms(2026, 6, 20, 8, 0, 0).unwrap();
        let session = SessionActive {
            class_subject_id: Set(cs.id),
            date: Set(now.date_naive()),
            started_by: Set(teacher.id),
            status: Set(SessionStatus::Open),
            manual_allowed: Set(true),
            closed_at: Set(None),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        (session.id, student.id)
    }

    #[tokio::test]
    async fn entry_is_frozen_after_first_write() {
        let db = setup_test_db().await;
        let (session_id, student_id) = seed_session(&db).await;

        let t1 = Utc.with_ymd_and_hms(2026, 6, 20, 8, 5, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 6, 20, 8, 30, 0).unwrap();

        let first = apply_mark(&db, session_id, student_id, MarkMode::Entry, Method::Facial, t1)
            .await
            .unwrap();
        assert_eq!(first.entry_status, EntryStatus::Present);
        assert_eq!(first.entry_time, Some(t1));

        // A later manual entry mark must not thaw the frozen entry side.
        let second = apply_mark(&db, session_id, student_id, MarkMode::Entry, Method::Manual, t2)
            .await
            .unwrap();
        assert_eq!(second.entry_status, EntryStatus::Present);
        assert_eq!(second.entry_method, Some(Method::Facial));
        assert_eq!(second.entry_time, Some(t1));

        let count = Entity::find().count(&db).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn exit_is_overwritten_by_the_latest_mark() {
        let db = setup_test_db().await;
        let (session_id, student_id) = seed_session(&db).await;

        let t1 = Utc.with_ymd_and_hms(2026, 6, 20, 9, 50, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 6, 20, 9, 58, 0).unwrap();

        apply_mark(&db, session_id, student_id, MarkMode::Exit, Method::Facial, t1)
            .await
            .unwrap();
        let latest = apply_mark(&db, session_id, student_id, MarkMode::Exit, Method::Manual, t2)
            .await
            .unwrap();

        assert_eq!(latest.exit_status, Some(ExitStatus::ManualExit));
        assert_eq!(latest.exit_method, Some(Method::Manual));
        assert_eq!(latest.exit_time, Some(t2));
    }

    #[tokio::test]
    async fn exit_on_fresh_record_leaves_entry_absent() {
        let db = setup_test_db().await;
        let (session_id, student_id) = seed_session(&db).await;

        let t = Utc.with_ymd_and_hms(2026, 6, 20, 9, 55, 0).unwrap();
        let record = apply_mark(&db, session_id, student_id, MarkMode::Exit, Method::Facial, t)
            .await
            .unwrap();

        assert_eq!(record.entry_status, EntryStatus::Absent);
        assert_eq!(record.entry_time, None);
        assert_eq!(record.entry_method, None);
        assert_eq!(record.exit_status, Some(ExitStatus::Present));
        assert_eq!(record.exit_time, Some(t));
    }

    #[tokio::test]
    async fn entry_after_exit_fills_the_frozen_side_once() {
        let db = setup_test_db().await;
        let (session_id, student_id) = seed_session(&db).await;

        let t_exit = Utc.with_ymd_and_hms(2026, 6, 20, 9, 55, 0).unwrap();
        let t_entry = Utc.with_ymd_and_hms(2026, 6, 20, 9, 57, 0).unwrap();

        apply_mark(&db, session_id, student_id, MarkMode::Exit, Method::Facial, t_exit)
            .await
            .unwrap();
        let record =
            apply_mark(&db, session_id, student_id, MarkMode::Entry, Method::Facial, t_entry)
                .await
                .unwrap();

        // Entry side had no timestamp yet, so this first entry write lands.
        assert_eq!(record.entry_status, EntryStatus::Present);
        assert_eq!(record.entry_time, Some(t_entry));
        // Exit side is untouched by an entry mark.
        assert_eq!(record.exit_time, Some(t_exit));

        let count = Entity::find().count(&db).await.unwrap();
        assert_eq!(count, 1);
    }
}
