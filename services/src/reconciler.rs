//! Recognition reconciler.
//!
//! Turns a batch of still images submitted against an open session into
//! deduplicated student marks. The posture is best-effort throughout: images
//! that fail to encode are skipped, students whose stored descriptor is
//! malformed drop out of the candidate pool, and a student deleted between
//! candidate build and record write is skipped. None of these fail the batch.

use crate::error::AttendanceError;
use crate::record_update::{self, MarkMode};
use db::models::attendance_record::Method;
use db::models::attendance_session::Entity as SessionEntity;
use db::models::class_enrollment::{Column as EnrollCol, Entity as EnrollEntity};
use db::models::class_subject::Entity as ClassSubjectEntity;
use db::models::face_encoding::{Column as EncodingCol, Entity as EncodingEntity};
use db::models::user::{Column as UserCol, Entity as UserEntity, Model as UserModel, Role};
use recognition::encoder::FaceEncoder;
use recognition::{Descriptor, match_descriptor};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use util::clock::Clock;

/// One recognized-and-marked student.
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionResult {
    pub student_id: i64,
    pub name: String,
    pub mode: MarkMode,
    pub status: String,
}

/// Candidate pool: enrolled student-role users of the session's class that
/// have a decodable stored descriptor.
async fn build_candidates(
    db: &DatabaseConnection,
    class_id: i64,
) -> Result<(Vec<(i64, Descriptor)>, HashMap<i64, UserModel>), AttendanceError> {
    let enrolled_ids: Vec<i64> = EnrollEntity::find()
        .filter(EnrollCol::ClassId.eq(class_id))
        .all(db)
        .await?
        .into_iter()
        .map(|e| e.student_id)
        .collect();

    if enrolled_ids.is_empty() {
        return Ok((Vec::new(), HashMap::new()));
    }

    let students: HashMap<i64, UserModel> = UserEntity::find()
        .filter(UserCol::Id.is_in(enrolled_ids.clone()))
        .filter(UserCol::Role.eq(Role::Student))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let mut candidates = Vec::with_capacity(students.len());
    let encodings = EncodingEntity::find()
        .filter(EncodingCol::StudentId.is_in(students.keys().copied().collect::<Vec<_>>()))
        .all(db)
        .await?;

    for row in encodings {
        // decode() logs and yields None for malformed rows; the student then
        // simply has no descriptor and cannot be recognized.
        if let Some(descriptor) = row.decode() {
            candidates.push((row.student_id, descriptor));
        }
    }
    candidates.sort_by_key(|(id, _)| *id);

    Ok((candidates, students))
}

/// Reconciles an image batch against an open session.
///
/// Matched candidates stay in the pool between probes, so one student seen in
/// several images is matched repeatedly and deduplicated afterwards. An empty
/// recognized set is a normal outcome with no side effects, not an error.
pub async fn reconcile(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    encoder: &dyn FaceEncoder,
    session_id: i64,
    caller_id: i64,
    images: &[Vec<u8>],
    mode: MarkMode,
) -> Result<Vec<RecognitionResult>, AttendanceError> {
    let session = SessionEntity::find_by_id(session_id)
        .one(db)
        .await?
        .filter(|s| s.is_open())
        .ok_or(AttendanceError::SessionClosedOrNotFound)?;

    if session.started_by != caller_id {
        return Err(AttendanceError::NotAuthorized);
    }

    let class_subject = ClassSubjectEntity::find_by_id(session.class_subject_id)
        .one(db)
        .await?
        .ok_or(AttendanceError::SessionClosedOrNotFound)?;

    let (candidates, students) = build_candidates(db, class_subject.class_id).await?;
    let tolerance = util::config::face_match_tolerance();

    // Stable output order regardless of probe order.
    let mut recognized: BTreeSet<i64> = BTreeSet::new();

    for (idx, image) in images.iter().enumerate() {
        let probes = match encoder.detect_and_encode(image).await {
            Ok(probes) => probes,
            Err(e) => {
                // Per-image skip; the rest of the batch proceeds.
                tracing::warn!(session_id, image = idx, error = %e, "Skipping image that failed to encode");
                continue;
            }
        };

        for probe in &probes {
            if let Some(student_id) = match_descriptor(probe, &candidates, tolerance) {
                recognized.insert(student_id);
            }
        }
    }

    if recognized.is_empty() {
        return Ok(Vec::new());
    }

    let now = clock.now();
    let mut results = Vec::with_capacity(recognized.len());

    for student_id in recognized {
        let Some(student) = students.get(&student_id) else {
            continue;
        };

        match record_update::apply_mark(db, session_id, student_id, mode, Method::Facial, now).await
        {
            Ok(_) => results.push(RecognitionResult {
                student_id,
                name: student
                    .name
                    .clone()
                    .unwrap_or_else(|| student.username.clone()),
                mode,
                status: "marked".into(),
            }),
            Err(e) => {
                // A student deleted mid-batch must not sink already-marked
                // classmates.
                tracing::warn!(session_id, student_id, error = %e, "Skipping student whose record could not be written");
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use db::models::attendance_record::{
        Column as RecordCol, Entity as RecordEntity, EntryStatus, ExitStatus,
    };
    use db::models::attendance_session::{ActiveModel as SessionActive, SessionStatus};
    use db::models::class::Model as ClassModel;
    use db::models::class_enrollment::Model as EnrollmentModel;
    use db::models::class_subject::Model as ClassSubjectModel;
    use db::models::face_encoding::Model as EncodingModel;
    use db::models::subject::Model as SubjectModel;
    use db::models::user::Model as UserModel;
    use db::test_utils::setup_test_db;
    use recognition::DESCRIPTOR_LEN;
    use recognition::encoder::EncodeError;
    use sea_orm::{ActiveModelTrait, PaginatorTrait, Set};
    use util::clock::FixedClock;

    /// Test double keyed on the first byte of the image: each key maps to the
    /// probes "found" in that image.
    struct StubEncoder {
        by_first_byte: HashMap<u8, Vec<Descriptor>>,
    }

    #[async_trait]
    impl FaceEncoder for StubEncoder {
        async fn detect_and_encode(&self, image: &[u8]) -> Result<Vec<Descriptor>, EncodeError> {
            match image.first() {
                Some(0xEE) => Err(EncodeError::Request("decode failure".into())),
                Some(b) => Ok(self.by_first_byte.get(b).cloned().unwrap_or_default()),
                None => Ok(Vec::new()),
            }
        }
    }

    /// Test double that deletes a student while encoding. The deletion lands
    /// after the candidate pool is built and before any record write.
    struct VanishingEncoder {
        db: DatabaseConnection,
        victim: i64,
        probes: Vec<Descriptor>,
    }

    #[async_trait]
    impl FaceEncoder for VanishingEncoder {
        async fn detect_and_encode(&self, _image: &[u8]) -> Result<Vec<Descriptor>, EncodeError> {
            EncodingEntity::delete_many()
                .filter(EncodingCol::StudentId.eq(self.victim))
                .exec(&self.db)
                .await
                .map_err(|e| EncodeError::Request(e.to_string()))?;
            EnrollEntity::delete_many()
                .filter(EnrollCol::StudentId.eq(self.victim))
                .exec(&self.db)
                .await
                .map_err(|e| EncodeError::Request(e.to_string()))?;
            UserEntity::delete_by_id(self.victim)
                .exec(&self.db)
                .await
                .map_err(|e| EncodeError::Request(e.to_string()))?;
            Ok(self.probes.clone())
        }
    }

    fn descriptor_at(offset: f64) -> Descriptor {
        let mut values = vec![0.0; DESCRIPTOR_LEN];
        values[0] = offset;
        Descriptor::new(values).unwrap()
    }

    struct Fixture {
        teacher: UserModel,
        s1: UserModel,
        s2: UserModel,
        session_id: i64,
    }

    async fn seed(db: &DatabaseConnection, status: SessionStatus) -> Fixture {
        let teacher = UserModel::create(db, "lect", "lect@test.com", "pw", None, Role::Teacher)
            .await
            .unwrap();
        let s1 = UserModel::create(db, "stud1", "stud1@test.com", "pw", Some("Student One"), Role::Student)
            .await
            .unwrap();
        let s2 = UserModel::create(db, "stud2", "stud2@test.com", "pw", Some("Student Two"), Role::Student)
            .await
            .unwrap();

        let class = ClassModel::create(db, "BSc CS 1st", 2026, 2, "Computing")
            .await
            .unwrap();
        let subject = SubjectModel::create(db, "Programming", "CS101").await.unwrap();
        let cs = ClassSubjectModel::create(db, class.id, subject.id, teacher.id)
            .await
            .unwrap();
        EnrollmentModel::enroll(db, class.id, s1.id).await.unwrap();
        EnrollmentModel::enroll(db, class.id, s2.id).await.unwrap();

        // S1 sits at offset 0.0, S2 at offset 10.0 in the embedding space.
        EncodingModel::replace_for_student(db, s1.id, &descriptor_at(0.0))
            .await
            .unwrap();
        EncodingModel::replace_for_student(db, s2.id, &descriptor_at(10.0))
            .await
            .unwrap();

        let now = Utc.with_ymd_and_hms(2026, 6, 20, 8, 0, 0).unwrap();
        let closed = status == SessionStatus::Closed;
        let session = SessionActive {
            class_subject_id: Set(cs.id),
            date: Set(now.date_naive()),
            started_by: Set(teacher.id),
            status: Set(status),
            manual_allowed: Set(false),
            closed_at: Set(closed.then_some(now)),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        Fixture {
            teacher,
            s1,
            s2,
            session_id: session.id,
        }
    }

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2026, 6, 20, 8, 10, 0).unwrap())
    }

    /// Images 0x01/0x02 both show S1; 0x03 shows S2.
    fn stub_encoder() -> StubEncoder {
        let mut by_first_byte = HashMap::new();
        by_first_byte.insert(0x01, vec![descriptor_at(0.1)]);
        by_first_byte.insert(0x02, vec![descriptor_at(0.05)]);
        by_first_byte.insert(0x03, vec![descriptor_at(10.2)]);
        StubEncoder { by_first_byte }
    }

    #[tokio::test]
    async fn batch_recognizing_s1_s1_s2_marks_each_once() {
        let db = setup_test_db().await;
        let fx = seed(&db, SessionStatus::Open).await;
        let clock = clock();
        let encoder = stub_encoder();

        let images = vec![vec![0x01], vec![0x02], vec![0x03]];
        let results = reconcile(
            &db,
            &clock,
            &encoder,
            fx.session_id,
            fx.teacher.id,
            &images,
            MarkMode::Entry,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].student_id, fx.s1.id);
        assert_eq!(results[0].name, "Student One");
        assert_eq!(results[0].status, "marked");
        assert_eq!(results[1].student_id, fx.s2.id);

        let records = RecordEntity::find()
            .filter(RecordCol::SessionId.eq(fx.session_id))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        for r in &records {
            assert_eq!(r.entry_status, EntryStatus::Present);
            assert_eq!(r.entry_time, Some(clock.now()));
        }
    }

    #[tokio::test]
    async fn closed_session_fails_and_writes_nothing() {
        let db = setup_test_db().await;
        let fx = seed(&db, SessionStatus::Closed).await;
        let clock = clock();
        let encoder = stub_encoder();

        let err = reconcile(
            &db,
            &clock,
            &encoder,
            fx.session_id,
            fx.teacher.id,
            &[vec![0x01]],
            MarkMode::Entry,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AttendanceError::SessionClosedOrNotFound));

        assert_eq!(RecordEntity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn only_the_session_starter_may_reconcile() {
        let db = setup_test_db().await;
        let fx = seed(&db, SessionStatus::Open).await;
        let intruder = UserModel::create(&db, "other", "other@test.com", "pw", None, Role::Teacher)
            .await
            .unwrap();
        let clock = clock();
        let encoder = stub_encoder();

        let err = reconcile(
            &db,
            &clock,
            &encoder,
            fx.session_id,
            intruder.id,
            &[vec![0x01]],
            MarkMode::Entry,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AttendanceError::NotAuthorized));
    }

    #[tokio::test]
    async fn no_recognized_faces_is_a_normal_empty_outcome() {
        let db = setup_test_db().await;
        let fx = seed(&db, SessionStatus::Open).await;
        let clock = clock();
        let encoder = StubEncoder {
            by_first_byte: HashMap::new(),
        };

        let results = reconcile(
            &db,
            &clock,
            &encoder,
            fx.session_id,
            fx.teacher.id,
            &[vec![0x42], Vec::new()],
            MarkMode::Entry,
        )
        .await
        .unwrap();
        assert!(results.is_empty());
        assert_eq!(RecordEntity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_image_is_skipped_without_failing_the_batch() {
        let db = setup_test_db().await;
        let fx = seed(&db, SessionStatus::Open).await;
        let clock = clock();
        let encoder = stub_encoder();

        // 0xEE simulates a decode/provider failure; 0x03 still recognizes S2.
        let results = reconcile(
            &db,
            &clock,
            &encoder,
            fx.session_id,
            fx.teacher.id,
            &[vec![0xEE], vec![0x03]],
            MarkMode::Entry,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].student_id, fx.s2.id);
    }

    #[tokio::test]
    async fn probe_outside_tolerance_matches_nobody() {
        let db = setup_test_db().await;
        let fx = seed(&db, SessionStatus::Open).await;
        let clock = clock();

        let mut by_first_byte = HashMap::new();
        // Halfway between S1 (0.0) and S2 (10.0): far outside 0.5 of either.
        by_first_byte.insert(0x09, vec![descriptor_at(5.0)]);
        let encoder = StubEncoder { by_first_byte };

        let results = reconcile(
            &db,
            &clock,
            &encoder,
            fx.session_id,
            fx.teacher.id,
            &[vec![0x09]],
            MarkMode::Entry,
        )
        .await
        .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn student_without_descriptor_is_excluded_not_fatal() {
        let db = setup_test_db().await;
        let fx = seed(&db, SessionStatus::Open).await;
        let clock = clock();

        // Corrupt S1's stored descriptor; S1 can no longer match but the
        // batch still recognizes S2.
        let row = db::models::face_encoding::Entity::find()
            .filter(db::models::face_encoding::Column::StudentId.eq(fx.s1.id))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        let mut active: db::models::face_encoding::ActiveModel = row.into();
        active.descriptor = Set("[1, 2, \"three\"]".into());
        active.update(&db).await.unwrap();

        let encoder = stub_encoder();
        let results = reconcile(
            &db,
            &clock,
            &encoder,
            fx.session_id,
            fx.teacher.id,
            &[vec![0x01], vec![0x03]],
            MarkMode::Entry,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].student_id, fx.s2.id);
    }

    #[tokio::test]
    async fn student_deleted_mid_batch_does_not_sink_classmates() {
        let db = setup_test_db().await;
        let fx = seed(&db, SessionStatus::Open).await;
        let clock = clock();

        // S1 vanishes while the single image is encoding, yet the already
        // built pool still matches both students. S1's record write fails on
        // the user foreign key and is skipped; S2 is marked normally.
        let encoder = VanishingEncoder {
            db: db.clone(),
            victim: fx.s1.id,
            probes: vec![descriptor_at(0.1), descriptor_at(10.2)],
        };

        let results = reconcile(
            &db,
            &clock,
            &encoder,
            fx.session_id,
            fx.teacher.id,
            &[vec![0x01]],
            MarkMode::Entry,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].student_id, fx.s2.id);

        let records = RecordEntity::find()
            .filter(RecordCol::SessionId.eq(fx.session_id))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student_id, fx.s2.id);
    }

    #[tokio::test]
    async fn exit_mode_reconcile_overwrites_exit_side_only() {
        let db = setup_test_db().await;
        let fx = seed(&db, SessionStatus::Open).await;
        let clock = clock();
        let encoder = stub_encoder();

        reconcile(
            &db,
            &clock,
            &encoder,
            fx.session_id,
            fx.teacher.id,
            &[vec![0x01]],
            MarkMode::Entry,
        )
        .await
        .unwrap();

        clock.set(Utc.with_ymd_and_hms(2026, 6, 20, 9, 55, 0).unwrap());
        let results = reconcile(
            &db,
            &clock,
            &encoder,
            fx.session_id,
            fx.teacher.id,
            &[vec![0x01]],
            MarkMode::Exit,
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 1);

        let record = RecordEntity::find_by_id((fx.session_id, fx.s1.id))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.entry_status, EntryStatus::Present);
        assert_eq!(record.exit_status, Some(ExitStatus::Present));
        assert_eq!(record.exit_time, Some(clock.now()));
    }
}
