#![allow(dead_code)]

use api::routes::routes;
use async_trait::async_trait;
use axum::Router;
use chrono::{TimeZone, Utc};
use db::models::class::Model as ClassModel;
use db::models::class_enrollment::Model as EnrollmentModel;
use db::models::class_subject::Model as ClassSubjectModel;
use db::models::face_encoding::Model as FaceEncodingModel;
use db::models::subject::Model as SubjectModel;
use db::models::user::{Model as UserModel, Role};
use db::test_utils::setup_test_db;
use recognition::encoder::{EncodeError, FaceEncoder};
use recognition::{DESCRIPTOR_LEN, Descriptor};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use util::clock::FixedClock;
use util::state::AppState;

/// Encoder stub returning a fixed descriptor list for every image.
pub struct StubEncoder {
    pub descriptors: Vec<Descriptor>,
}

#[async_trait]
impl FaceEncoder for StubEncoder {
    async fn detect_and_encode(&self, _image: &[u8]) -> Result<Vec<Descriptor>, EncodeError> {
        Ok(self.descriptors.clone())
    }
}

/// Descriptor with `offset` in the first dimension and zeroes elsewhere.
pub fn descriptor_at(offset: f64) -> Descriptor {
    let mut values = vec![0.0; DESCRIPTOR_LEN];
    values[0] = offset;
    Descriptor::new(values).unwrap()
}

pub struct TestCtx {
    pub db: DatabaseConnection,
    pub teacher: UserModel,
    pub other_teacher: UserModel,
    pub student: UserModel,
    pub class_subject_id: i64,
}

/// Seeds a class subject taught by `teacher` with one enrolled student that
/// has a stored descriptor at offset 0.0.
pub async fn seed(db: &DatabaseConnection) -> TestCtx {
    let teacher = UserModel::create(db, "api_t", "api_t@test.com", "password", None, Role::Teacher)
        .await
        .unwrap();
    let other_teacher = UserModel::create(
        db,
        "api_t2",
        "api_t2@test.com",
        "password",
        None,
        Role::Teacher,
    )
    .await
    .unwrap();
    let student = UserModel::create(
        db,
        "api_s1",
        "api_s1@test.com",
        "password",
        Some("Asha Rai"),
        Role::Student,
    )
    .await
    .unwrap();

    let class = ClassModel::create(db, "BSc 2nd", 2026, 2, "CS").await.unwrap();
    let subject = SubjectModel::create(db, "Databases", "CS301").await.unwrap();
    let cs = ClassSubjectModel::create(db, class.id, subject.id, teacher.id)
        .await
        .unwrap();
    EnrollmentModel::enroll(db, class.id, student.id).await.unwrap();
    FaceEncodingModel::replace_for_student(db, student.id, &descriptor_at(0.0))
        .await
        .unwrap();

    TestCtx {
        db: db.clone(),
        teacher,
        other_teacher,
        student,
        class_subject_id: cs.id,
    }
}

/// Full app over an in-memory database, a fixed clock at 2026-06-20 08:00
/// UTC and the given encoder stub.
pub async fn make_test_app(encoder: StubEncoder) -> (Router, TestCtx) {
    let db = setup_test_db().await;
    let ctx = seed(&db).await;

    let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 6, 20, 8, 0, 0).unwrap());
    let state = AppState::new(db, Arc::new(clock), Arc::new(encoder));

    let app = Router::new().nest("/api", routes(state));
    (app, ctx)
}

pub fn bearer(user: &UserModel) -> String {
    let (token, _) = api::auth::generate_jwt(user.id, user.role).unwrap();
    format!("Bearer {token}")
}
