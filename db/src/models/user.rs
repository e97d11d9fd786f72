use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};

/// Account role. Only `student`-role users carry face descriptors and
/// participate in recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "teacher")]
    Teacher,
    #[sea_orm(string_value = "student")]
    Student,
}

/// Registration approval state, managed by the external user-management flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(15))")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "unapproved")]
    Unapproved,
}

/// Represents a user in the `users` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name shown in recognition results.
    pub name: Option<String>,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    pub roll_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::face_encoding::Entity")]
    FaceEncoding,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    AttendanceRecords,
}

impl Related<super::face_encoding::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FaceEncoding.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AttendanceRecords.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Creates a new user with a hashed password.
    pub async fn create(
        db: &DatabaseConnection,
        username: &str,
        email: &str,
        password: &str,
        name: Option<&str>,
        role: Role,
    ) -> Result<Self, DbErr> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| DbErr::Custom(format!("Failed to hash password: {e}")))?
            .to_string();

        let now = Utc::now();
        let user = ActiveModel {
            username: Set(username.to_owned()),
            email: Set(email.to_owned()),
            password_hash: Set(password_hash),
            name: Set(name.map(str::to_owned)),
            role: Set(role),
            approval_status: Set(ApprovalStatus::Approved),
            roll_number: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        user.insert(db).await
    }

    /// Looks up an approved `student`-role user by id. Returns `None` for
    /// missing users and for users holding any other role.
    pub async fn find_student(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id)
            .filter(Column::Role.eq(Role::Student))
            .one(db)
            .await
    }

    pub fn verify_password(&self, password: &str) -> bool {
        PasswordHash::new(&self.password_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}
