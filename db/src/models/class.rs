use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, Set};

/// A class (cohort) that students enroll into.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "classes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub semester: i32,
    pub department: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::class_subject::Entity")]
    ClassSubjects,
    #[sea_orm(has_many = "super::class_enrollment::Entity")]
    Enrollments,
}

impl Related<super::class_subject::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClassSubjects.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl Related<super::class_enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        name: &str,
        year: i32,
        semester: i32,
        department: &str,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        ActiveModel {
            name: Set(name.to_owned()),
            year: Set(year),
            semester: Set(semester),
            department: Set(department.to_owned()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }
}
