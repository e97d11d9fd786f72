use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, Set};

/// Enrollment of a student into a class. One row per (class, student).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "class_enrollments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub class_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::class::Entity",
        from = "Column::ClassId",
        to = "super::class::Column::Id"
    )]
    Class,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id"
    )]
    Student,
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn enroll(
        db: &DatabaseConnection,
        class_id: i64,
        student_id: i64,
    ) -> Result<Self, DbErr> {
        ActiveModel {
            class_id: Set(class_id),
            student_id: Set(student_id),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
    }
}
