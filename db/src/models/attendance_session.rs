use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
}

/// A time-boxed attendance session scoped to one (class_subject, date).
///
/// At most one session per scope may be `open` at a time; closed sessions for
/// the same scope accumulate as history. A session is never reopened.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub class_subject_id: i64,
    pub date: NaiveDate,
    pub started_by: i64,
    pub status: SessionStatus,
    pub manual_allowed: bool,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::class_subject::Entity",
        from = "Column::ClassSubjectId",
        to = "super::class_subject::Column::Id"
    )]
    ClassSubject,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StartedBy",
        to = "super::user::Column::Id"
    )]
    Starter,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::class_subject::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClassSubject.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// The open session for (class_subject, date), if any. A missing open
    /// session is a normal lookup miss, not an error.
    pub async fn find_open(
        db: &impl ConnectionTrait,
        class_subject_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::ClassSubjectId.eq(class_subject_id))
            .filter(Column::Date.eq(date))
            .filter(Column::Status.eq(SessionStatus::Open))
            .one(db)
            .await
    }
}
