use chrono::{DateTime, Utc};
use recognition::Descriptor;
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, Set};

/// Stored face descriptor, one per enrolled student.
///
/// The descriptor column holds the strict JSON-array encoding defined by
/// [`recognition::Descriptor`]. Rows are immutable once written and replaced
/// wholesale when a descriptor is re-derived.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "face_encodings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub descriptor: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id"
    )]
    Student,
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
    /// Stores a descriptor for a student, replacing any previous row.
    pub async fn replace_for_student(
        db: &DatabaseConnection,
        student_id: i64,
        descriptor: &Descriptor,
    ) -> Result<Self, DbErr> {
        Entity::delete_many()
            .filter(Column::StudentId.eq(student_id))
            .exec(db)
            .await?;

        ActiveModel {
            student_id: Set(student_id),
            descriptor: Set(descriptor.to_json()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Decodes the stored descriptor. A malformed row is logged and treated
    /// as "no descriptor" so it silently drops out of candidate sets.
    pub fn decode(&self) -> Option<Descriptor> {
        match Descriptor::from_json(&self.descriptor) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(
                    student_id = self.student_id,
                    error = %e,
                    "Skipping malformed stored face descriptor"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{Model as UserModel, Role};
    use crate::test_utils::setup_test_db;
    use recognition::DESCRIPTOR_LEN;

    #[tokio::test]
    async fn replace_keeps_a_single_row_per_student() {
        let db = setup_test_db().await;
        let student =
            UserModel::create(&db, "s1", "s1@test.com", "pw", Some("S One"), Role::Student)
                .await
                .unwrap();

        let first = Descriptor::new(vec![0.1; DESCRIPTOR_LEN]).unwrap();
        let second = Descriptor::new(vec![0.9; DESCRIPTOR_LEN]).unwrap();

        Model::replace_for_student(&db, student.id, &first)
            .await
            .unwrap();
        Model::replace_for_student(&db, student.id, &second)
            .await
            .unwrap();

        let rows = Entity::find()
            .filter(Column::StudentId.eq(student.id))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].decode(), Some(second));
    }

    #[tokio::test]
    async fn malformed_descriptor_decodes_to_none() {
        let db = setup_test_db().await;
        let student =
            UserModel::create(&db, "s2", "s2@test.com", "pw", Some("S Two"), Role::Student)
                .await
                .unwrap();

        let row = ActiveModel {
            student_id: Set(student.id),
            descriptor: Set("not json".into()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        assert_eq!(row.decode(), None);
    }
}
