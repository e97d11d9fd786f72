use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202606010001_create_users::Migration),
            Box::new(migrations::m202606010002_create_classes::Migration),
            Box::new(migrations::m202606010003_create_subjects::Migration),
            Box::new(migrations::m202606010004_create_class_subjects::Migration),
            Box::new(migrations::m202606010005_create_class_enrollments::Migration),
            Box::new(migrations::m202606080001_create_face_encodings::Migration),
            Box::new(migrations::m202606150001_create_attendance::Migration),
        ]
    }
}
