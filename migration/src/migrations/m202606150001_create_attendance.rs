use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202606150001_create_attendance"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // attendance_sessions
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("attendance_sessions"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("class_subject_id"))
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("date")).date().not_null())
                    .col(
                        ColumnDef::new(Alias::new("started_by"))
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .string_len(10)
                            .not_null()
                            .default("open"),
                    )
                    .col(
                        ColumnDef::new(Alias::new("manual_allowed"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Alias::new("closed_at")).timestamp().null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_session_class_subject")
                            .from(
                                Alias::new("attendance_sessions"),
                                Alias::new("class_subject_id"),
                            )
                            .to(Alias::new("class_subjects"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_session_teacher")
                            .from(Alias::new("attendance_sessions"), Alias::new("started_by"))
                            .to(Alias::new("users"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Backstop for the open-session race: at most one open session per
        // (class_subject, date), while closed history rows may accumulate.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS uniq_open_session_per_scope \
                 ON attendance_sessions (class_subject_id, date) WHERE status = 'open'",
            )
            .await?;

        // attendance_records
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("attendance_records"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("session_id"))
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("student_id"))
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("entry_status"))
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("entry_method"))
                            .string_len(10)
                            .null(),
                    )
                    .col(ColumnDef::new(Alias::new("entry_time")).timestamp().null())
                    .col(
                        ColumnDef::new(Alias::new("exit_status"))
                            .string_len(20)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("exit_method"))
                            .string_len(10)
                            .null(),
                    )
                    .col(ColumnDef::new(Alias::new("exit_time")).timestamp().null())
                    // at most one record per (session, student)
                    .primary_key(
                        Index::create()
                            .col(Alias::new("session_id"))
                            .col(Alias::new("student_id")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_record_session")
                            .from(Alias::new("attendance_records"), Alias::new("session_id"))
                            .to(Alias::new("attendance_sessions"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_record_student")
                            .from(Alias::new("attendance_records"), Alias::new("student_id"))
                            .to(Alias::new("users"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // attendance_alerts
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("attendance_alerts"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("session_id"))
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("student_id"))
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("alert_type"))
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("message")).text().not_null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_alert_session")
                            .from(Alias::new("attendance_alerts"), Alias::new("session_id"))
                            .to(Alias::new("attendance_sessions"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_alert_student")
                            .from(Alias::new("attendance_alerts"), Alias::new("student_id"))
                            .to(Alias::new("users"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_att_alert_record")
                    .table(Alias::new("attendance_alerts"))
                    .col(Alias::new("session_id"))
                    .col(Alias::new("student_id"))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("attendance_alerts"))
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("attendance_records"))
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("attendance_sessions"))
                    .to_owned(),
            )
            .await
    }
}
