//! Create application table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Application::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Application::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Application::ApplicationNumber)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Application::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Application::Status)
                            .string_len(20)
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(Application::CurrentStep)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Application::CompletedSteps)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(ColumnDef::new(Application::Program).string_len(256))
                    .col(ColumnDef::new(Application::Department).string_len(256))
                    .col(ColumnDef::new(Application::AcademicYear).string_len(32))
                    .col(ColumnDef::new(Application::Semester).string_len(32))
                    .col(
                        ColumnDef::new(Application::DisabilityStatus)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Application::DisabilityType).string_len(256))
                    .col(ColumnDef::new(Application::EmergencyContactName).string_len(256))
                    .col(ColumnDef::new(Application::EmergencyContactPhone).string_len(32))
                    .col(
                        ColumnDef::new(Application::EmergencyContactRelationship).string_len(64),
                    )
                    .col(ColumnDef::new(Application::SubmittedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Application::ReviewedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Application::ReviewedBy).string_len(32))
                    .col(ColumnDef::new(Application::Comments).text())
                    .col(ColumnDef::new(Application::RejectionReason).text())
                    .col(
                        ColumnDef::new(Application::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Application::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_application_user")
                            .from(Application::Table, Application::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_application_reviewer")
                            .from(Application::Table, Application::ReviewedBy)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: application_number
        manager
            .create_index(
                Index::create()
                    .name("idx_application_number")
                    .table(Application::Table)
                    .col(Application::ApplicationNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: user_id (for listing an applicant's applications)
        manager
            .create_index(
                Index::create()
                    .name("idx_application_user_id")
                    .table(Application::Table)
                    .col(Application::UserId)
                    .to_owned(),
            )
            .await?;

        // Index: status (for admin filtering and stats)
        manager
            .create_index(
                Index::create()
                    .name("idx_application_status")
                    .table(Application::Table)
                    .col(Application::Status)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (for ordering)
        manager
            .create_index(
                Index::create()
                    .name("idx_application_created_at")
                    .table(Application::Table)
                    .col(Application::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Application::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Application {
    Table,
    Id,
    ApplicationNumber,
    UserId,
    Status,
    CurrentStep,
    CompletedSteps,
    Program,
    Department,
    AcademicYear,
    Semester,
    DisabilityStatus,
    DisabilityType,
    EmergencyContactName,
    EmergencyContactPhone,
    EmergencyContactRelationship,
    SubmittedAt,
    ReviewedAt,
    ReviewedBy,
    Comments,
    RejectionReason,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
