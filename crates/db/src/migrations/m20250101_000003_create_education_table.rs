//! Create education table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Education::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Education::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Education::ApplicationId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Education::InstitutionName)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Education::InstitutionType).string_len(20))
                    .col(ColumnDef::new(Education::Country).string_len(128))
                    .col(ColumnDef::new(Education::City).string_len(128))
                    .col(ColumnDef::new(Education::Degree).string_len(256))
                    .col(ColumnDef::new(Education::FieldOfStudy).string_len(256))
                    .col(ColumnDef::new(Education::StartDate).date())
                    .col(ColumnDef::new(Education::EndDate).date())
                    .col(
                        ColumnDef::new(Education::IsCurrentlyStudying)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Education::Grade).string_len(64))
                    .col(ColumnDef::new(Education::Description).text())
                    .col(
                        ColumnDef::new(Education::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Education::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_education_application")
                            .from(Education::Table, Education::ApplicationId)
                            .to(Application::Table, Application::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_education_application_id")
                    .table(Education::Table)
                    .col(Education::ApplicationId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Education::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Education {
    Table,
    Id,
    ApplicationId,
    InstitutionName,
    InstitutionType,
    Country,
    City,
    Degree,
    FieldOfStudy,
    StartDate,
    EndDate,
    IsCurrentlyStudying,
    Grade,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Application {
    Table,
    Id,
}
