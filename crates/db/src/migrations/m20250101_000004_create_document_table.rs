//! Create document table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Document::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Document::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Document::ApplicationId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Document::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Document::DocumentType).string_len(20).not_null())
                    .col(ColumnDef::new(Document::Institution).string_len(256))
                    .col(ColumnDef::new(Document::StorageKey).string_len(512).not_null())
                    .col(
                        ColumnDef::new(Document::OriginalFileName)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Document::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(Document::MimeType).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Document::Verified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Document::VerifiedBy).string_len(32))
                    .col(ColumnDef::new(Document::VerifiedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Document::Comments).text())
                    .col(
                        ColumnDef::new(Document::UploadedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Document::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Document::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_document_application")
                            .from(Document::Table, Document::ApplicationId)
                            .to(Application::Table, Application::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_document_verifier")
                            .from(Document::Table, Document::VerifiedBy)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_document_application_id")
                    .table(Document::Table)
                    .col(Document::ApplicationId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Document::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Document {
    Table,
    Id,
    ApplicationId,
    Name,
    DocumentType,
    Institution,
    StorageKey,
    OriginalFileName,
    FileSize,
    MimeType,
    Verified,
    VerifiedBy,
    VerifiedAt,
    Comments,
    UploadedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Application {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
