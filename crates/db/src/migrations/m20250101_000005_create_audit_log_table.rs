//! Create audit log table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditLog::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditLog::UserId).string_len(32))
                    .col(ColumnDef::new(AuditLog::Action).string_len(64).not_null())
                    .col(ColumnDef::new(AuditLog::ResourceType).string_len(64).not_null())
                    .col(ColumnDef::new(AuditLog::ResourceId).string_len(64))
                    .col(ColumnDef::new(AuditLog::Description).text().not_null())
                    .col(ColumnDef::new(AuditLog::IpAddress).string_len(64))
                    .col(ColumnDef::new(AuditLog::UserAgent).string_len(512))
                    .col(ColumnDef::new(AuditLog::PreviousValues).json_binary())
                    .col(ColumnDef::new(AuditLog::NewValues).json_binary())
                    .col(
                        ColumnDef::new(AuditLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_audit_log_user")
                            .from(AuditLog::Table, AuditLog::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (resource_type, resource_id) for per-resource history
        manager
            .create_index(
                Index::create()
                    .name("idx_audit_log_resource")
                    .table(AuditLog::Table)
                    .col(AuditLog::ResourceType)
                    .col(AuditLog::ResourceId)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (for pagination)
        manager
            .create_index(
                Index::create()
                    .name("idx_audit_log_created_at")
                    .table(AuditLog::Table)
                    .col(AuditLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLog::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AuditLog {
    Table,
    Id,
    UserId,
    Action,
    ResourceType,
    ResourceId,
    Description,
    IpAddress,
    UserAgent,
    PreviousValues,
    NewValues,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
