//! Create user table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(User::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(User::FirstName).string_len(128).not_null())
                    .col(ColumnDef::new(User::LastName).string_len(128).not_null())
                    .col(ColumnDef::new(User::Email).string_len(256).not_null())
                    .col(ColumnDef::new(User::PasswordHash).string_len(256).not_null())
                    .col(ColumnDef::new(User::Phone).string_len(32))
                    .col(ColumnDef::new(User::Gender).string_len(32))
                    .col(ColumnDef::new(User::DateOfBirth).date())
                    .col(ColumnDef::new(User::Nationality).string_len(128))
                    .col(
                        ColumnDef::new(User::SettlementSite)
                            .string_len(32)
                            .not_null()
                            .default("None"),
                    )
                    .col(ColumnDef::new(User::RefugeeId).string_len(64))
                    .col(ColumnDef::new(User::Address).string_len(256))
                    .col(ColumnDef::new(User::City).string_len(128))
                    .col(ColumnDef::new(User::State).string_len(128))
                    .col(ColumnDef::new(User::Country).string_len(128))
                    .col(ColumnDef::new(User::PostalCode).string_len(32))
                    .col(
                        ColumnDef::new(User::PreferredLanguage)
                            .string_len(32)
                            .not_null()
                            .default("english"),
                    )
                    .col(
                        ColumnDef::new(User::Roles)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[\"applicant\"]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(User::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(User::IsVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(User::ResetPasswordToken).string_len(256))
                    .col(ColumnDef::new(User::ResetPasswordExpiresAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(User::LastLoginAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(User::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(User::UpdatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(User::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Unique index: email (stored lower-cased)
        manager
            .create_index(
                Index::create()
                    .name("idx_user_email")
                    .table(User::Table)
                    .col(User::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: settlement_site (admin filtering and stats)
        manager
            .create_index(
                Index::create()
                    .name("idx_user_settlement_site")
                    .table(User::Table)
                    .col(User::SettlementSite)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum User {
    Table,
    Id,
    FirstName,
    LastName,
    Email,
    PasswordHash,
    Phone,
    Gender,
    DateOfBirth,
    Nationality,
    SettlementSite,
    RefugeeId,
    Address,
    City,
    State,
    Country,
    PostalCode,
    PreferredLanguage,
    Roles,
    IsActive,
    IsVerified,
    ResetPasswordToken,
    ResetPasswordExpiresAt,
    LastLoginAt,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
