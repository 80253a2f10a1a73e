//! Migration to create the calendar_connections table.
//!
//! Stores one row per linked calendar account, keyed by the natural
//! (user_id, provider, account_email) tuple.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CalendarConnections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CalendarConnections::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CalendarConnections::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(CalendarConnections::Provider)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CalendarConnections::AccountEmail)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CalendarConnections::AccountName).text().null())
                    .col(
                        ColumnDef::new(CalendarConnections::AccessToken)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CalendarConnections::RefreshToken).text().null())
                    .col(
                        ColumnDef::new(CalendarConnections::TokenExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CalendarConnections::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(CalendarConnections::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CalendarConnections::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Composite unique index enforcing one row per linked account
        manager
            .create_index(
                Index::create()
                    .name("idx_calendar_connections_user_provider_email")
                    .table(CalendarConnections::Table)
                    .col(CalendarConnections::UserId)
                    .col(CalendarConnections::Provider)
                    .col(CalendarConnections::AccountEmail)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index on user_id for per-user listing queries
        manager
            .create_index(
                Index::create()
                    .name("idx_calendar_connections_user_id")
                    .table(CalendarConnections::Table)
                    .col(CalendarConnections::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_calendar_connections_user_provider_email")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_calendar_connections_user_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(CalendarConnections::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CalendarConnections {
    Table,
    Id,
    UserId,
    Provider,
    AccountEmail,
    AccountName,
    AccessToken,
    RefreshToken,
    TokenExpiresAt,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
