//! Migration to create the config_entries table.
//!
//! Each row holds one JSON value addressed by `(scope, scope_id, field)`.
//! Global settings use an empty `scope_id`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConfigEntries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ConfigEntries::Scope).string_len(16).not_null())
                    .col(ColumnDef::new(ConfigEntries::ScopeId).string_len(64).not_null())
                    .col(ColumnDef::new(ConfigEntries::Field).string_len(128).not_null())
                    .col(ColumnDef::new(ConfigEntries::Value).text().not_null())
                    .col(
                        ColumnDef::new(ConfigEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(ConfigEntries::Scope)
                            .col(ConfigEntries::ScopeId)
                            .col(ConfigEntries::Field),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_config_entries_scope_field")
                    .table(ConfigEntries::Table)
                    .col(ConfigEntries::Scope)
                    .col(ConfigEntries::Field)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConfigEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ConfigEntries {
    Table,
    Scope,
    ScopeId,
    Field,
    Value,
    UpdatedAt,
}
