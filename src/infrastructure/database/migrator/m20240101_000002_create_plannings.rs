//! Create plannings table
//!
//! One capacity calendar per prestation. `version` backs the optimistic
//! concurrency check on updates.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_prestations::Prestations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Plannings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Plannings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Plannings::PrestationId).uuid().not_null())
                    .col(ColumnDef::new(Plannings::Label).string().not_null())
                    .col(ColumnDef::new(Plannings::Description).text())
                    .col(
                        ColumnDef::new(Plannings::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Plannings::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Plannings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Plannings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_plannings_prestation")
                            .from(Plannings::Table, Plannings::PrestationId)
                            .to(Prestations::Table, Prestations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_plannings_prestation")
                    .table(Plannings::Table)
                    .col(Plannings::PrestationId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Plannings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Plannings {
    Table,
    Id,
    PrestationId,
    Label,
    Description,
    IsActive,
    Version,
    CreatedAt,
    UpdatedAt,
}
