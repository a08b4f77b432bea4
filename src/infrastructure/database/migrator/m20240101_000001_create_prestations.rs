//! Create prestations table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Prestations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Prestations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Prestations::Label).string().not_null())
                    .col(ColumnDef::new(Prestations::Description).text())
                    .col(ColumnDef::new(Prestations::Category).string().not_null())
                    .col(ColumnDef::new(Prestations::Species).string().not_null())
                    .col(
                        ColumnDef::new(Prestations::PricePerDay)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Prestations::DurationMinutes)
                            .integer()
                            .not_null()
                            .default(1440),
                    )
                    .col(
                        ColumnDef::new(Prestations::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Prestations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Prestations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_prestations_category")
                    .table(Prestations::Table)
                    .col(Prestations::Category)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Prestations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Prestations {
    Table,
    Id,
    Label,
    Description,
    Category,
    Species,
    PricePerDay,
    DurationMinutes,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
