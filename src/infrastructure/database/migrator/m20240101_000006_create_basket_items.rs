//! Create basket_items table

use sea_orm_migration::prelude::*;

use super::m20240101_000004_create_reservations::Reservations;
use super::m20240101_000005_create_baskets::Baskets;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BasketItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BasketItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BasketItems::BasketId).uuid().not_null())
                    .col(ColumnDef::new(BasketItems::ReservationId).uuid().not_null())
                    .col(
                        ColumnDef::new(BasketItems::PrestationLabel)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BasketItems::PricePerDay)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BasketItems::LineTotal)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BasketItems::StartDate).date().not_null())
                    .col(ColumnDef::new(BasketItems::EndDate).date().not_null())
                    .col(
                        ColumnDef::new(BasketItems::AddedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_basket_items_basket")
                            .from(BasketItems::Table, BasketItems::BasketId)
                            .to(Baskets::Table, Baskets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_basket_items_reservation")
                            .from(BasketItems::Table, BasketItems::ReservationId)
                            .to(Reservations::Table, Reservations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_basket_items_basket_reservation")
                    .table(BasketItems::Table)
                    .col(BasketItems::BasketId)
                    .col(BasketItems::ReservationId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BasketItems::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum BasketItems {
    Table,
    Id,
    BasketId,
    ReservationId,
    PrestationLabel,
    PricePerDay,
    LineTotal,
    StartDate,
    EndDate,
    AddedAt,
}
