//! Create available_slots table
//!
//! One row per planning and calendar day.

use sea_orm_migration::prelude::*;

use super::m20240101_000002_create_plannings::Plannings;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AvailableSlots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AvailableSlots::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AvailableSlots::PlanningId).uuid().not_null())
                    .col(ColumnDef::new(AvailableSlots::Date).date().not_null())
                    .col(
                        ColumnDef::new(AvailableSlots::MaxCapacity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AvailableSlots::ReservedCapacity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_available_slots_planning")
                            .from(AvailableSlots::Table, AvailableSlots::PlanningId)
                            .to(Plannings::Table, Plannings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_available_slots_planning_date")
                    .table(AvailableSlots::Table)
                    .col(AvailableSlots::PlanningId)
                    .col(AvailableSlots::Date)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AvailableSlots::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum AvailableSlots {
    Table,
    Id,
    PlanningId,
    Date,
    MaxCapacity,
    ReservedCapacity,
}
