//! Create baskets table
//!
//! A user has at most one open (Active or PendingPayment) basket, enforced
//! by a partial unique index. SQLite and PostgreSQL both support it.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Baskets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Baskets::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Baskets::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Baskets::Status)
                            .string()
                            .not_null()
                            .default("Active"),
                    )
                    .col(
                        ColumnDef::new(Baskets::TotalAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Baskets::ItemCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Baskets::PaymentReference).string())
                    .col(ColumnDef::new(Baskets::PaidAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Baskets::ExpiredAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Baskets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Baskets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_baskets_user_status")
                    .table(Baskets::Table)
                    .col(Baskets::UserId)
                    .col(Baskets::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_baskets_status_created")
                    .table(Baskets::Table)
                    .col(Baskets::Status)
                    .col(Baskets::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_baskets_one_open_per_user \
                 ON baskets (user_id) WHERE status IN ('Active', 'PendingPayment')",
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Baskets::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Baskets {
    Table,
    Id,
    UserId,
    Status,
    TotalAmount,
    ItemCount,
    PaymentReference,
    PaidAt,
    ExpiredAt,
    CreatedAt,
    UpdatedAt,
}
