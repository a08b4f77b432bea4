//! Basket entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "baskets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    /// Active, PendingPayment, Paid, Expired, Cancelled
    pub status: String,

    /// Denormalised from the items for reporting queries
    pub total_amount: i64,
    pub item_count: i32,

    #[sea_orm(nullable)]
    pub payment_reference: Option<String>,

    #[sea_orm(nullable)]
    pub paid_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub expired_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::basket_item::Entity")]
    BasketItem,
}

impl Related<super::basket_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BasketItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
