//! Planning entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "plannings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub prestation_id: Uuid,
    pub label: String,

    #[sea_orm(nullable)]
    pub description: Option<String>,

    pub is_active: bool,

    /// Optimistic concurrency counter, bumped on every update
    pub version: i32,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::prestation::Entity",
        from = "Column::PrestationId",
        to = "super::prestation::Column::Id"
    )]
    Prestation,
    #[sea_orm(has_many = "super::available_slot::Entity")]
    AvailableSlot,
}

impl Related<super::prestation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prestation.def()
    }
}

impl Related<super::available_slot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AvailableSlot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
