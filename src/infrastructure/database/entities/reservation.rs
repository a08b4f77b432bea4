//! Reservation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,
    pub animal_id: Uuid,
    pub prestation_id: Uuid,
    pub planning_id: Uuid,

    /// Inclusive range
    pub start_date: Date,
    pub end_date: Date,

    /// Reservation status: Pending, Validated, InProgress, Completed, Cancelled, Expired
    pub status: String,

    /// Minor currency units
    pub total_price: i64,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::planning::Entity",
        from = "Column::PlanningId",
        to = "super::planning::Column::Id"
    )]
    Planning,
}

impl Related<super::planning::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Planning.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
