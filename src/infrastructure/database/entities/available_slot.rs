//! Available slot entity: capacity of one planning on one calendar day

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "available_slots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub planning_id: Uuid,

    /// Unique per planning
    pub date: Date,

    pub max_capacity: i32,
    pub reserved_capacity: i32,
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
