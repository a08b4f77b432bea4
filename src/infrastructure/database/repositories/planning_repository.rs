//! SeaORM implementation of PlanningRepository
//!
//! A planning row and its slot rows are written in one transaction. Updates
//! are conditional on the stored `version`.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{db_err, to_i32, to_u32};
use crate::domain::planning::{AvailableSlot, Planning, PlanningRepository};
use crate::domain::{DomainError, DomainResult, PlanningId, PrestationId};
use crate::infrastructure::database::entities::{available_slot, planning};

pub struct SeaOrmPlanningRepository {
    db: DatabaseConnection,
}

impl SeaOrmPlanningRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn slot_to_domain(m: available_slot::Model) -> DomainResult<AvailableSlot> {
    AvailableSlot::restore(
        m.date,
        to_u32(m.max_capacity, "max_capacity")?,
        to_u32(m.reserved_capacity, "reserved_capacity")?,
    )
}

fn model_to_domain(m: planning::Model, slots: Vec<available_slot::Model>) -> DomainResult<Planning> {
    let slots = slots
        .into_iter()
        .map(slot_to_domain)
        .collect::<DomainResult<Vec<_>>>()?;
    Planning::restore(
        PlanningId::from_uuid(m.id),
        PrestationId::from_uuid(m.prestation_id),
        m.label,
        m.description,
        m.is_active,
        slots,
        m.version,
        m.created_at,
        m.updated_at,
    )
}

async fn load_slots<C: ConnectionTrait>(
    db: &C,
    planning_id: Uuid,
) -> DomainResult<Vec<available_slot::Model>> {
    available_slot::Entity::find()
        .filter(available_slot::Column::PlanningId.eq(planning_id))
        .order_by_asc(available_slot::Column::Date)
        .all(db)
        .await
        .map_err(db_err)
}

async fn load<C: ConnectionTrait>(db: &C, model: planning::Model) -> DomainResult<Planning> {
    let slots = load_slots(db, model.id).await?;
    model_to_domain(model, slots)
}

async fn replace_slots<C: ConnectionTrait>(db: &C, planning: &Planning) -> DomainResult<()> {
    let planning_id = planning.id.as_uuid();
    available_slot::Entity::delete_many()
        .filter(available_slot::Column::PlanningId.eq(planning_id))
        .exec(db)
        .await
        .map_err(db_err)?;

    if planning.slots().is_empty() {
        return Ok(());
    }

    let mut models = Vec::with_capacity(planning.slots().len());
    for slot in planning.slots() {
        models.push(available_slot::ActiveModel {
            id: NotSet,
            planning_id: Set(planning_id),
            date: Set(slot.date()),
            max_capacity: Set(to_i32(slot.max_capacity(), "max_capacity")?),
            reserved_capacity: Set(to_i32(slot.reserved_capacity(), "reserved_capacity")?),
        });
    }
    available_slot::Entity::insert_many(models)
        .exec(db)
        .await
        .map_err(db_err)?;
    Ok(())
}

// ── PlanningRepository impl ─────────────────────────────────────

#[async_trait]
impl PlanningRepository for SeaOrmPlanningRepository {
    async fn save(&self, p: Planning) -> DomainResult<()> {
        debug!("Saving planning: {}", p.id);

        let txn = self.db.begin().await.map_err(db_err)?;

        let existing = planning::Entity::find_by_id(p.id.as_uuid())
            .one(&txn)
            .await
            .map_err(db_err)?;
        if existing.is_some() {
            return Err(DomainError::Conflict(format!(
                "planning {} already exists",
                p.id
            )));
        }

        let model = planning::ActiveModel {
            id: Set(p.id.as_uuid()),
            prestation_id: Set(p.prestation_id.as_uuid()),
            label: Set(p.label.clone()),
            description: Set(p.description.clone()),
            is_active: Set(p.is_active),
            version: Set(p.version),
            created_at: Set(p.created_at),
            updated_at: Set(p.updated_at),
        };
        model.insert(&txn).await.map_err(db_err)?;
        replace_slots(&txn, &p).await?;

        txn.commit().await.map_err(db_err)?;
        info!("Planning saved: {} ({} slots)", p.id, p.slots().len());
        Ok(())
    }

    async fn find_by_id(&self, id: PlanningId) -> DomainResult<Option<Planning>> {
        let model = planning::Entity::find_by_id(id.as_uuid())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let Some(model) = model else {
            return Ok(None);
        };
        load(&self.db, model).await.map(Some)
    }

    async fn find_active_for_prestation(
        &self,
        prestation_id: PrestationId,
    ) -> DomainResult<Option<Planning>> {
        let model = planning::Entity::find()
            .filter(planning::Column::PrestationId.eq(prestation_id.as_uuid()))
            .filter(planning::Column::IsActive.eq(true))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let Some(model) = model else {
            return Ok(None);
        };
        load(&self.db, model).await.map(Some)
    }

    async fn find_all(&self) -> DomainResult<Vec<Planning>> {
        let models = planning::Entity::find()
            .order_by_asc(planning::Column::Label)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut result = Vec::with_capacity(models.len());
        for model in models {
            result.push(load(&self.db, model).await?);
        }
        Ok(result)
    }

    async fn update(&self, p: Planning) -> DomainResult<i32> {
        let id = p.id.as_uuid();
        let next_version = p.version + 1;
        debug!("Updating planning: {} (version {} -> {})", p.id, p.version, next_version);

        let txn = self.db.begin().await.map_err(db_err)?;

        let result = planning::Entity::update_many()
            .col_expr(planning::Column::Label, Expr::value(p.label.clone()))
            .col_expr(planning::Column::Description, Expr::value(p.description.clone()))
            .col_expr(planning::Column::IsActive, Expr::value(p.is_active))
            .col_expr(planning::Column::Version, Expr::value(next_version))
            .col_expr(planning::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(planning::Column::Id.eq(id))
            .filter(planning::Column::Version.eq(p.version))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            txn.rollback().await.map_err(db_err)?;
            let exists = planning::Entity::find_by_id(id)
                .one(&self.db)
                .await
                .map_err(db_err)?
                .is_some();
            return Err(if exists {
                DomainError::ConcurrentModification(format!(
                    "planning {} changed since version {} was loaded",
                    p.id, p.version
                ))
            } else {
                DomainError::not_found("Planning", p.id)
            });
        }

        replace_slots(&txn, &p).await?;
        txn.commit().await.map_err(db_err)?;
        Ok(next_version)
    }

    async fn delete(&self, id: PlanningId) -> DomainResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        available_slot::Entity::delete_many()
            .filter(available_slot::Column::PlanningId.eq(id.as_uuid()))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        let result = planning::Entity::delete_by_id(id.as_uuid())
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(DomainError::not_found("Planning", id));
        }

        txn.commit().await.map_err(db_err)?;
        info!("Planning deleted: {}", id);
        Ok(())
    }
}
