//! SeaORM implementation of ReservationRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

use super::db_err;
use crate::domain::reservation::{Reservation, ReservationRepository, ReservationStatus};
use crate::domain::{
    AnimalId, DomainError, DomainResult, PlanningId, PrestationId, ReservationId, UserId,
};
use crate::infrastructure::database::entities::reservation;

pub struct SeaOrmReservationRepository {
    db: DatabaseConnection,
}

impl SeaOrmReservationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: reservation::Model) -> DomainResult<Reservation> {
    Ok(Reservation {
        id: ReservationId::from_uuid(m.id),
        user_id: UserId::from_uuid(m.user_id),
        animal_id: AnimalId::from_uuid(m.animal_id),
        prestation_id: PrestationId::from_uuid(m.prestation_id),
        planning_id: PlanningId::from_uuid(m.planning_id),
        start_date: m.start_date,
        end_date: m.end_date,
        status: m.status.parse()?,
        total_price: m.total_price,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn domain_to_active(r: &Reservation) -> reservation::ActiveModel {
    reservation::ActiveModel {
        id: Set(r.id.as_uuid()),
        user_id: Set(r.user_id.as_uuid()),
        animal_id: Set(r.animal_id.as_uuid()),
        prestation_id: Set(r.prestation_id.as_uuid()),
        planning_id: Set(r.planning_id.as_uuid()),
        start_date: Set(r.start_date),
        end_date: Set(r.end_date),
        status: Set(r.status.as_str().to_string()),
        total_price: Set(r.total_price),
        created_at: Set(r.created_at),
        updated_at: Set(r.updated_at),
    }
}

/// Conditional status write. Returns the number of rows changed, 0 when the
/// stored status is not `from` (or the row is missing).
pub(super) async fn set_status_if<C: ConnectionTrait>(
    conn: &C,
    id: ReservationId,
    from: ReservationStatus,
    to: ReservationStatus,
) -> Result<u64, DbErr> {
    let result = reservation::Entity::update_many()
        .col_expr(reservation::Column::Status, Expr::value(to.as_str()))
        .col_expr(reservation::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(reservation::Column::Id.eq(id.as_uuid()))
        .filter(reservation::Column::Status.eq(from.as_str()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

fn models_to_domain(models: Vec<reservation::Model>) -> DomainResult<Vec<Reservation>> {
    models.into_iter().map(model_to_domain).collect()
}

// ── ReservationRepository impl ──────────────────────────────────

#[async_trait]
impl ReservationRepository for SeaOrmReservationRepository {
    async fn save(&self, r: Reservation) -> DomainResult<()> {
        debug!("Saving reservation: {}", r.id);
        domain_to_active(&r).insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: ReservationId) -> DomainResult<Option<Reservation>> {
        let model = reservation::Entity::find_by_id(id.as_uuid())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        model.map(model_to_domain).transpose()
    }

    async fn transition(
        &self,
        id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> DomainResult<bool> {
        let changed = set_status_if(&self.db, id, from, to).await.map_err(db_err)?;
        if changed == 1 {
            debug!("Reservation {} moved {} -> {}", id, from, to);
            return Ok(true);
        }

        let exists = reservation::Entity::find_by_id(id.as_uuid())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_some();
        if !exists {
            return Err(DomainError::not_found("Reservation", id));
        }
        debug!("Reservation {} is no longer {}, left as is", id, from);
        Ok(false)
    }

    async fn find_for_user(&self, user_id: UserId) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::UserId.eq(user_id.as_uuid()))
            .order_by_desc(reservation::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_pending_created_before(
        &self,
        created_before: DateTime<Utc>,
    ) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::Pending.as_str()))
            .filter(reservation::Column::CreatedAt.lt(created_before))
            .order_by_asc(reservation::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_all(&self) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .order_by_desc(reservation::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }
}
