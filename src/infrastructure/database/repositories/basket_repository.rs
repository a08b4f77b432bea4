//! SeaORM implementation of BasketRepository
//!
//! Items are stored in `basket_items` and rewritten with the basket row in
//! one transaction. The one-open-basket-per-user rule is backed by a partial
//! unique index. Status changes are conditional on the stored status, and
//! payment flips the basket and its reservations in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::reservation_repository::set_status_if;
use super::{db_err, to_i32};
use crate::domain::basket::{Basket, BasketItem, BasketRepository, BasketStatus};
use crate::domain::reservation::ReservationStatus;
use crate::domain::{BasketId, DomainError, DomainResult, ReservationId, UserId};
use crate::infrastructure::database::entities::{basket, basket_item};

const OPEN_STATUSES: [BasketStatus; 2] = [BasketStatus::Active, BasketStatus::PendingPayment];

pub struct SeaOrmBasketRepository {
    db: DatabaseConnection,
}

impl SeaOrmBasketRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn open_status_filter() -> sea_orm::sea_query::SimpleExpr {
    basket::Column::Status.is_in(OPEN_STATUSES.iter().map(|s| s.as_str()))
}

fn item_to_domain(m: basket_item::Model) -> BasketItem {
    BasketItem {
        reservation_id: ReservationId::from_uuid(m.reservation_id),
        prestation_label: m.prestation_label,
        price_per_day: m.price_per_day,
        line_total: m.line_total,
        start_date: m.start_date,
        end_date: m.end_date,
        added_at: m.added_at,
    }
}

fn model_to_domain(m: basket::Model, items: Vec<basket_item::Model>) -> DomainResult<Basket> {
    Ok(Basket::restore(
        BasketId::from_uuid(m.id),
        UserId::from_uuid(m.user_id),
        m.status.parse()?,
        items.into_iter().map(item_to_domain).collect(),
        m.payment_reference,
        m.paid_at,
        m.expired_at,
        m.created_at,
        m.updated_at,
    ))
}

fn domain_to_active(b: &Basket) -> DomainResult<basket::ActiveModel> {
    Ok(basket::ActiveModel {
        id: Set(b.id.as_uuid()),
        user_id: Set(b.user_id.as_uuid()),
        status: Set(b.status.as_str().to_string()),
        total_amount: Set(b.total_amount),
        item_count: Set(to_i32(b.item_count, "item_count")?),
        payment_reference: Set(b.payment_reference.clone()),
        paid_at: Set(b.paid_at),
        expired_at: Set(b.expired_at),
        created_at: Set(b.created_at),
        updated_at: Set(b.updated_at),
    })
}

async fn load<C: ConnectionTrait>(db: &C, model: basket::Model) -> DomainResult<Basket> {
    let items = basket_item::Entity::find()
        .filter(basket_item::Column::BasketId.eq(model.id))
        .order_by_asc(basket_item::Column::Id)
        .all(db)
        .await
        .map_err(db_err)?;
    model_to_domain(model, items)
}

async fn replace_items<C: ConnectionTrait>(db: &C, basket_id: Uuid, items: &[BasketItem]) -> DomainResult<()> {
    basket_item::Entity::delete_many()
        .filter(basket_item::Column::BasketId.eq(basket_id))
        .exec(db)
        .await
        .map_err(db_err)?;

    if items.is_empty() {
        return Ok(());
    }

    let models = items.iter().map(|item| basket_item::ActiveModel {
        id: NotSet,
        basket_id: Set(basket_id),
        reservation_id: Set(item.reservation_id.as_uuid()),
        prestation_label: Set(item.prestation_label.clone()),
        price_per_day: Set(item.price_per_day),
        line_total: Set(item.line_total),
        start_date: Set(item.start_date),
        end_date: Set(item.end_date),
        added_at: Set(item.added_at),
    });
    basket_item::Entity::insert_many(models)
        .exec(db)
        .await
        .map_err(db_err)?;
    Ok(())
}

// ── BasketRepository impl ───────────────────────────────────────

#[async_trait]
impl BasketRepository for SeaOrmBasketRepository {
    async fn save(&self, b: Basket) -> DomainResult<()> {
        debug!("Saving basket: {} for user {}", b.id, b.user_id);

        let txn = self.db.begin().await.map_err(db_err)?;

        if b.is_open() {
            let open = basket::Entity::find()
                .filter(basket::Column::UserId.eq(b.user_id.as_uuid()))
                .filter(open_status_filter())
                .one(&txn)
                .await
                .map_err(db_err)?;
            if let Some(open) = open {
                return Err(DomainError::Conflict(format!(
                    "user {} already has open basket {}",
                    b.user_id, open.id
                )));
            }
        }

        domain_to_active(&b)?.insert(&txn).await.map_err(db_err)?;
        replace_items(&txn, b.id.as_uuid(), b.items()).await?;

        txn.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: BasketId) -> DomainResult<Option<Basket>> {
        let model = basket::Entity::find_by_id(id.as_uuid())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let Some(model) = model else {
            return Ok(None);
        };
        load(&self.db, model).await.map(Some)
    }

    async fn find_open_for_user(&self, user_id: UserId) -> DomainResult<Option<Basket>> {
        let model = basket::Entity::find()
            .filter(basket::Column::UserId.eq(user_id.as_uuid()))
            .filter(open_status_filter())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let Some(model) = model else {
            return Ok(None);
        };
        load(&self.db, model).await.map(Some)
    }

    async fn update_if_status(&self, b: Basket, expected: BasketStatus) -> DomainResult<bool> {
        debug!("Updating basket: {} {} -> {}", b.id, expected, b.status);

        let txn = self.db.begin().await.map_err(db_err)?;

        let result = basket::Entity::update_many()
            .set(domain_to_active(&b)?)
            .filter(basket::Column::Id.eq(b.id.as_uuid()))
            .filter(basket::Column::Status.eq(expected.as_str()))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected != 1 {
            let exists = basket::Entity::find_by_id(b.id.as_uuid())
                .one(&txn)
                .await
                .map_err(db_err)?
                .is_some();
            txn.rollback().await.map_err(db_err)?;
            if !exists {
                return Err(DomainError::not_found("Basket", b.id));
            }
            debug!("Basket {} is no longer {}, left as is", b.id, expected);
            return Ok(false);
        }

        replace_items(&txn, b.id.as_uuid(), b.items()).await?;

        txn.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn mark_paid(&self, b: &Basket) -> DomainResult<bool> {
        debug!("Marking basket {} paid", b.id);

        let txn = self.db.begin().await.map_err(db_err)?;

        let result = basket::Entity::update_many()
            .col_expr(basket::Column::Status, Expr::value(BasketStatus::Paid.as_str()))
            .col_expr(basket::Column::PaidAt, Expr::value(b.paid_at.unwrap_or_else(Utc::now)))
            .col_expr(basket::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(basket::Column::Id.eq(b.id.as_uuid()))
            .filter(basket::Column::Status.eq(BasketStatus::PendingPayment.as_str()))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected != 1 {
            txn.rollback().await.map_err(db_err)?;
            return Ok(false);
        }

        for id in b.reservation_ids() {
            let changed = set_status_if(
                &txn,
                id,
                ReservationStatus::Pending,
                ReservationStatus::Validated,
            )
            .await
            .map_err(db_err)?;
            if changed != 1 {
                debug!("Reservation {} is no longer pending, basket {} stays unpaid", id, b.id);
                txn.rollback().await.map_err(db_err)?;
                return Ok(false);
            }
        }

        txn.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn find_open_created_before(
        &self,
        created_before: DateTime<Utc>,
    ) -> DomainResult<Vec<Basket>> {
        let models = basket::Entity::find()
            .filter(open_status_filter())
            .filter(basket::Column::CreatedAt.lt(created_before))
            .order_by_asc(basket::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut result = Vec::with_capacity(models.len());
        for model in models {
            result.push(load(&self.db, model).await?);
        }
        Ok(result)
    }
}
