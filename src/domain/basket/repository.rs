//! Basket repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Basket, BasketStatus};
use crate::domain::ids::{BasketId, UserId};
use crate::domain::DomainResult;

#[async_trait]
pub trait BasketRepository: Send + Sync {
    /// Insert a new basket. Fails with `Conflict` if the user already has
    /// an open basket.
    async fn save(&self, basket: Basket) -> DomainResult<()>;

    async fn find_by_id(&self, id: BasketId) -> DomainResult<Option<Basket>>;

    /// The user's open (`Active` or `PendingPayment`) basket
    async fn find_open_for_user(&self, user_id: UserId) -> DomainResult<Option<Basket>>;

    /// Replace the stored basket and its items if its stored status is
    /// still `expected`. Returns `false` without writing otherwise.
    async fn update_if_status(&self, basket: Basket, expected: BasketStatus) -> DomainResult<bool>;

    /// Store a basket already moved to `Paid` and move every reservation it
    /// holds from `Pending` to `Validated`, as one write. Nothing changes and
    /// `false` is returned unless the stored basket is `PendingPayment` and
    /// all of its reservations are `Pending`.
    async fn mark_paid(&self, basket: &Basket) -> DomainResult<bool>;

    /// Open baskets created strictly before `created_before`
    async fn find_open_created_before(
        &self,
        created_before: DateTime<Utc>,
    ) -> DomainResult<Vec<Basket>>;
}
