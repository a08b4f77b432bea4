//! Reservation repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Reservation, ReservationStatus};
use crate::domain::ids::{ReservationId, UserId};
use crate::domain::DomainResult;

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Save a new reservation
    async fn save(&self, reservation: Reservation) -> DomainResult<()>;

    /// Find reservation by ID
    async fn find_by_id(&self, id: ReservationId) -> DomainResult<Option<Reservation>>;

    /// Move the stored reservation from `from` to `to`. Returns `false`
    /// without writing if its stored status is no longer `from`, so of two
    /// concurrent callers exactly one sees `true`.
    async fn transition(
        &self,
        id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> DomainResult<bool>;

    /// All reservations of a user, newest first
    async fn find_for_user(&self, user_id: UserId) -> DomainResult<Vec<Reservation>>;

    /// Pending reservations created strictly before `created_before`
    async fn find_pending_created_before(
        &self,
        created_before: DateTime<Utc>,
    ) -> DomainResult<Vec<Reservation>>;

    /// Find all reservations (any status)
    async fn find_all(&self) -> DomainResult<Vec<Reservation>>;
}
