//! Booking service
//!
//! Creates and cancels reservations. Capacity is taken on the planning
//! first, then the reservation is stored and attached to the owner's open
//! basket. A failure after capacity was taken gives it back.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use validator::{Validate, ValidationError};

use super::planning::PlanningService;
use super::prestation::PrestationService;
use crate::domain::basket::BasketRepository;
use crate::domain::{
    AnimalId, Basket, BasketItem, BasketStatus, DomainError, DomainResult, Prestation,
    PrestationId, RepositoryProvider, Reservation, ReservationId, ReservationStatus, UserId,
};
use crate::shared::time::day_count;

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_date_range"))]
pub struct CreateReservationCommand {
    pub user_id: UserId,
    pub animal_id: AnimalId,
    pub prestation_id: PrestationId,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
}

fn validate_date_range(cmd: &CreateReservationCommand) -> Result<(), ValidationError> {
    if cmd.date_start > cmd.date_end {
        let mut err = ValidationError::new("date_range");
        err.message = Some("date_start must not be after date_end".into());
        return Err(err);
    }
    Ok(())
}

pub struct BookingService {
    repos: Arc<dyn RepositoryProvider>,
    planning: Arc<PlanningService>,
    prestations: Arc<PrestationService>,
}

impl BookingService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        planning: Arc<PlanningService>,
        prestations: Arc<PrestationService>,
    ) -> Self {
        Self {
            repos,
            planning,
            prestations,
        }
    }

    /// Book a stay. On success the reservation is `Pending`, holds one unit
    /// per day and sits in the user's open basket.
    pub async fn create_reservation(&self, cmd: CreateReservationCommand) -> DomainResult<Reservation> {
        cmd.validate()?;

        let prestation = self.prestations.get(cmd.prestation_id).await?;
        if !prestation.is_active {
            return Err(DomainError::Validation(format!(
                "prestation {} is not bookable",
                prestation.id
            )));
        }
        let planning = self.planning.for_prestation(prestation.id).await?;

        if let Some(basket) = self.repos.baskets().find_open_for_user(cmd.user_id).await? {
            if basket.status != BasketStatus::Active {
                return Err(DomainError::Conflict(format!(
                    "basket {} is awaiting payment",
                    basket.id
                )));
            }
        }

        let days = day_count(cmd.date_start, cmd.date_end);
        let reservation = Reservation::new(
            cmd.user_id,
            cmd.animal_id,
            prestation.id,
            planning.id,
            cmd.date_start,
            cmd.date_end,
            prestation.price_for(days),
        )?;

        self.planning
            .reserve_slots(
                planning.id,
                cmd.date_start,
                cmd.date_end,
                Reservation::UNITS_PER_DAY,
            )
            .await?;

        if let Err(e) = self.repos.reservations().save(reservation.clone()).await {
            error!(reservation_id = %reservation.id, error = %e, "Failed to store reservation, releasing capacity");
            self.release(&reservation).await;
            return Err(e);
        }

        if let Err(e) = self.attach_to_basket(&reservation, &prestation).await {
            warn!(reservation_id = %reservation.id, error = %e, "Failed to add reservation to basket, cancelling");
            self.cancel_orphan(&reservation).await;
            return Err(e);
        }

        info!(
            reservation_id = %reservation.id,
            user_id = %reservation.user_id,
            prestation_id = %reservation.prestation_id,
            start = %reservation.start_date,
            end = %reservation.end_date,
            total = reservation.total_price,
            "🐾 Reservation created"
        );
        Ok(reservation)
    }

    /// Cancel a reservation on behalf of its owner. Cancelling an already
    /// cancelled reservation is a no-op.
    pub async fn cancel_reservation(
        &self,
        user_id: UserId,
        reservation_id: ReservationId,
    ) -> DomainResult<Reservation> {
        let mut reservation = self.get(reservation_id).await?;
        if reservation.user_id != user_id {
            return Err(DomainError::Forbidden(format!(
                "reservation {reservation_id} belongs to another user"
            )));
        }

        let previous = reservation.status;
        if !reservation.cancel()? {
            return Ok(reservation);
        }
        let claimed = self
            .repos
            .reservations()
            .transition(reservation_id, previous, reservation.status)
            .await?;
        if !claimed {
            let current = self.get(reservation_id).await?;
            if current.status == ReservationStatus::Cancelled {
                return Ok(current);
            }
            return Err(DomainError::Conflict(format!(
                "reservation {reservation_id} is now {}",
                current.status
            )));
        }
        self.planning.release_claimed(&reservation, previous).await?;
        self.drop_from_basket(user_id, reservation_id).await?;

        info!(%reservation_id, %user_id, "🐾 Reservation cancelled");
        Ok(reservation)
    }

    pub async fn get(&self, id: ReservationId) -> DomainResult<Reservation> {
        self.repos
            .reservations()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Reservation", id))
    }

    pub async fn reservations_for_user(&self, user_id: UserId) -> DomainResult<Vec<Reservation>> {
        self.repos.reservations().find_for_user(user_id).await
    }

    async fn attach_to_basket(&self, reservation: &Reservation, prestation: &Prestation) -> DomainResult<()> {
        let item = BasketItem::snapshot(reservation, prestation);
        let baskets = self.repos.baskets();

        if let Some(mut basket) = baskets.find_open_for_user(reservation.user_id).await? {
            basket.add_item(item)?;
            return store_active(baskets, basket).await;
        }

        let mut basket = Basket::new(reservation.user_id);
        basket.add_item(item.clone())?;
        match baskets.save(basket).await {
            // Another request opened the basket first
            Err(DomainError::Conflict(_)) => {
                let mut basket = baskets
                    .find_open_for_user(reservation.user_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("Basket", reservation.user_id))?;
                basket.add_item(item)?;
                store_active(baskets, basket).await
            }
            other => other,
        }
    }

    /// Take a cancelled reservation out of its owner's open basket. A basket
    /// that changes status underneath is reloaded and tried again.
    async fn drop_from_basket(&self, user_id: UserId, reservation_id: ReservationId) -> DomainResult<()> {
        const ATTEMPTS: usize = 3;
        for _ in 0..ATTEMPTS {
            let Some(mut basket) = self.repos.baskets().find_open_for_user(user_id).await? else {
                return Ok(());
            };
            if !basket.contains(reservation_id) {
                return Ok(());
            }
            let status = basket.status;
            basket.remove_item(reservation_id)?;
            if self.repos.baskets().update_if_status(basket, status).await? {
                return Ok(());
            }
            debug!(%reservation_id, "Basket changed while removing item, retrying");
        }
        warn!(%reservation_id, %user_id, "Cancelled reservation left in basket");
        Ok(())
    }

    /// Cancel a reservation that never made it into a basket and give its
    /// capacity back, unless another flow already moved it.
    async fn cancel_orphan(&self, reservation: &Reservation) {
        let claimed = self
            .repos
            .reservations()
            .transition(reservation.id, ReservationStatus::Pending, ReservationStatus::Cancelled)
            .await;
        match claimed {
            Ok(true) => {
                let mut cancelled = reservation.clone();
                cancelled.status = ReservationStatus::Cancelled;
                if let Err(e) = self.planning.release_claimed(&cancelled, ReservationStatus::Pending).await {
                    error!(reservation_id = %reservation.id, error = %e, "Failed to release capacity");
                }
            }
            Ok(false) => debug!(reservation_id = %reservation.id, "Orphan reservation already settled"),
            Err(e) => {
                error!(reservation_id = %reservation.id, error = %e, "Failed to cancel orphan reservation")
            }
        }
    }

    async fn release(&self, reservation: &Reservation) {
        if let Err(e) = self.planning.release_reservation(reservation).await {
            error!(reservation_id = %reservation.id, error = %e, "Failed to release capacity");
        }
    }
}

/// Store a basket edited while `Active`. Losing to a concurrent checkout,
/// payment or expiry is a conflict.
async fn store_active(baskets: &dyn BasketRepository, basket: Basket) -> DomainResult<()> {
    let id = basket.id;
    if baskets.update_if_status(basket, BasketStatus::Active).await? {
        return Ok(());
    }
    Err(DomainError::Conflict(format!("basket {id} is no longer active")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cache::ReadCache;
    use crate::application::services::test_support::{d, seed_planning, seed_prestation};
    use crate::domain::PlanningId;
    use crate::infrastructure::storage::InMemoryRepositoryProvider;

    struct Fixture {
        repos: Arc<dyn RepositoryProvider>,
        booking: BookingService,
        planning: Arc<PlanningService>,
        planning_id: PlanningId,
        prestation_id: PrestationId,
    }

    async fn fixture(max_capacity: u32) -> Fixture {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let prestation = seed_prestation(repos.as_ref(), 2_500).await;
        let planning = seed_planning(repos.as_ref(), &prestation, 10, max_capacity).await;
        let planning_service = Arc::new(PlanningService::new(repos.clone()));
        let prestations = Arc::new(PrestationService::new(repos.clone(), ReadCache::shared()));
        Fixture {
            booking: BookingService::new(repos.clone(), planning_service.clone(), prestations),
            repos,
            planning: planning_service,
            planning_id: planning.id,
            prestation_id: prestation.id,
        }
    }

    fn command(f: &Fixture, user_id: UserId, start: u32, end: u32) -> CreateReservationCommand {
        CreateReservationCommand {
            user_id,
            animal_id: AnimalId::new(),
            prestation_id: f.prestation_id,
            date_start: d(start),
            date_end: d(end),
        }
    }

    #[tokio::test]
    async fn booking_takes_capacity_and_fills_basket() {
        let f = fixture(2).await;
        let user = UserId::new();

        let reservation = f.booking.create_reservation(command(&f, user, 1, 3)).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.total_price, 7_500);

        let planning = f.planning.get(f.planning_id).await.unwrap();
        assert_eq!(planning.slot(d(2)).unwrap().available_capacity(), 1);
        assert_eq!(planning.slot(d(4)).unwrap().available_capacity(), 2);

        let basket = f.repos.baskets().find_open_for_user(user).await.unwrap().unwrap();
        assert!(basket.contains(reservation.id));
        assert_eq!(basket.total_amount, 7_500);

        let second = f.booking.create_reservation(command(&f, user, 5, 5)).await.unwrap();
        let basket = f.repos.baskets().find_open_for_user(user).await.unwrap().unwrap();
        assert_eq!(basket.item_count, 2);
        assert!(basket.contains(second.id));
    }

    #[tokio::test]
    async fn full_day_rejects_booking_without_side_effects() {
        let f = fixture(1).await;
        f.booking
            .create_reservation(command(&f, UserId::new(), 2, 2))
            .await
            .unwrap();

        let late = UserId::new();
        let err = f
            .booking
            .create_reservation(command(&f, late, 1, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientCapacity { .. }));

        let planning = f.planning.get(f.planning_id).await.unwrap();
        assert_eq!(planning.slot(d(1)).unwrap().reserved_capacity(), 0);
        assert_eq!(planning.slot(d(3)).unwrap().reserved_capacity(), 0);
        assert!(f.booking.reservations_for_user(late).await.unwrap().is_empty());
        assert!(f.repos.baskets().find_open_for_user(late).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reversed_range_is_a_validation_error() {
        let f = fixture(2).await;
        let err = f
            .booking
            .create_reservation(command(&f, UserId::new(), 4, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn checked_out_basket_blocks_new_bookings() {
        let f = fixture(2).await;
        let user = UserId::new();
        f.booking.create_reservation(command(&f, user, 1, 1)).await.unwrap();

        let mut basket = f.repos.baskets().find_open_for_user(user).await.unwrap().unwrap();
        basket.checkout("pay_42").unwrap();
        assert!(f
            .repos
            .baskets()
            .update_if_status(basket, BasketStatus::Active)
            .await
            .unwrap());

        let err = f
            .booking
            .create_reservation(command(&f, user, 2, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        let planning = f.planning.get(f.planning_id).await.unwrap();
        assert_eq!(planning.slot(d(2)).unwrap().reserved_capacity(), 0);
    }

    #[tokio::test]
    async fn cancel_releases_and_is_idempotent() {
        let f = fixture(2).await;
        let user = UserId::new();
        let reservation = f.booking.create_reservation(command(&f, user, 1, 2)).await.unwrap();

        let cancelled = f.booking.cancel_reservation(user, reservation.id).await.unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        let planning = f.planning.get(f.planning_id).await.unwrap();
        assert_eq!(planning.total_reserved(), 0);
        let basket = f.repos.baskets().find_open_for_user(user).await.unwrap().unwrap();
        assert_eq!(basket.item_count, 0);

        let version = planning.version;
        f.booking.cancel_reservation(user, reservation.id).await.unwrap();
        assert_eq!(f.planning.get(f.planning_id).await.unwrap().version, version);
    }

    #[tokio::test]
    async fn only_owner_may_cancel() {
        let f = fixture(2).await;
        let owner = UserId::new();
        let reservation = f.booking.create_reservation(command(&f, owner, 1, 1)).await.unwrap();

        let err = f
            .booking
            .cancel_reservation(UserId::new(), reservation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert_eq!(
            f.booking.get(reservation.id).await.unwrap().status,
            ReservationStatus::Pending
        );
    }

    #[tokio::test]
    async fn inactive_prestation_is_not_bookable() {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let mut prestation = seed_prestation(repos.as_ref(), 1_000).await;
        seed_planning(repos.as_ref(), &prestation, 3, 1).await;
        prestation.is_active = false;
        repos.prestations().update(prestation.clone()).await.unwrap();

        let planning = Arc::new(PlanningService::new(repos.clone()));
        let prestations = Arc::new(PrestationService::new(repos.clone(), ReadCache::shared()));
        let booking = BookingService::new(repos, planning, prestations);
        let err = booking
            .create_reservation(CreateReservationCommand {
                user_id: UserId::new(),
                animal_id: AnimalId::new(),
                prestation_id: prestation.id,
                date_start: d(1),
                date_end: d(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
