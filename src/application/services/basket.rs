//! Basket workflow: checkout, payment confirmation and abandonment

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::booking::BookingService;
use super::planning::PlanningService;
use crate::domain::{
    Basket, BasketId, BasketStatus, DomainError, DomainResult, RepositoryProvider, Reservation,
    ReservationId, ReservationStatus, UserId,
};

pub struct BasketService {
    repos: Arc<dyn RepositoryProvider>,
    planning: Arc<PlanningService>,
    booking: Arc<BookingService>,
}

impl BasketService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        planning: Arc<PlanningService>,
        booking: Arc<BookingService>,
    ) -> Self {
        Self {
            repos,
            planning,
            booking,
        }
    }

    /// The user's open basket, created empty if there is none.
    pub async fn open_basket(&self, user_id: UserId) -> DomainResult<Basket> {
        if let Some(basket) = self.current_basket(user_id).await? {
            return Ok(basket);
        }
        let basket = Basket::new(user_id);
        match self.repos.baskets().save(basket.clone()).await {
            Ok(()) => {
                info!(basket_id = %basket.id, %user_id, "🧺 Basket opened");
                Ok(basket)
            }
            Err(DomainError::Conflict(_)) => self.require_open(user_id).await,
            Err(e) => Err(e),
        }
    }

    pub async fn current_basket(&self, user_id: UserId) -> DomainResult<Option<Basket>> {
        self.repos.baskets().find_open_for_user(user_id).await
    }

    pub async fn get(&self, id: BasketId) -> DomainResult<Basket> {
        self.repos
            .baskets()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Basket", id))
    }

    /// Take a reservation out of the basket. The reservation is cancelled
    /// and its capacity released.
    pub async fn remove_item(
        &self,
        user_id: UserId,
        reservation_id: ReservationId,
    ) -> DomainResult<Basket> {
        let basket = self.require_open(user_id).await?;
        if !basket.contains(reservation_id) {
            return Err(DomainError::NotFound {
                entity: "BasketItem",
                field: "reservation_id",
                value: reservation_id.to_string(),
            });
        }
        self.booking.cancel_reservation(user_id, reservation_id).await?;
        self.require_open(user_id).await
    }

    /// Freeze the basket for payment. Every item must still be pending.
    pub async fn checkout(
        &self,
        user_id: UserId,
        payment_reference: impl Into<String>,
    ) -> DomainResult<Basket> {
        let mut basket = self.require_open(user_id).await?;
        for reservation in self.reservations_of(&basket).await? {
            if reservation.status != ReservationStatus::Pending {
                return Err(DomainError::Conflict(format!(
                    "reservation {} is {} and cannot be paid",
                    reservation.id, reservation.status
                )));
            }
        }
        basket.checkout(payment_reference)?;
        if !self
            .repos
            .baskets()
            .update_if_status(basket.clone(), BasketStatus::Active)
            .await?
        {
            return Err(DomainError::Conflict(format!(
                "basket {} changed during checkout",
                basket.id
            )));
        }
        info!(
            basket_id = %basket.id,
            %user_id,
            total = basket.total_amount,
            items = basket.item_count,
            "🧺 Basket checked out"
        );
        Ok(basket)
    }

    /// Payment provider confirmed the basket. Every reservation becomes
    /// `Validated` in the same write as the basket. Fails without changes
    /// if the basket or a reservation is no longer pending, e.g. it expired
    /// while the payment was in flight.
    pub async fn confirm_payment(&self, basket_id: BasketId) -> DomainResult<Basket> {
        let mut basket = self.get(basket_id).await?;
        basket.confirm_payment(Utc::now())?;

        if !self.repos.baskets().mark_paid(&basket).await? {
            return Err(self.payment_conflict(basket_id).await);
        }

        info!(
            %basket_id,
            user_id = %basket.user_id,
            total = basket.total_amount,
            reference = basket.payment_reference.as_deref().unwrap_or_default(),
            "💳 Basket paid"
        );
        Ok(basket)
    }

    /// Owner gives up on the open basket. Its pending reservations are
    /// cancelled and their capacity released.
    pub async fn abandon(&self, user_id: UserId) -> DomainResult<Basket> {
        let mut basket = self.require_open(user_id).await?;
        let previous = basket.status;
        basket.abandon()?;
        if !self
            .repos
            .baskets()
            .update_if_status(basket.clone(), previous)
            .await?
        {
            return Err(DomainError::Conflict(format!(
                "basket {} changed while being abandoned",
                basket.id
            )));
        }

        for mut reservation in self.reservations_of(&basket).await? {
            if reservation.status != ReservationStatus::Pending {
                continue;
            }
            reservation.cancel()?;
            let claimed = self
                .repos
                .reservations()
                .transition(reservation.id, ReservationStatus::Pending, reservation.status)
                .await;
            match claimed {
                Ok(true) => {
                    if let Err(e) = self
                        .planning
                        .release_claimed(&reservation, ReservationStatus::Pending)
                        .await
                    {
                        warn!(reservation_id = %reservation.id, error = %e, "Failed to release capacity");
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(reservation_id = %reservation.id, error = %e, "Failed to cancel reservation")
                }
            }
        }

        info!(basket_id = %basket.id, %user_id, "🧺 Basket abandoned");
        Ok(basket)
    }

    /// Explain why a payment could not be recorded
    async fn payment_conflict(&self, basket_id: BasketId) -> DomainError {
        let basket = match self.get(basket_id).await {
            Ok(basket) => basket,
            Err(e) => return e,
        };
        if basket.status != BasketStatus::PendingPayment {
            return DomainError::Conflict(format!(
                "basket {basket_id} is {} and cannot be paid",
                basket.status
            ));
        }
        let reservations = match self.reservations_of(&basket).await {
            Ok(reservations) => reservations,
            Err(e) => return e,
        };
        match reservations
            .iter()
            .find(|r| r.status != ReservationStatus::Pending)
        {
            Some(stale) => DomainError::Conflict(format!(
                "reservation {} is {} and cannot be validated",
                stale.id, stale.status
            )),
            None => DomainError::Conflict(format!("basket {basket_id} changed during payment")),
        }
    }

    async fn require_open(&self, user_id: UserId) -> DomainResult<Basket> {
        self.current_basket(user_id).await?.ok_or_else(|| DomainError::NotFound {
            entity: "Basket",
            field: "user_id",
            value: user_id.to_string(),
        })
    }

    async fn reservations_of(&self, basket: &Basket) -> DomainResult<Vec<Reservation>> {
        let mut reservations = Vec::with_capacity(basket.items().len());
        for id in basket.reservation_ids() {
            let reservation = self
                .repos
                .reservations()
                .find_by_id(id)
                .await?
                .ok_or_else(|| DomainError::not_found("Reservation", id))?;
            reservations.push(reservation);
        }
        Ok(reservations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cache::ReadCache;
    use crate::application::services::booking::CreateReservationCommand;
    use crate::application::services::expiry::ExpiryService;
    use crate::application::services::prestation::PrestationService;
    use crate::application::services::test_support::{d, seed_planning, seed_prestation};
    use crate::domain::{AnimalId, PlanningId, PrestationId};
    use chrono::Duration;
    use crate::infrastructure::storage::InMemoryRepositoryProvider;

    struct Fixture {
        repos: Arc<dyn RepositoryProvider>,
        planning: Arc<PlanningService>,
        booking: Arc<BookingService>,
        baskets: BasketService,
        planning_id: PlanningId,
        prestation_id: PrestationId,
    }

    async fn fixture() -> Fixture {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let prestation = seed_prestation(repos.as_ref(), 2_000).await;
        let planning = seed_planning(repos.as_ref(), &prestation, 7, 2).await;
        let planning_service = Arc::new(PlanningService::new(repos.clone()));
        let prestations = Arc::new(PrestationService::new(repos.clone(), ReadCache::shared()));
        let booking = Arc::new(BookingService::new(
            repos.clone(),
            planning_service.clone(),
            prestations,
        ));
        Fixture {
            baskets: BasketService::new(repos.clone(), planning_service.clone(), booking.clone()),
            repos,
            planning: planning_service,
            booking,
            planning_id: planning.id,
            prestation_id: prestation.id,
        }
    }

    async fn book(f: &Fixture, user_id: UserId, start: u32, end: u32) -> Reservation {
        f.booking
            .create_reservation(CreateReservationCommand {
                user_id,
                animal_id: AnimalId::new(),
                prestation_id: f.prestation_id,
                date_start: d(start),
                date_end: d(end),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn open_basket_is_reused() {
        let f = fixture().await;
        let user = UserId::new();
        let first = f.baskets.open_basket(user).await.unwrap();
        let second = f.baskets.open_basket(user).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn checkout_and_payment_validate_reservations() {
        let f = fixture().await;
        let user = UserId::new();
        let a = book(&f, user, 1, 2).await;
        let b = book(&f, user, 4, 4).await;

        let basket = f.baskets.checkout(user, "pay_001").await.unwrap();
        assert_eq!(basket.status, BasketStatus::PendingPayment);
        assert_eq!(basket.total_amount, 6_000);

        let paid = f.baskets.confirm_payment(basket.id).await.unwrap();
        assert_eq!(paid.status, BasketStatus::Paid);
        assert!(paid.paid_at.is_some());
        for id in [a.id, b.id] {
            assert_eq!(
                f.booking.get(id).await.unwrap().status,
                ReservationStatus::Validated
            );
        }
        assert!(f.baskets.current_basket(user).await.unwrap().is_none());
        // Paid reservations keep their capacity
        assert_eq!(f.planning.get(f.planning_id).await.unwrap().total_reserved(), 3);
    }

    #[tokio::test]
    async fn empty_basket_cannot_be_checked_out() {
        let f = fixture().await;
        let user = UserId::new();
        f.baskets.open_basket(user).await.unwrap();
        let err = f.baskets.checkout(user, "pay_002").await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn checkout_rejects_expired_items() {
        let f = fixture().await;
        let user = UserId::new();
        let reservation = book(&f, user, 1, 1).await;

        f.repos
            .reservations()
            .transition(reservation.id, ReservationStatus::Pending, ReservationStatus::Expired)
            .await
            .unwrap();

        let err = f.baskets.checkout(user, "pay_003").await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        let basket = f.baskets.current_basket(user).await.unwrap().unwrap();
        assert_eq!(basket.status, BasketStatus::Active);
    }

    #[tokio::test]
    async fn payment_is_refused_when_a_reservation_expired_meanwhile() {
        let f = fixture().await;
        let user = UserId::new();
        let reservation = book(&f, user, 2, 3).await;
        let basket = f.baskets.checkout(user, "pay_004").await.unwrap();

        f.repos
            .reservations()
            .transition(reservation.id, ReservationStatus::Pending, ReservationStatus::Expired)
            .await
            .unwrap();

        let err = f.baskets.confirm_payment(basket.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(
            f.baskets.get(basket.id).await.unwrap().status,
            BasketStatus::PendingPayment
        );
    }

    #[tokio::test]
    async fn remove_item_cancels_the_reservation() {
        let f = fixture().await;
        let user = UserId::new();
        let keep = book(&f, user, 1, 1).await;
        let removed = book(&f, user, 2, 2).await;

        let basket = f.baskets.remove_item(user, removed.id).await.unwrap();
        assert_eq!(basket.item_count, 1);
        assert!(basket.contains(keep.id));
        assert_eq!(
            f.booking.get(removed.id).await.unwrap().status,
            ReservationStatus::Cancelled
        );
        let planning = f.planning.get(f.planning_id).await.unwrap();
        assert_eq!(planning.slot(d(2)).unwrap().reserved_capacity(), 0);

        let err = f.baskets.remove_item(user, removed.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn abandon_releases_capacity() {
        let f = fixture().await;
        let user = UserId::new();
        let reservation = book(&f, user, 1, 3).await;

        let basket = f.baskets.abandon(user).await.unwrap();
        assert_eq!(basket.status, BasketStatus::Cancelled);
        assert_eq!(
            f.booking.get(reservation.id).await.unwrap().status,
            ReservationStatus::Cancelled
        );
        assert_eq!(f.planning.get(f.planning_id).await.unwrap().total_reserved(), 0);
        assert!(f.baskets.current_basket(user).await.unwrap().is_none());
    }

    fn expiry(f: &Fixture) -> ExpiryService {
        ExpiryService::new(f.repos.clone(), f.planning.clone())
    }

    #[tokio::test]
    async fn expiry_before_payment_refuses_the_payment() {
        let f = fixture().await;
        let user = UserId::new();
        let reservation = book(&f, user, 1, 2).await;
        let basket = f.baskets.checkout(user, "pay_005").await.unwrap();

        let later = Utc::now() + Duration::minutes(21);
        let report = expiry(&f).process_expired_reservations(later).await.unwrap();
        assert_eq!(report.processed, 1);

        let err = f.baskets.confirm_payment(basket.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(
            f.booking.get(reservation.id).await.unwrap().status,
            ReservationStatus::Expired
        );
        assert_eq!(f.planning.get(f.planning_id).await.unwrap().total_reserved(), 0);
    }

    #[tokio::test]
    async fn payment_before_expiry_keeps_the_capacity() {
        let f = fixture().await;
        let user = UserId::new();
        let reservation = book(&f, user, 1, 2).await;
        let basket = f.baskets.checkout(user, "pay_006").await.unwrap();
        f.baskets.confirm_payment(basket.id).await.unwrap();

        let later = Utc::now() + Duration::hours(1);
        let expiry = expiry(&f);
        assert_eq!(expiry.process_expired_reservations(later).await.unwrap().processed, 0);
        assert_eq!(expiry.process_expired_baskets(later).await.unwrap().processed, 0);
        assert_eq!(
            f.booking.get(reservation.id).await.unwrap().status,
            ReservationStatus::Validated
        );
        assert_eq!(f.baskets.get(basket.id).await.unwrap().status, BasketStatus::Paid);
        assert_eq!(f.planning.get(f.planning_id).await.unwrap().total_reserved(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn payment_racing_expiry_has_one_outcome() {
        let f = fixture().await;
        let user = UserId::new();
        let first = book(&f, user, 1, 2).await;
        let second = book(&f, user, 4, 4).await;
        let basket = f.baskets.checkout(user, "pay_007").await.unwrap();

        let later = Utc::now() + Duration::minutes(31);
        let expiry = expiry(&f);
        let (paid, _, _) = tokio::join!(
            f.baskets.confirm_payment(basket.id),
            expiry.process_expired_baskets(later),
            expiry.process_expired_reservations(later),
        );
        // Settle whatever the racing passes left behind
        expiry.process_expired_baskets(later).await.unwrap();
        expiry.process_expired_reservations(later).await.unwrap();

        let statuses = [
            f.booking.get(first.id).await.unwrap().status,
            f.booking.get(second.id).await.unwrap().status,
        ];
        let stored = f.baskets.get(basket.id).await.unwrap();
        let reserved = f.planning.get(f.planning_id).await.unwrap().total_reserved();
        match paid {
            Ok(_) => {
                assert_eq!(stored.status, BasketStatus::Paid);
                assert_eq!(statuses, [ReservationStatus::Validated; 2]);
                assert_eq!(reserved, 3);
            }
            Err(e) => {
                assert!(matches!(e, DomainError::Conflict(_)), "{e}");
                assert_eq!(stored.status, BasketStatus::Expired);
                assert_eq!(statuses, [ReservationStatus::Expired; 2]);
                assert_eq!(reserved, 0);
            }
        }
    }
}
