//! Expiry of unpaid reservations and baskets
//!
//! [`ExpiryService`] runs one pass over the overdue entities. The background
//! tasks below tick it on an interval until shutdown.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::planning::PlanningService;
use crate::domain::basket::DEFAULT_BASKET_TTL_MINUTES;
use crate::domain::reservation::pending_payment_ttl;
use crate::domain::{Basket, DomainResult, RepositoryProvider, Reservation};
use crate::shared::shutdown::ShutdownSignal;

/// Outcome of one expiry pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryReport {
    /// Entities moved to `Expired` by this pass
    pub processed: usize,
    /// Entities that could not be fully processed
    pub failed: usize,
}

pub struct ExpiryService {
    repos: Arc<dyn RepositoryProvider>,
    planning: Arc<PlanningService>,
    basket_ttl: Duration,
}

impl ExpiryService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, planning: Arc<PlanningService>) -> Self {
        Self {
            repos,
            planning,
            basket_ttl: Duration::minutes(DEFAULT_BASKET_TTL_MINUTES),
        }
    }

    pub fn with_basket_ttl(mut self, ttl: Duration) -> Self {
        self.basket_ttl = ttl;
        self
    }

    /// Expire `Pending` reservations created before the payment window and
    /// release their capacity.
    pub async fn process_expired_reservations(&self, now: DateTime<Utc>) -> DomainResult<ExpiryReport> {
        let cutoff = now - pending_payment_ttl();
        let overdue = self.repos.reservations().find_pending_created_before(cutoff).await?;
        let mut report = ExpiryReport::default();

        for reservation in overdue {
            if !reservation.is_payment_overdue(now) {
                continue;
            }
            let reservation_id = reservation.id;
            match self.expire_reservation(reservation).await {
                Ok(true) => report.processed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(%reservation_id, error = %e, "Failed to expire reservation");
                    report.failed += 1;
                }
            }
        }

        record("boarding_reservations_expired_total", &report);
        if report.processed > 0 || report.failed > 0 {
            info!(
                processed = report.processed,
                failed = report.failed,
                "⏰ Expired unpaid reservations"
            );
        }
        Ok(report)
    }

    /// Expire open baskets older than the basket TTL, together with the
    /// reservations they still hold.
    pub async fn process_expired_baskets(&self, now: DateTime<Utc>) -> DomainResult<ExpiryReport> {
        let cutoff = now - self.basket_ttl;
        let stale = self.repos.baskets().find_open_created_before(cutoff).await?;
        let mut report = ExpiryReport::default();

        for basket in stale {
            if !basket.is_stale(self.basket_ttl, now) {
                continue;
            }
            let basket_id = basket.id;
            match self.expire_basket(basket, now).await {
                Ok(true) => report.processed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(%basket_id, error = %e, "Failed to expire basket");
                    report.failed += 1;
                }
            }
        }

        record("boarding_baskets_expired_total", &report);
        if report.processed > 0 || report.failed > 0 {
            info!(
                processed = report.processed,
                failed = report.failed,
                "⏰ Expired unpaid baskets"
            );
        }
        Ok(report)
    }

    /// Claim a `Pending` reservation as `Expired`, then give back its
    /// capacity. Returns `false` when another flow changed it first.
    async fn expire_reservation(&self, mut reservation: Reservation) -> DomainResult<bool> {
        let previous = reservation.status;
        if !reservation.expire() {
            return Ok(false);
        }
        let claimed = self
            .repos
            .reservations()
            .transition(reservation.id, previous, reservation.status)
            .await?;
        if !claimed {
            debug!(reservation_id = %reservation.id, "Reservation changed meanwhile, not expired");
            return Ok(false);
        }

        let released = self.planning.release_claimed(&reservation, previous).await?;
        debug!(
            reservation_id = %reservation.id,
            released = released.released.len(),
            skipped = released.skipped.len(),
            "Reservation expired"
        );
        Ok(true)
    }

    /// Claim an open basket as `Expired`, then expire the reservations it
    /// still holds. Every item is attempted; the first failure is returned.
    async fn expire_basket(&self, mut basket: Basket, now: DateTime<Utc>) -> DomainResult<bool> {
        let previous = basket.status;
        if !basket.expire(now) {
            return Ok(false);
        }
        if !self.repos.baskets().update_if_status(basket.clone(), previous).await? {
            debug!(basket_id = %basket.id, "Basket changed meanwhile, not expired");
            return Ok(false);
        }

        let mut first_error = None;
        for id in basket.reservation_ids() {
            let outcome = match self.repos.reservations().find_by_id(id).await {
                Ok(Some(reservation)) => self.expire_reservation(reservation).await.map(|_| ()),
                Ok(None) => {
                    warn!(basket_id = %basket.id, reservation_id = %id, "Basket item without reservation");
                    continue;
                }
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                warn!(basket_id = %basket.id, reservation_id = %id, error = %e, "Basket item not expired");
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        debug!(basket_id = %basket.id, items = basket.item_count, "Basket expired");
        Ok(true)
    }
}

fn record(counter: &'static str, report: &ExpiryReport) {
    metrics::counter!(counter).increment(report.processed as u64);
    if report.failed > 0 {
        metrics::counter!("boarding_expiry_failures_total").increment(report.failed as u64);
    }
}

/// Start the reservation expiry background task.
///
/// Every `check_interval_secs` expires `Pending` reservations older than the
/// payment window.
pub fn start_reservation_expiry_task(
    expiry: Arc<ExpiryService>,
    shutdown: ShutdownSignal,
    check_interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            check_interval = check_interval_secs,
            "⏰ Reservation expiry task started"
        );

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = expiry.process_expired_reservations(Utc::now()).await {
                        warn!(error = %e, "Reservation expiry check error");
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("⏰ Reservation expiry task shutting down");
                    break;
                }
            }
        }

        info!("⏰ Reservation expiry task stopped");
    })
}

/// Start the basket expiry background task.
pub fn start_basket_expiry_task(
    expiry: Arc<ExpiryService>,
    shutdown: ShutdownSignal,
    check_interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            check_interval = check_interval_secs,
            "🧺 Basket expiry task started"
        );

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = expiry.process_expired_baskets(Utc::now()).await {
                        warn!(error = %e, "Basket expiry check error");
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("🧺 Basket expiry task shutting down");
                    break;
                }
            }
        }

        info!("🧺 Basket expiry task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{d, seed_planning, seed_prestation, SlowStore};
    use crate::domain::{
        AnimalId, BasketItem, BasketStatus, Planning, PlanningId, Prestation, ReservationStatus,
        UserId,
    };
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use crate::shared::retry::RetryConfig;

    struct Fixture {
        repos: Arc<dyn RepositoryProvider>,
        planning: Arc<PlanningService>,
        expiry: ExpiryService,
        prestation: Prestation,
        planning_id: PlanningId,
    }

    async fn fixture() -> Fixture {
        fixture_on(Arc::new(InMemoryRepositoryProvider::new()), RetryConfig::default()).await
    }

    async fn fixture_on(repos: Arc<dyn RepositoryProvider>, retry: RetryConfig) -> Fixture {
        let prestation = seed_prestation(repos.as_ref(), 1_500).await;
        let planning = seed_planning(repos.as_ref(), &prestation, 5, 3).await;
        let planning_service = Arc::new(PlanningService::new(repos.clone()).with_retry(retry));
        Fixture {
            expiry: ExpiryService::new(repos.clone(), planning_service.clone()),
            repos,
            planning: planning_service,
            prestation,
            planning_id: planning.id,
        }
    }

    /// Pending reservation holding capacity on June `start`–`end`
    async fn hold(f: &Fixture, user_id: UserId, start: u32, end: u32) -> Reservation {
        aged_hold(f, user_id, start, end, Duration::zero()).await
    }

    /// Like [`hold`], created `age` ago
    async fn aged_hold(f: &Fixture, user_id: UserId, start: u32, end: u32, age: Duration) -> Reservation {
        f.planning
            .reserve_slots(f.planning_id, d(start), d(end), Reservation::UNITS_PER_DAY)
            .await
            .unwrap();
        let mut reservation = Reservation::new(
            user_id,
            AnimalId::new(),
            f.prestation.id,
            f.planning_id,
            d(start),
            d(end),
            0,
        )
        .unwrap();
        reservation.created_at -= age;
        f.repos.reservations().save(reservation.clone()).await.unwrap();
        reservation
    }

    async fn planning(f: &Fixture) -> Planning {
        f.planning.get(f.planning_id).await.unwrap()
    }

    async fn reserved_on(f: &Fixture, day: u32) -> u32 {
        planning(f).await.slot(d(day)).unwrap().reserved_capacity()
    }


    #[tokio::test]
    async fn reserve_then_expire_restores_availability() {
        let f = fixture().await;
        let before = planning(&f).await.availability(d(1), d(5));
        let reservation = hold(&f, UserId::new(), 2, 4).await;

        // Inside the payment window nothing happens
        let report = f.expiry.process_expired_reservations(Utc::now()).await.unwrap();
        assert_eq!(report.processed, 0);

        let later = Utc::now() + Duration::minutes(21);
        let report = f.expiry.process_expired_reservations(later).await.unwrap();
        assert_eq!(report, ExpiryReport { processed: 1, failed: 0 });

        let stored = f.repos.reservations().find_by_id(reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Expired);
        assert_eq!(planning(&f).await.availability(d(1), d(5)), before);

        let again = f.expiry.process_expired_reservations(later).await.unwrap();
        assert_eq!(again.processed, 0);
    }

    #[tokio::test]
    async fn paid_reservations_are_left_alone() {
        let f = fixture().await;
        let reservation = hold(&f, UserId::new(), 1, 1).await;
        f.repos
            .reservations()
            .transition(reservation.id, ReservationStatus::Pending, ReservationStatus::Validated)
            .await
            .unwrap();

        let later = Utc::now() + Duration::hours(2);
        let report = f.expiry.process_expired_reservations(later).await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(planning(&f).await.total_reserved(), 1);
    }

    #[tokio::test]
    async fn basket_expiry_cascades_and_is_idempotent() {
        let f = fixture().await;
        let user = UserId::new();
        let a = hold(&f, user, 1, 2).await;
        let b = hold(&f, user, 3, 3).await;

        let mut basket = Basket::new(user);
        basket.add_item(BasketItem::snapshot(&a, &f.prestation)).unwrap();
        basket.add_item(BasketItem::snapshot(&b, &f.prestation)).unwrap();
        f.repos.baskets().save(basket.clone()).await.unwrap();
        assert_eq!(planning(&f).await.total_reserved(), 3);

        let later = Utc::now() + Duration::minutes(31);
        let report = f.expiry.process_expired_baskets(later).await.unwrap();
        assert_eq!(report.processed, 1);

        let stored = f.repos.baskets().find_by_id(basket.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BasketStatus::Expired);
        assert_eq!(stored.expired_at, Some(later));
        for id in [a.id, b.id] {
            let r = f.repos.reservations().find_by_id(id).await.unwrap().unwrap();
            assert_eq!(r.status, ReservationStatus::Expired);
        }
        assert_eq!(planning(&f).await.total_reserved(), 0);
        assert!(f.repos.baskets().find_open_for_user(user).await.unwrap().is_none());

        let again = f.expiry.process_expired_baskets(later).await.unwrap();
        assert_eq!(again.processed, 0);
        assert_eq!(planning(&f).await.total_reserved(), 0);
    }

    #[tokio::test]
    async fn basket_ttl_is_configurable() {
        let f = fixture().await;
        let expiry = ExpiryService::new(f.repos.clone(), f.planning.clone())
            .with_basket_ttl(Duration::minutes(5));
        f.repos.baskets().save(Basket::new(UserId::new())).await.unwrap();

        let soon = Utc::now() + Duration::minutes(6);
        assert_eq!(f.expiry.process_expired_baskets(soon).await.unwrap().processed, 0);
        assert_eq!(expiry.process_expired_baskets(soon).await.unwrap().processed, 1);
    }

    #[tokio::test]
    async fn reservation_already_released_by_basket_is_not_released_twice() {
        let f = fixture().await;
        let user = UserId::new();
        let reservation = hold(&f, user, 1, 1).await;
        let mut basket = Basket::new(user);
        basket
            .add_item(BasketItem::snapshot(&reservation, &f.prestation))
            .unwrap();
        f.repos.baskets().save(basket).await.unwrap();
        // A second booking holds the same day
        hold(&f, UserId::new(), 1, 1).await;

        let later = Utc::now() + Duration::minutes(31);
        f.expiry.process_expired_baskets(later).await.unwrap();
        f.expiry.process_expired_reservations(later).await.unwrap();

        // One release per hold
        assert_eq!(planning(&f).await.slot(d(1)).unwrap().reserved_capacity(), 0);
    }

    #[tokio::test]
    async fn background_task_stops_on_shutdown() {
        let f = fixture().await;
        let shutdown = ShutdownSignal::new();
        let handle = start_reservation_expiry_task(Arc::new(f.expiry), shutdown.clone(), 3600);
        shutdown.trigger();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_passes_release_each_hold_once() {
        let store = Arc::new(SlowStore::new(std::time::Duration::from_millis(50)));
        let f = fixture_on(store, RetryConfig::default()).await;
        aged_hold(&f, UserId::new(), 1, 1, Duration::minutes(30)).await;
        let live = hold(&f, UserId::new(), 1, 1).await;
        assert_eq!(reserved_on(&f, 1).await, 2);

        let now = Utc::now();
        let (a, b) = tokio::join!(
            f.expiry.process_expired_reservations(now),
            f.expiry.process_expired_reservations(now),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.processed + b.processed, 1);
        assert_eq!(a.failed + b.failed, 0);

        assert_eq!(reserved_on(&f, 1).await, 1);
        let stored = f.repos.reservations().find_by_id(live.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reservation_and_basket_passes_share_the_release() {
        let store = Arc::new(SlowStore::new(std::time::Duration::from_millis(50)));
        let f = fixture_on(store, RetryConfig::default()).await;
        let user = UserId::new();
        let overdue = aged_hold(&f, user, 2, 3, Duration::minutes(40)).await;
        let mut basket = Basket::new(user);
        basket.add_item(BasketItem::snapshot(&overdue, &f.prestation)).unwrap();
        basket.created_at = Utc::now() - Duration::minutes(40);
        f.repos.baskets().save(basket.clone()).await.unwrap();
        hold(&f, UserId::new(), 2, 2).await;
        assert_eq!(reserved_on(&f, 2).await, 2);

        let now = Utc::now();
        let (reservations, baskets) = tokio::join!(
            f.expiry.process_expired_reservations(now),
            f.expiry.process_expired_baskets(now),
        );
        assert_eq!(baskets.unwrap(), ExpiryReport { processed: 1, failed: 0 });
        assert_eq!(reservations.unwrap().failed, 0);

        assert_eq!(reserved_on(&f, 2).await, 1);
        assert_eq!(reserved_on(&f, 3).await, 0);
        let stored = f.repos.reservations().find_by_id(overdue.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Expired);
        let stored = f.repos.baskets().find_by_id(basket.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BasketStatus::Expired);
    }

    #[tokio::test]
    async fn failed_release_leaves_reservation_for_the_next_pass() {
        let store = Arc::new(SlowStore::new(std::time::Duration::ZERO));
        let single_attempt = RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        };
        let f = fixture_on(store.clone(), single_attempt).await;
        let reservation = hold(&f, UserId::new(), 2, 3).await;
        let later = Utc::now() + Duration::minutes(21);

        store.fail_planning_updates(true);
        let report = f.expiry.process_expired_reservations(later).await.unwrap();
        assert_eq!(report, ExpiryReport { processed: 0, failed: 1 });
        let stored = f.repos.reservations().find_by_id(reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Pending);
        assert_eq!(planning(&f).await.total_reserved(), 2);

        store.fail_planning_updates(false);
        let report = f.expiry.process_expired_reservations(later).await.unwrap();
        assert_eq!(report, ExpiryReport { processed: 1, failed: 0 });
        let stored = f.repos.reservations().find_by_id(reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Expired);
        assert_eq!(planning(&f).await.total_reserved(), 0);
    }
}
