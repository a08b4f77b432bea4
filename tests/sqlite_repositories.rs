//! SeaORM repositories and services against a migrated in-memory SQLite
//! database.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use pet_boarding::application::services::{
    CreatePlanningCommand, CreatePrestationCommand, CreateReservationCommand, OpenSlotsCommand,
};
use pet_boarding::domain::{
    AnimalId, Basket, BasketItem, BasketStatus, DomainError, Planning, Prestation, PrestationCategory, PrestationId,
    RepositoryProvider, Reservation, ReservationId, ReservationStatus, Species, UserId,
};
use pet_boarding::{
    init_database, run_migrations, AppConfig, DatabaseConfig, SeaOrmRepositoryProvider, Services,
};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
}

async fn setup() -> (Arc<dyn RepositoryProvider>, Services) {
    let db = init_database(&DatabaseConfig::in_memory()).await.unwrap();
    run_migrations(&db).await.unwrap();
    let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db));
    let services = Services::new(repos.clone(), &AppConfig::default());
    (repos, services)
}

/// Active kennel prestation with a planning of `capacity` on July 1–10
async fn kennel(services: &Services, capacity: u32) -> (Planning, Prestation) {
    let prestation = services
        .prestations
        .create(CreatePrestationCommand {
            label: "Kennel".into(),
            description: None,
            category: PrestationCategory::Boarding,
            species: Species::Dog,
            price_per_day: 3_000,
            duration_minutes: 1_440,
        })
        .await
        .unwrap()
        .value;
    let planning = services
        .planning
        .create_planning(CreatePlanningCommand {
            prestation_id: prestation.id,
            label: "July".into(),
            description: None,
        })
        .await
        .unwrap();
    services
        .planning
        .open_slots(OpenSlotsCommand {
            planning_id: planning.id,
            date_start: d(1),
            date_end: d(10),
            max_capacity: capacity,
        })
        .await
        .unwrap();
    let planning = services.planning.get(planning.id).await.unwrap();
    (planning, prestation)
}

fn booking(user_id: UserId, prestation_id: PrestationId, start: u32, end: u32) -> CreateReservationCommand {
    CreateReservationCommand {
        user_id,
        animal_id: AnimalId::new(),
        prestation_id,
        date_start: d(start),
        date_end: d(end),
    }
}

#[tokio::test]
async fn planning_slots_round_trip_through_sqlite() {
    let (repos, services) = setup().await;
    let (planning, _) = kennel(&services, 3).await;

    assert_eq!(planning.slots().len(), 10);
    assert_eq!(planning.version, 1);
    let slot = planning.slot(d(4)).unwrap();
    assert_eq!(slot.max_capacity(), 3);
    assert_eq!(slot.reserved_capacity(), 0);

    let all = repos.plannings().find_all().await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn stale_planning_version_is_rejected() {
    let (repos, services) = setup().await;
    let (planning, _) = kennel(&services, 2).await;

    let mut first = repos.plannings().find_by_id(planning.id).await.unwrap().unwrap();
    let mut second = first.clone();

    first.reserve_slots(d(1), d(2), 1).unwrap();
    let version = repos.plannings().update(first).await.unwrap();
    assert_eq!(version, planning.version + 1);

    second.reserve_slots(d(1), d(2), 2).unwrap();
    let err = repos.plannings().update(second).await.unwrap_err();
    assert!(matches!(err, DomainError::ConcurrentModification(_)));

    let stored = repos.plannings().find_by_id(planning.id).await.unwrap().unwrap();
    assert_eq!(stored.slot(d(1)).unwrap().reserved_capacity(), 1);
}

#[tokio::test]
async fn second_open_basket_for_a_user_conflicts() {
    let (repos, _) = setup().await;
    let user_id = UserId::new();

    repos.baskets().save(Basket::new(user_id)).await.unwrap();
    let err = repos.baskets().save(Basket::new(user_id)).await.unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));

    repos.baskets().save(Basket::new(UserId::new())).await.unwrap();
}

#[tokio::test]
async fn pending_query_only_returns_old_pending_reservations() {
    let (repos, services) = setup().await;
    let (planning, prestation) = kennel(&services, 5).await;
    let user_id = UserId::new();

    let mut old = Reservation::new(
        user_id,
        AnimalId::new(),
        prestation.id,
        planning.id,
        d(1),
        d(2),
        6_000,
    )
    .unwrap();
    old.created_at = Utc::now() - Duration::hours(1);
    let mut paid = old.clone();
    paid.id = ReservationId::new();
    paid.validate().unwrap();
    let fresh = Reservation::new(
        user_id,
        AnimalId::new(),
        prestation.id,
        planning.id,
        d(3),
        d(3),
        3_000,
    )
    .unwrap();

    for r in [old.clone(), paid, fresh] {
        repos.reservations().save(r).await.unwrap();
    }

    let cutoff = Utc::now() - Duration::minutes(20);
    let found = repos.reservations().find_pending_created_before(cutoff).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, old.id);
    assert_eq!(repos.reservations().find_for_user(user_id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn booking_then_expiry_restores_capacity() {
    let (repos, services) = setup().await;
    let (planning, prestation) = kennel(&services, 1).await;
    let user_id = UserId::new();

    let reservation = services
        .booking
        .create_reservation(booking(user_id, prestation.id, 2, 4))
        .await
        .unwrap();
    assert_eq!(reservation.total_price, 9_000);

    let basket = services.baskets.current_basket(user_id).await.unwrap().unwrap();
    assert!(basket.contains(reservation.id));
    assert_eq!(basket.total_amount, 9_000);

    let full = services
        .booking
        .create_reservation(booking(UserId::new(), prestation.id, 3, 3))
        .await
        .unwrap_err();
    assert!(matches!(full, DomainError::InsufficientCapacity { .. }));

    let later = Utc::now() + Duration::minutes(21);
    let report = services.expiry.process_expired_reservations(later).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);

    let expired = services.booking.get(reservation.id).await.unwrap();
    assert_eq!(expired.status, ReservationStatus::Expired);
    let stored = repos.plannings().find_by_id(planning.id).await.unwrap().unwrap();
    assert_eq!(stored.total_reserved(), 0);

    // Nothing left to do on the next tick
    let again = services.expiry.process_expired_reservations(later).await.unwrap();
    assert_eq!(again.processed, 0);
}

#[tokio::test]
async fn paid_basket_validates_its_reservations() {
    let (_, services) = setup().await;
    let (_, prestation) = kennel(&services, 2).await;
    let user_id = UserId::new();

    let first = services
        .booking
        .create_reservation(booking(user_id, prestation.id, 1, 1))
        .await
        .unwrap();
    let second = services
        .booking
        .create_reservation(booking(user_id, prestation.id, 5, 6))
        .await
        .unwrap();

    let basket = services.baskets.checkout(user_id, "PAY-42").await.unwrap();
    assert_eq!(basket.item_count, 2);

    let blocked = services
        .booking
        .create_reservation(booking(user_id, prestation.id, 8, 8))
        .await
        .unwrap_err();
    assert!(matches!(blocked, DomainError::Conflict(_)));

    let paid = services.baskets.confirm_payment(basket.id).await.unwrap();
    assert!(paid.paid_at.is_some());
    for id in [first.id, second.id] {
        let r = services.booking.get(id).await.unwrap();
        assert_eq!(r.status, ReservationStatus::Validated);
    }

    // Validated reservations are not touched by expiry
    let later = Utc::now() + Duration::hours(2);
    let report = services.expiry.process_expired_reservations(later).await.unwrap();
    assert_eq!(report.processed, 0);
    let baskets = services.expiry.process_expired_baskets(later).await.unwrap();
    assert_eq!(baskets.processed, 0);
}

#[tokio::test]
async fn stale_basket_expires_with_its_reservations() {
    let (repos, services) = setup().await;
    let (planning, prestation) = kennel(&services, 1).await;
    let user_id = UserId::new();

    let reservation = services
        .booking
        .create_reservation(booking(user_id, prestation.id, 7, 9))
        .await
        .unwrap();

    let later = Utc::now() + Duration::minutes(31);
    let report = services.expiry.process_expired_baskets(later).await.unwrap();
    assert_eq!(report.processed, 1);

    assert!(services.baskets.current_basket(user_id).await.unwrap().is_none());
    let r = services.booking.get(reservation.id).await.unwrap();
    assert_eq!(r.status, ReservationStatus::Expired);
    let stored = repos.plannings().find_by_id(planning.id).await.unwrap().unwrap();
    assert_eq!(stored.slot(d(8)).unwrap().available_capacity(), 1);

    // The user can book again with a fresh basket
    services
        .booking
        .create_reservation(booking(user_id, prestation.id, 7, 9))
        .await
        .unwrap();
}

#[tokio::test]
async fn conditional_writes_only_apply_to_the_expected_status() {
    let (repos, services) = setup().await;
    let (planning, prestation) = kennel(&services, 5).await;
    let user_id = UserId::new();

    let reservation = Reservation::new(
        user_id,
        AnimalId::new(),
        prestation.id,
        planning.id,
        d(1),
        d(1),
        3_000,
    )
    .unwrap();
    repos.reservations().save(reservation.clone()).await.unwrap();

    let expired = repos
        .reservations()
        .transition(reservation.id, ReservationStatus::Pending, ReservationStatus::Expired)
        .await
        .unwrap();
    assert!(expired);
    let again = repos
        .reservations()
        .transition(reservation.id, ReservationStatus::Pending, ReservationStatus::Expired)
        .await
        .unwrap();
    assert!(!again);
    let missing = repos
        .reservations()
        .transition(ReservationId::new(), ReservationStatus::Pending, ReservationStatus::Expired)
        .await
        .unwrap_err();
    assert!(matches!(missing, DomainError::NotFound { .. }));

    let basket = Basket::new(user_id);
    repos.baskets().save(basket.clone()).await.unwrap();
    let mut abandoned = basket;
    abandoned.abandon().unwrap();
    assert!(repos
        .baskets()
        .update_if_status(abandoned.clone(), BasketStatus::Active)
        .await
        .unwrap());
    assert!(!repos
        .baskets()
        .update_if_status(abandoned.clone(), BasketStatus::Active)
        .await
        .unwrap());
    let stored = repos.baskets().find_by_id(abandoned.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BasketStatus::Cancelled);
}

#[tokio::test]
async fn payment_is_all_or_nothing() {
    let (repos, services) = setup().await;
    let (planning, prestation) = kennel(&services, 5).await;
    let user_id = UserId::new();

    let mut basket = Basket::new(user_id);
    let mut ids = Vec::new();
    for day in [2, 3] {
        let r = Reservation::new(
            user_id,
            AnimalId::new(),
            prestation.id,
            planning.id,
            d(day),
            d(day),
            3_000,
        )
        .unwrap();
        repos.reservations().save(r.clone()).await.unwrap();
        basket.add_item(BasketItem::snapshot(&r, &prestation)).unwrap();
        ids.push(r.id);
    }
    basket.checkout("PAY-9").unwrap();
    repos.baskets().save(basket.clone()).await.unwrap();
    basket.confirm_payment(Utc::now()).unwrap();

    repos
        .reservations()
        .transition(ids[1], ReservationStatus::Pending, ReservationStatus::Expired)
        .await
        .unwrap();
    assert!(!repos.baskets().mark_paid(&basket).await.unwrap());
    let first = repos.reservations().find_by_id(ids[0]).await.unwrap().unwrap();
    assert_eq!(first.status, ReservationStatus::Pending);
    let stored = repos.baskets().find_by_id(basket.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BasketStatus::PendingPayment);

    repos
        .reservations()
        .transition(ids[1], ReservationStatus::Expired, ReservationStatus::Pending)
        .await
        .unwrap();
    assert!(repos.baskets().mark_paid(&basket).await.unwrap());
    for id in &ids {
        let r = repos.reservations().find_by_id(*id).await.unwrap().unwrap();
        assert_eq!(r.status, ReservationStatus::Validated);
    }
    let stored = repos.baskets().find_by_id(basket.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BasketStatus::Paid);
    assert!(stored.paid_at.is_some());
    assert!(!repos.baskets().mark_paid(&basket).await.unwrap());
}
