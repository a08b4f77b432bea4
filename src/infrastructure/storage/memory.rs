//! In-memory repositories for development and testing
//!
//! Same contracts as the SeaORM repositories, including the planning
//! version check and the one-open-basket-per-user rule.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::basket::BasketRepository;
use crate::domain::planning::PlanningRepository;
use crate::domain::prestation::PrestationRepository;
use crate::domain::reservation::ReservationRepository;
use crate::domain::{
    Basket, BasketId, BasketStatus, DomainError, DomainResult, Planning, PlanningId, Prestation,
    PrestationFilter, PrestationId, RepositoryProvider, Reservation, ReservationId,
    ReservationStatus, UserId,
};

// ── Plannings ───────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryPlanningRepository {
    plannings: DashMap<PlanningId, Planning>,
}

#[async_trait]
impl PlanningRepository for InMemoryPlanningRepository {
    async fn save(&self, planning: Planning) -> DomainResult<()> {
        match self.plannings.entry(planning.id) {
            Entry::Occupied(_) => Err(DomainError::Conflict(format!(
                "planning {} already exists",
                planning.id
            ))),
            Entry::Vacant(v) => {
                v.insert(planning);
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: PlanningId) -> DomainResult<Option<Planning>> {
        Ok(self.plannings.get(&id).map(|p| p.clone()))
    }

    async fn find_active_for_prestation(
        &self,
        prestation_id: PrestationId,
    ) -> DomainResult<Option<Planning>> {
        Ok(self
            .plannings
            .iter()
            .find(|p| p.prestation_id == prestation_id && p.is_active)
            .map(|p| p.value().clone()))
    }

    async fn find_all(&self) -> DomainResult<Vec<Planning>> {
        let mut all: Vec<Planning> = self.plannings.iter().map(|p| p.value().clone()).collect();
        all.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(all)
    }

    async fn update(&self, mut planning: Planning) -> DomainResult<i32> {
        let mut stored = self
            .plannings
            .get_mut(&planning.id)
            .ok_or_else(|| DomainError::not_found("Planning", planning.id))?;
        if stored.version != planning.version {
            return Err(DomainError::ConcurrentModification(format!(
                "planning {} was modified concurrently (expected version {}, found {})",
                planning.id, planning.version, stored.version
            )));
        }
        planning.version += 1;
        let version = planning.version;
        *stored = planning;
        Ok(version)
    }

    async fn delete(&self, id: PlanningId) -> DomainResult<()> {
        self.plannings
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found("Planning", id))
    }
}

// ── Reservations ────────────────────────────────────────────────

type ReservationMap = Arc<DashMap<ReservationId, Reservation>>;

/// Serializes status writes that must see several reservations at once
type StatusGate = Arc<Mutex<()>>;

fn lock(gate: &StatusGate) -> DomainResult<MutexGuard<'_, ()>> {
    gate.lock()
        .map_err(|_| DomainError::Storage("in-memory status lock poisoned".into()))
}

#[derive(Default)]
pub struct InMemoryReservationRepository {
    reservations: ReservationMap,
    gate: StatusGate,
}

#[async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn save(&self, reservation: Reservation) -> DomainResult<()> {
        self.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    async fn find_by_id(&self, id: ReservationId) -> DomainResult<Option<Reservation>> {
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn transition(
        &self,
        id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> DomainResult<bool> {
        let _gate = lock(&self.gate)?;
        let mut stored = self
            .reservations
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Reservation", id))?;
        if stored.status != from {
            return Ok(false);
        }
        stored.status = to;
        stored.updated_at = Utc::now();
        Ok(true)
    }

    async fn find_for_user(&self, user_id: UserId) -> DomainResult<Vec<Reservation>> {
        let mut found: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_pending_created_before(
        &self,
        created_before: DateTime<Utc>,
    ) -> DomainResult<Vec<Reservation>> {
        Ok(self
            .reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Pending && r.created_at < created_before)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn find_all(&self) -> DomainResult<Vec<Reservation>> {
        Ok(self.reservations.iter().map(|r| r.value().clone()).collect())
    }
}

// ── Baskets ─────────────────────────────────────────────────────

/// Baskets share the reservation map and status gate of their provider so
/// that payment validates reservations in the same step.
#[derive(Default)]
pub struct InMemoryBasketRepository {
    baskets: DashMap<BasketId, Basket>,
    open_by_user: DashMap<UserId, BasketId>,
    reservations: ReservationMap,
    gate: StatusGate,
}

impl InMemoryBasketRepository {
    fn release_open_slot(&self, basket: &Basket) {
        if !basket.is_open() {
            self.open_by_user
                .remove_if(&basket.user_id, |_, open| *open == basket.id);
        }
    }
}

#[async_trait]
impl BasketRepository for InMemoryBasketRepository {
    async fn save(&self, basket: Basket) -> DomainResult<()> {
        if basket.is_open() {
            match self.open_by_user.entry(basket.user_id) {
                Entry::Occupied(e) => {
                    return Err(DomainError::Conflict(format!(
                        "user {} already has open basket {}",
                        basket.user_id,
                        e.get()
                    )))
                }
                Entry::Vacant(v) => {
                    v.insert(basket.id);
                }
            }
        }
        self.baskets.insert(basket.id, basket);
        Ok(())
    }

    async fn find_by_id(&self, id: BasketId) -> DomainResult<Option<Basket>> {
        Ok(self.baskets.get(&id).map(|b| b.clone()))
    }

    async fn find_open_for_user(&self, user_id: UserId) -> DomainResult<Option<Basket>> {
        let Some(id) = self.open_by_user.get(&user_id).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.baskets.get(&id).map(|b| b.clone()))
    }

    async fn update_if_status(&self, basket: Basket, expected: BasketStatus) -> DomainResult<bool> {
        let mut stored = self
            .baskets
            .get_mut(&basket.id)
            .ok_or_else(|| DomainError::not_found("Basket", basket.id))?;
        if stored.status != expected {
            return Ok(false);
        }
        self.release_open_slot(&basket);
        *stored = basket;
        Ok(true)
    }

    async fn mark_paid(&self, basket: &Basket) -> DomainResult<bool> {
        let _gate = lock(&self.gate)?;
        let mut stored = self
            .baskets
            .get_mut(&basket.id)
            .ok_or_else(|| DomainError::not_found("Basket", basket.id))?;
        if stored.status != BasketStatus::PendingPayment {
            return Ok(false);
        }
        let all_pending = basket.reservation_ids().all(|id| {
            self.reservations
                .get(&id)
                .is_some_and(|r| r.status == ReservationStatus::Pending)
        });
        if !all_pending {
            return Ok(false);
        }

        let now = Utc::now();
        for id in basket.reservation_ids() {
            if let Some(mut r) = self.reservations.get_mut(&id) {
                r.status = ReservationStatus::Validated;
                r.updated_at = now;
            }
        }
        self.release_open_slot(basket);
        *stored = basket.clone();
        Ok(true)
    }

    async fn find_open_created_before(
        &self,
        created_before: DateTime<Utc>,
    ) -> DomainResult<Vec<Basket>> {
        Ok(self
            .baskets
            .iter()
            .filter(|b| b.is_open() && b.created_at < created_before)
            .map(|b| b.value().clone())
            .collect())
    }
}

// ── Prestations ─────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryPrestationRepository {
    prestations: DashMap<PrestationId, Prestation>,
}

#[async_trait]
impl PrestationRepository for InMemoryPrestationRepository {
    async fn save(&self, prestation: Prestation) -> DomainResult<()> {
        self.prestations.insert(prestation.id, prestation);
        Ok(())
    }

    async fn find_by_id(&self, id: PrestationId) -> DomainResult<Option<Prestation>> {
        Ok(self.prestations.get(&id).map(|p| p.clone()))
    }

    async fn update(&self, prestation: Prestation) -> DomainResult<()> {
        let mut stored = self
            .prestations
            .get_mut(&prestation.id)
            .ok_or_else(|| DomainError::not_found("Prestation", prestation.id))?;
        *stored = prestation;
        Ok(())
    }

    async fn find(&self, filter: &PrestationFilter) -> DomainResult<Vec<Prestation>> {
        let mut found: Vec<Prestation> = self
            .prestations
            .iter()
            .filter(|p| filter.matches(p.value()))
            .map(|p| p.value().clone())
            .collect();
        found.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(found)
    }
}

// ── Provider ────────────────────────────────────────────────────

/// Repository provider backed by process memory
pub struct InMemoryRepositoryProvider {
    plannings: InMemoryPlanningRepository,
    reservations: InMemoryReservationRepository,
    baskets: InMemoryBasketRepository,
    prestations: InMemoryPrestationRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        let reservations = ReservationMap::default();
        let gate = StatusGate::default();
        Self {
            plannings: InMemoryPlanningRepository::default(),
            reservations: InMemoryReservationRepository {
                reservations: reservations.clone(),
                gate: gate.clone(),
            },
            baskets: InMemoryBasketRepository {
                reservations,
                gate,
                ..InMemoryBasketRepository::default()
            },
            prestations: InMemoryPrestationRepository::default(),
        }
    }
}

impl Default for InMemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn plannings(&self) -> &dyn PlanningRepository {
        &self.plannings
    }

    fn reservations(&self) -> &dyn ReservationRepository {
        &self.reservations
    }

    fn baskets(&self) -> &dyn BasketRepository {
        &self.baskets
    }

    fn prestations(&self) -> &dyn PrestationRepository {
        &self.prestations
    }
}
