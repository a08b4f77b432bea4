//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::basket::BasketRepository;
use crate::domain::planning::PlanningRepository;
use crate::domain::prestation::PrestationRepository;
use crate::domain::repositories::RepositoryProvider;
use crate::domain::reservation::ReservationRepository;

use super::basket_repository::SeaOrmBasketRepository;
use super::planning_repository::SeaOrmPlanningRepository;
use super::prestation_repository::SeaOrmPrestationRepository;
use super::reservation_repository::SeaOrmReservationRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let planning = repos.plannings().find_active_for_prestation(prestation_id).await?;
/// let overdue = repos.reservations().find_pending_created_before(cutoff).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    plannings: SeaOrmPlanningRepository,
    reservations: SeaOrmReservationRepository,
    baskets: SeaOrmBasketRepository,
    prestations: SeaOrmPrestationRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            plannings: SeaOrmPlanningRepository::new(db.clone()),
            reservations: SeaOrmReservationRepository::new(db.clone()),
            baskets: SeaOrmBasketRepository::new(db.clone()),
            prestations: SeaOrmPrestationRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
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
