//! Repository access for the domain layer
//!
//! - `RepositoryProvider` — unified access to all per-aggregate repositories
//! - `DomainResult` — standard result type for domain operations

use super::basket::BasketRepository;
use super::planning::PlanningRepository;
use super::prestation::PrestationRepository;
use super::reservation::ReservationRepository;
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Provides access to all domain repositories.
///
/// Consumers request only the repository they need:
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let planning = repos.plannings().find_active_for_prestation(prestation_id).await?;
///     let pending = repos.reservations().find_pending_created_before(cutoff).await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn plannings(&self) -> &dyn PlanningRepository;
    fn reservations(&self) -> &dyn ReservationRepository;
    fn baskets(&self) -> &dyn BasketRepository;
    fn prestations(&self) -> &dyn PrestationRepository;
}
