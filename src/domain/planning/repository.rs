//! Planning repository interface

use async_trait::async_trait;

use super::model::Planning;
use crate::domain::ids::{PlanningId, PrestationId};
use crate::domain::DomainResult;

#[async_trait]
pub trait PlanningRepository: Send + Sync {
    /// Insert a new planning with its slots
    async fn save(&self, planning: Planning) -> DomainResult<()>;

    async fn find_by_id(&self, id: PlanningId) -> DomainResult<Option<Planning>>;

    /// The active planning of a prestation, if any
    async fn find_active_for_prestation(
        &self,
        prestation_id: PrestationId,
    ) -> DomainResult<Option<Planning>>;

    async fn find_all(&self) -> DomainResult<Vec<Planning>>;

    /// Replace the stored planning and its slots.
    ///
    /// Fails with `DomainError::ConcurrentModification` when the stored version is not
    /// `planning.version`; on success the stored version is incremented and
    /// returned.
    async fn update(&self, planning: Planning) -> DomainResult<i32>;

    async fn delete(&self, id: PlanningId) -> DomainResult<()>;
}
