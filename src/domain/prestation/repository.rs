//! Prestation repository interface

use async_trait::async_trait;

use super::model::{Prestation, PrestationFilter};
use crate::domain::ids::PrestationId;
use crate::domain::DomainResult;

#[async_trait]
pub trait PrestationRepository: Send + Sync {
    async fn save(&self, prestation: Prestation) -> DomainResult<()>;

    async fn find_by_id(&self, id: PrestationId) -> DomainResult<Option<Prestation>>;

    async fn update(&self, prestation: Prestation) -> DomainResult<()>;

    /// Prestations matching `filter`, ordered by label
    async fn find(&self, filter: &PrestationFilter) -> DomainResult<Vec<Prestation>>;
}
