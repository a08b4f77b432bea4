//! Prestation catalogue service
//!
//! Reads go through the [`ReadCache`]; writes return the cache entries they
//! invalidate and the service applies them before returning.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::application::cache::{CacheInvalidation, CommandOutcome, SharedReadCache};
use crate::domain::{
    DomainError, DomainResult, Prestation, PrestationCategory, PrestationFilter, PrestationId,
    RepositoryProvider, Species,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePrestationCommand {
    #[validate(length(min = 1, max = 120, message = "label must be 1–120 characters"))]
    pub label: String,
    #[validate(length(max = 2000, message = "description is too long"))]
    pub description: Option<String>,
    pub category: PrestationCategory,
    pub species: Species,
    #[validate(range(min = 0, message = "price_per_day must be non-negative"))]
    pub price_per_day: i64,
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub duration_minutes: u32,
}

/// Partial update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePrestationCommand {
    #[validate(length(min = 1, max = 120, message = "label must be 1–120 characters"))]
    pub label: Option<String>,
    #[validate(length(max = 2000, message = "description is too long"))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "price_per_day must be non-negative"))]
    pub price_per_day: Option<i64>,
    pub is_active: Option<bool>,
}

pub struct PrestationService {
    repos: Arc<dyn RepositoryProvider>,
    cache: SharedReadCache,
}

impl PrestationService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, cache: SharedReadCache) -> Self {
        Self { repos, cache }
    }

    pub async fn create(&self, cmd: CreatePrestationCommand) -> DomainResult<CommandOutcome<Prestation>> {
        cmd.validate()?;
        let now = Utc::now();
        let prestation = Prestation {
            id: PrestationId::new(),
            label: cmd.label,
            description: cmd.description,
            category: cmd.category,
            species: cmd.species,
            price_per_day: cmd.price_per_day,
            duration_minutes: cmd.duration_minutes,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.repos.prestations().save(prestation.clone()).await?;
        info!(prestation_id = %prestation.id, label = %prestation.label, "Prestation created");

        let outcome = CommandOutcome::new(prestation)
            .invalidating(CacheInvalidation::PrestationCatalogue);
        self.cache.apply(&outcome.invalidations).await;
        Ok(outcome)
    }

    pub async fn update(
        &self,
        id: PrestationId,
        cmd: UpdatePrestationCommand,
    ) -> DomainResult<CommandOutcome<Prestation>> {
        cmd.validate()?;
        let mut prestation = self.load(id).await?;
        if let Some(label) = cmd.label {
            prestation.label = label;
        }
        if let Some(description) = cmd.description {
            prestation.description = Some(description);
        }
        if let Some(price) = cmd.price_per_day {
            prestation.price_per_day = price;
        }
        if let Some(active) = cmd.is_active {
            prestation.is_active = active;
        }
        prestation.updated_at = Utc::now();
        self.repos.prestations().update(prestation.clone()).await?;

        let outcome = CommandOutcome::new(prestation)
            .invalidating(CacheInvalidation::Prestation(id))
            .invalidating(CacheInvalidation::PrestationCatalogue);
        self.cache.apply(&outcome.invalidations).await;
        Ok(outcome)
    }

    pub async fn deactivate(&self, id: PrestationId) -> DomainResult<CommandOutcome<Prestation>> {
        self.update(
            id,
            UpdatePrestationCommand {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// Cached lookup
    pub async fn get(&self, id: PrestationId) -> DomainResult<Prestation> {
        if let Some(p) = self.cache.prestation(id) {
            return Ok(p);
        }
        let prestation = self.load(id).await?;
        self.cache.put_prestation(prestation.clone());
        Ok(prestation)
    }

    /// Catalogue filtered in memory from the cached full list
    pub async fn list(&self, filter: &PrestationFilter) -> DomainResult<Vec<Prestation>> {
        let catalogue = match self.cache.catalogue().await {
            Some(list) => list,
            None => {
                let all = self.repos.prestations().find(&PrestationFilter::default()).await?;
                self.cache.put_catalogue(all).await
            }
        };
        Ok(catalogue.iter().filter(|p| filter.matches(p)).cloned().collect())
    }

    async fn load(&self, id: PrestationId) -> DomainResult<Prestation> {
        self.repos
            .prestations()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Prestation", id))
    }
}
