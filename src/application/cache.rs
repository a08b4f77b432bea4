//! Read cache with declared invalidation
//!
//! Mutating commands do not touch the cache themselves. They return a
//! [`CommandOutcome`] listing the [`CacheInvalidation`]s they cause and the
//! caller applies them with [`ReadCache::apply`]. Capacity counters are
//! never cached.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{Prestation, PrestationId};

/// Cache entry made stale by a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheInvalidation {
    Prestation(PrestationId),
    /// The full prestation catalogue
    PrestationCatalogue,
}

/// Result of a mutating command plus the cache entries it made stale
#[derive(Debug, Clone)]
pub struct CommandOutcome<T> {
    pub value: T,
    pub invalidations: Vec<CacheInvalidation>,
}

impl<T> CommandOutcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            invalidations: Vec::new(),
        }
    }

    pub fn invalidating(mut self, invalidation: CacheInvalidation) -> Self {
        if !self.invalidations.contains(&invalidation) {
            self.invalidations.push(invalidation);
        }
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CommandOutcome<U> {
        CommandOutcome {
            value: f(self.value),
            invalidations: self.invalidations,
        }
    }
}

/// In-process read cache for the prestation catalogue
#[derive(Default)]
pub struct ReadCache {
    prestations: DashMap<PrestationId, Prestation>,
    catalogue: RwLock<Option<Arc<Vec<Prestation>>>>,
}

pub type SharedReadCache = Arc<ReadCache>;

impl ReadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedReadCache {
        Arc::new(Self::new())
    }

    pub fn prestation(&self, id: PrestationId) -> Option<Prestation> {
        self.prestations.get(&id).map(|p| p.clone())
    }

    pub fn put_prestation(&self, prestation: Prestation) {
        self.prestations.insert(prestation.id, prestation);
    }

    pub async fn catalogue(&self) -> Option<Arc<Vec<Prestation>>> {
        self.catalogue.read().await.clone()
    }

    pub async fn put_catalogue(&self, prestations: Vec<Prestation>) -> Arc<Vec<Prestation>> {
        let list = Arc::new(prestations);
        *self.catalogue.write().await = Some(list.clone());
        list
    }

    /// Drop every entry named by `invalidations`.
    pub async fn apply(&self, invalidations: &[CacheInvalidation]) {
        for invalidation in invalidations {
            debug!(?invalidation, "Cache invalidated");
            match invalidation {
                CacheInvalidation::Prestation(id) => {
                    self.prestations.remove(id);
                }
                CacheInvalidation::PrestationCatalogue => {
                    *self.catalogue.write().await = None;
                }
            }
        }
    }
}
