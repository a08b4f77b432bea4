//! SeaORM implementation of PrestationRepository

use async_trait::async_trait;
use log::debug;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::{db_err, to_i32, to_u32};
use crate::domain::prestation::{Prestation, PrestationFilter, PrestationRepository};
use crate::domain::{DomainError, DomainResult, PrestationId};
use crate::infrastructure::database::entities::prestation;

pub struct SeaOrmPrestationRepository {
    db: DatabaseConnection,
}

impl SeaOrmPrestationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: prestation::Model) -> DomainResult<Prestation> {
    Ok(Prestation {
        id: PrestationId::from_uuid(m.id),
        label: m.label,
        description: m.description,
        category: m.category.parse()?,
        species: m.species.parse()?,
        price_per_day: m.price_per_day,
        duration_minutes: to_u32(m.duration_minutes, "duration_minutes")?,
        is_active: m.is_active,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn domain_to_active(p: &Prestation) -> DomainResult<prestation::ActiveModel> {
    Ok(prestation::ActiveModel {
        id: Set(p.id.as_uuid()),
        label: Set(p.label.clone()),
        description: Set(p.description.clone()),
        category: Set(p.category.as_str().to_string()),
        species: Set(p.species.as_str().to_string()),
        price_per_day: Set(p.price_per_day),
        duration_minutes: Set(to_i32(p.duration_minutes, "duration_minutes")?),
        is_active: Set(p.is_active),
        created_at: Set(p.created_at),
        updated_at: Set(p.updated_at),
    })
}

// ── PrestationRepository impl ───────────────────────────────────

#[async_trait]
impl PrestationRepository for SeaOrmPrestationRepository {
    async fn save(&self, p: Prestation) -> DomainResult<()> {
        debug!("Saving prestation: {}", p.id);
        domain_to_active(&p)?.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: PrestationId) -> DomainResult<Option<Prestation>> {
        let model = prestation::Entity::find_by_id(id.as_uuid())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        model.map(model_to_domain).transpose()
    }

    async fn update(&self, p: Prestation) -> DomainResult<()> {
        debug!("Updating prestation: {}", p.id);

        let existing = prestation::Entity::find_by_id(p.id.as_uuid())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if existing.is_none() {
            return Err(DomainError::not_found("Prestation", p.id));
        }

        domain_to_active(&p)?.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn find(&self, filter: &PrestationFilter) -> DomainResult<Vec<Prestation>> {
        let mut query = prestation::Entity::find();
        if filter.active_only {
            query = query.filter(prestation::Column::IsActive.eq(true));
        }
        if let Some(category) = filter.category {
            query = query.filter(prestation::Column::Category.eq(category.as_str()));
        }
        if let Some(species) = filter.species {
            query = query.filter(prestation::Column::Species.eq(species.as_str()));
        }

        let models = query
            .order_by_asc(prestation::Column::Label)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        // Text search is applied here so it stays case-insensitive on every backend
        let mut found = Vec::with_capacity(models.len());
        for model in models {
            let p = model_to_domain(model)?;
            if filter.matches(&p) {
                found.push(p);
            }
        }
        Ok(found)
    }
}
