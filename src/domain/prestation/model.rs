//! Prestation domain entity

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::PrestationId;
use crate::shared::errors::DomainError;

/// Kind of service offered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrestationCategory {
    Boarding,
    Daycare,
    Grooming,
    Walking,
    Training,
}

impl PrestationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boarding => "Boarding",
            Self::Daycare => "Daycare",
            Self::Grooming => "Grooming",
            Self::Walking => "Walking",
            Self::Training => "Training",
        }
    }
}

impl FromStr for PrestationCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Boarding" => Ok(Self::Boarding),
            "Daycare" => Ok(Self::Daycare),
            "Grooming" => Ok(Self::Grooming),
            "Walking" => Ok(Self::Walking),
            "Training" => Ok(Self::Training),
            other => Err(DomainError::Validation(format!("unknown category: {other}"))),
        }
    }
}

impl std::fmt::Display for PrestationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Animal profile a prestation is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Species {
    Dog,
    Cat,
    /// Rabbits, rodents, birds...
    Other,
}

impl Species {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dog => "Dog",
            Self::Cat => "Cat",
            Self::Other => "Other",
        }
    }
}

impl FromStr for Species {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Dog" => Ok(Self::Dog),
            "Cat" => Ok(Self::Cat),
            "Other" => Ok(Self::Other),
            other => Err(DomainError::Validation(format!("unknown species: {other}"))),
        }
    }
}

/// Bookable service offering
#[derive(Debug, Clone, PartialEq)]
pub struct Prestation {
    pub id: PrestationId,
    pub label: String,
    pub description: Option<String>,
    pub category: PrestationCategory,
    pub species: Species,
    /// Price per booked day, in minor currency units
    pub price_per_day: i64,
    /// Length of one session in minutes (a full day for boarding)
    pub duration_minutes: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prestation {
    /// Price of `days` days.
    pub fn price_for(&self, days: u32) -> i64 {
        self.price_per_day.saturating_mul(i64::from(days))
    }

    fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.label.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

/// Catalogue query. Every set field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct PrestationFilter {
    pub category: Option<PrestationCategory>,
    pub species: Option<Species>,
    pub active_only: bool,
    /// Case-insensitive match on label or description
    pub search: Option<String>,
}

impl PrestationFilter {
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: PrestationCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_species(mut self, species: Species) -> Self {
        self.species = Some(species);
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn matches(&self, p: &Prestation) -> bool {
        (!self.active_only || p.is_active)
            && self.category.map_or(true, |c| p.category == c)
            && self.species.map_or(true, |s| p.species == s)
            && self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map_or(true, |s| p.matches_text(s))
    }
}
