//! Prestation aggregate
//!
//! The bookable service catalogue.

pub mod model;
pub mod repository;

pub use model::{Prestation, PrestationCategory, PrestationFilter, Species};
pub use repository::PrestationRepository;
