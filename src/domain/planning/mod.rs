//! Planning aggregate
//!
//! Per-prestation calendar of capacity slots and the repository interface.

pub mod model;
pub mod repository;

pub use model::{AvailableSlot, DayAvailability, Planning, ReleaseReport, SkippedRelease};
pub use repository::PlanningRepository;
