//! Domain layer: aggregates, identifiers and repository interfaces

pub mod basket;
pub mod ids;
pub mod planning;
pub mod prestation;
pub mod repositories;
pub mod reservation;

pub use basket::{Basket, BasketItem, BasketStatus};
pub use ids::{AnimalId, BasketId, PlanningId, PrestationId, ReservationId, UserId};
pub use planning::{AvailableSlot, DayAvailability, Planning, ReleaseReport};
pub use prestation::{Prestation, PrestationCategory, PrestationFilter, Species};
pub use repositories::{DomainResult, RepositoryProvider};
pub use reservation::{Reservation, ReservationStatus};

pub use crate::shared::errors::DomainError;
