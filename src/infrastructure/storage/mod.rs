//! In-memory storage

mod memory;

pub use memory::{
    InMemoryBasketRepository, InMemoryPlanningRepository, InMemoryPrestationRepository,
    InMemoryRepositoryProvider, InMemoryReservationRepository,
};
