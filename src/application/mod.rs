//! Application layer: use-case services, background workers and the read
//! cache

pub mod cache;
pub mod services;

pub use cache::{CacheInvalidation, CommandOutcome, ReadCache, SharedReadCache};
pub use services::{
    BasketService, BookingService, ExpiryReport, ExpiryService, PlanningService,
    PrestationService,
};
