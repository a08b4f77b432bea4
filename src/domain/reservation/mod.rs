//! Reservation aggregate
//!
//! Contains the Reservation entity, related types, and repository interface.

pub mod model;
pub mod repository;

pub use model::{pending_payment_ttl, Reservation, ReservationStatus, PENDING_PAYMENT_TTL_MINUTES};
pub use repository::ReservationRepository;
