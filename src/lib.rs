//! # Pet Boarding Reservations
//!
//! Reservation core for a pet-boarding business: daily slot capacity per
//! service, reserve/cancel against that capacity, baskets with checkout and
//! payment confirmation, and background expiry of unpaid holds.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Aggregates (planning, reservation, basket, prestation) and
//!   repository traits
//! - **application**: Use-case services, expiry workers and the read cache
//! - **infrastructure**: SeaORM persistence and in-memory repositories
//! - **server**: Runtime wiring, tracing and graceful shutdown
//! - **shared**: Errors, retry, shutdown signal and time helpers

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod server;
pub mod shared;

pub use config::AppConfig;

// Re-export database types for easy access
pub use infrastructure::{
    init_database, run_migrations, DatabaseConfig, InMemoryRepositoryProvider,
    SeaOrmRepositoryProvider,
};

pub use server::{init_tracing, ServerHandle, ServerOptions, Services};
pub use shared::{AppError, DomainError, InfraError};
