//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod basket_repository;
pub mod planning_repository;
pub mod prestation_repository;
pub mod repository_provider;
pub mod reservation_repository;

pub use basket_repository::SeaOrmBasketRepository;
pub use planning_repository::SeaOrmPlanningRepository;
pub use prestation_repository::SeaOrmPrestationRepository;
pub use repository_provider::SeaOrmRepositoryProvider;
pub use reservation_repository::SeaOrmReservationRepository;

use sea_orm::{DbErr, SqlErr};

use crate::domain::{DomainError, DomainResult};

pub(crate) fn db_err(e: DbErr) -> DomainError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => DomainError::Conflict(msg),
        _ => DomainError::Storage(e.to_string()),
    }
}

/// Stored integer column back to an unsigned domain value
pub(crate) fn to_u32(value: i32, column: &str) -> DomainResult<u32> {
    u32::try_from(value)
        .map_err(|_| DomainError::Storage(format!("negative value {value} in column {column}")))
}

/// Unsigned domain value to an integer column
pub(crate) fn to_i32(value: u32, column: &str) -> DomainResult<i32> {
    i32::try_from(value)
        .map_err(|_| DomainError::Validation(format!("{column} value {value} is too large")))
}
