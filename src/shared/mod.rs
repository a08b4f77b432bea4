pub mod errors;
pub mod retry;
pub mod shutdown;
pub mod time;

pub use errors::{AppError, DomainError, InfraError};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
