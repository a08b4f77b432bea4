//! Application services

mod basket;
mod booking;
mod expiry;
mod planning;
mod prestation;

pub use basket::BasketService;
pub use booking::{BookingService, CreateReservationCommand};
pub use expiry::{
    start_basket_expiry_task, start_reservation_expiry_task, ExpiryReport, ExpiryService,
};
pub use planning::{CreatePlanningCommand, OpenSlotsCommand, PlanningService};
pub use prestation::{CreatePrestationCommand, PrestationService, UpdatePrestationCommand};
