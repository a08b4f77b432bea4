//! Database entities module

pub mod available_slot;
pub mod basket;
pub mod basket_item;
pub mod planning;
pub mod prestation;
pub mod reservation;

pub use available_slot::Entity as AvailableSlot;
pub use basket::Entity as Basket;
pub use basket_item::Entity as BasketItem;
pub use planning::Entity as Planning;
pub use prestation::Entity as Prestation;
pub use reservation::Entity as Reservation;
