//! Basket aggregate

pub mod model;
pub mod repository;

pub use model::{Basket, BasketItem, BasketStatus, DEFAULT_BASKET_TTL_MINUTES};
pub use repository::BasketRepository;
