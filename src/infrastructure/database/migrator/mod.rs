//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_prestations;
mod m20240101_000002_create_plannings;
mod m20240101_000003_create_available_slots;
mod m20240101_000004_create_reservations;
mod m20240101_000005_create_baskets;
mod m20240101_000006_create_basket_items;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_prestations::Migration),
            Box::new(m20240101_000002_create_plannings::Migration),
            Box::new(m20240101_000003_create_available_slots::Migration),
            Box::new(m20240101_000004_create_reservations::Migration),
            Box::new(m20240101_000005_create_baskets::Migration),
            Box::new(m20240101_000006_create_basket_items::Migration),
        ]
    }
}
