//! Database migrations for the Calendar API.

pub use sea_orm_migration::prelude::*;

mod m2026_07_01_000001_create_calendar_connections;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m2026_07_01_000001_create_calendar_connections::Migration,
        )]
    }
}
