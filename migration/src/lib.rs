//! Database migrations for guildkeeper.
//!
//! The service keeps all of its state in one scoped key-value table.

pub use sea_orm_migration::prelude::*;

mod m2026_01_01_000001_create_config_entries;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m2026_01_01_000001_create_config_entries::Migration)]
    }
}
