use sea_orm_migration::prelude::*;

mod m20250108_000001_init;
mod record_table;

pub use record_table::{create_record_table, drop_record_table};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250108_000001_init::Migration)]
    }
}
