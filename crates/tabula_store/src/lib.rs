pub mod config;
pub mod datastore;
mod db;
pub mod filter;
pub mod migration;
mod mutation;
mod read;
mod records;
mod sql;
mod stats;
mod store;
mod tx;

pub use sea_orm;
pub use sea_orm_migration;
pub use tabula_core::*;

pub use config::{DatabaseConfig, LimitsConfig, PoolConfig, TabulaConfig};
pub use datastore::{default_sqlite_path, load_or_init_config, open_store, open_store_with};
pub use db::STAT_TABLE;
pub use records::Records;
pub use stats::TableStat;
pub use store::{BackendCapabilities, Session, StoreSettings, TabulaStore};
