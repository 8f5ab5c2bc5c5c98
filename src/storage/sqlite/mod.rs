// File: src/storage/sqlite/mod.rs

mod blocks;
mod config;
mod convert;
mod locks;
mod schema;
mod store;

// Public exports
pub use config::{LedgerStats, SqliteConfig};
pub use locks::SqliteLockService;
pub use schema::SCHEMA_VERSION;
pub use store::SqliteBlockStore;
