//! Storage module
//!
//! SQLite persistence for calendar blocks and the shared lease lock table.

pub mod sqlite;

pub use crate::traits::BlockStore;
pub use sqlite::{LedgerStats, SqliteBlockStore, SqliteConfig, SqliteLockService};
