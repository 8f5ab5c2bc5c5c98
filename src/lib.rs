//! calendar-server library exports

pub mod aggregation;
pub mod anchoring;
pub mod background;
pub mod broker;
pub mod calendar;
pub mod config;
pub mod error;
pub mod lock;
pub mod merkle;
pub mod proof;
pub mod storage;
pub mod traits;

// Re-exports
pub use error::{ServerError, ServerResult};
pub use traits::{BlockStore, DistributedLock, MessageBroker};
