//! Distributed lock scheduling
//!
//! One named lease per privileged periodic operation lets exactly one of
//! several replicas perform that operation per interval.

mod config;
mod kind;
mod memory;
mod scheduler;

pub(crate) use config::env_millis;
pub use config::LockConfig;
pub use kind::LockKind;
pub use memory::MemoryLockService;
pub use scheduler::{HeldLease, LockOutcome, LockScheduler};
