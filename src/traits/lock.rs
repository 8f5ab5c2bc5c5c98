//! Distributed lease lock trait definition

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServerResult;

/// Lease held on one named lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockToken {
    /// Lock key (`calendar`, `btc-anchor`, ...)
    pub key: String,

    /// Replica that holds the lease
    pub holder: String,

    /// Random lease token; renew and release must present it
    pub token: String,

    /// Lease expiry (Unix milliseconds) as of acquisition or last renewal
    pub expires_at: i64,
}

/// Result of a single acquisition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAcquisition {
    Acquired(LockToken),
    Busy,
}

/// Named mutual exclusion shared by every replica
///
/// A lease held past its TTL without renewal may be taken by another holder.
/// All methods are single attempts; waiting and retrying is the scheduler's job.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Take `key` if it is free or its lease has expired
    ///
    /// `operation` is stored with the lease for diagnostics only.
    async fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        operation: &str,
        ttl: Duration,
    ) -> ServerResult<LockAcquisition>;

    /// Extend a held lease
    ///
    /// Returns `false` when the lease was lost (expired and taken, or released).
    async fn renew(&self, token: &LockToken, ttl: Duration) -> ServerResult<bool>;

    /// Release a held lease; releasing a lost lease is a no-op
    async fn release(&self, token: &LockToken) -> ServerResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: trait is object-safe
    fn _assert_object_safe(_: &dyn DistributedLock) {}
}
