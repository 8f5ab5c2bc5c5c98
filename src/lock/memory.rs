// File: src/lock/memory.rs

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{ServerError, ServerResult};
use crate::traits::{DistributedLock, LockAcquisition, LockToken};

#[derive(Debug)]
struct Lease {
    token: String,
    operation: String,
    expires: Instant,
}

/// Process-local lease table
///
/// Share one instance (behind an `Arc`) between several schedulers to model
/// replicas racing for the same keys.
#[derive(Debug, Default)]
pub struct MemoryLockService {
    leases: Mutex<HashMap<String, Lease>>,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operation recorded by the current unexpired holder of `key`
    pub fn current_operation(&self, key: &str) -> Option<String> {
        let leases = self.leases.lock().ok()?;
        leases
            .get(key)
            .filter(|l| l.expires > Instant::now())
            .map(|l| l.operation.clone())
    }

    fn table(&self) -> ServerResult<std::sync::MutexGuard<'_, HashMap<String, Lease>>> {
        self.leases
            .lock()
            .map_err(|_| ServerError::TransientInfra("lock table poisoned".into()))
    }
}

fn expiry_millis(ttl: Duration) -> i64 {
    chrono::Utc::now().timestamp_millis() + ttl.as_millis() as i64
}

#[async_trait]
impl DistributedLock for MemoryLockService {
    async fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        operation: &str,
        ttl: Duration,
    ) -> ServerResult<LockAcquisition> {
        let now = Instant::now();
        let mut leases = self.table()?;

        if leases.get(key).is_some_and(|l| l.expires > now) {
            return Ok(LockAcquisition::Busy);
        }

        let token = uuid::Uuid::new_v4().to_string();
        leases.insert(
            key.to_string(),
            Lease {
                token: token.clone(),
                operation: operation.to_string(),
                expires: now + ttl,
            },
        );

        Ok(LockAcquisition::Acquired(LockToken {
            key: key.to_string(),
            holder: holder.to_string(),
            token,
            expires_at: expiry_millis(ttl),
        }))
    }

    async fn renew(&self, token: &LockToken, ttl: Duration) -> ServerResult<bool> {
        let now = Instant::now();
        let mut leases = self.table()?;
        match leases.get_mut(&token.key) {
            Some(lease) if lease.token == token.token && lease.expires > now => {
                lease.expires = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, token: &LockToken) -> ServerResult<()> {
        let mut leases = self.table()?;
        if leases.get(&token.key).is_some_and(|l| l.token == token.token) {
            leases.remove(&token.key);
        }
        Ok(())
    }
}
