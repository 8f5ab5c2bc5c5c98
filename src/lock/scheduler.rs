// File: src/lock/scheduler.rs

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use rand::Rng;
use tokio::time::{sleep, Instant};

use super::config::LockConfig;
use super::kind::LockKind;
use crate::error::{ServerError, ServerResult};
use crate::traits::{DistributedLock, LockAcquisition, LockToken};

/// Result of an exclusive run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome<T> {
    /// The lock was held and the operation ran to completion
    Completed(T),

    /// The lock could not be taken before the acquire timeout; nothing ran
    Busy,
}

impl<T> LockOutcome<T> {
    pub fn is_busy(&self) -> bool {
        matches!(self, LockOutcome::Busy)
    }

    pub fn into_completed(self) -> Option<T> {
        match self {
            LockOutcome::Completed(v) => Some(v),
            LockOutcome::Busy => None,
        }
    }
}

impl<T> LockOutcome<ServerResult<T>> {
    /// Lift the operation's error out of the outcome
    pub fn transpose(self) -> ServerResult<LockOutcome<T>> {
        match self {
            LockOutcome::Completed(result) => result.map(LockOutcome::Completed),
            LockOutcome::Busy => Ok(LockOutcome::Busy),
        }
    }
}

/// Handle on a lease held for the duration of one operation
///
/// Marked lost when a background renewal is refused or fails. Writers check
/// it before touching the ledger.
#[derive(Debug, Clone)]
pub struct HeldLease {
    kind: LockKind,
    lost: Arc<AtomicBool>,
}

impl HeldLease {
    pub fn kind(&self) -> LockKind {
        self.kind
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    /// # Errors
    /// * `ServerError::TransientInfra` - the lease may now belong to another replica
    pub fn ensure_held(&self) -> ServerResult<()> {
        if self.is_lost() {
            return Err(ServerError::TransientInfra(format!(
                "{} lease lost",
                self.kind
            )));
        }
        Ok(())
    }
}

/// Runs operations while holding a named distributed lease
///
/// Each call sleeps a random jitter, polls for the lease until the acquire
/// timeout, renews it in the background while the operation runs, and
/// releases it on every exit path including a panic.
#[derive(Clone)]
pub struct LockScheduler {
    lock: Arc<dyn DistributedLock>,
    holder: String,
    config: LockConfig,
}

impl LockScheduler {
    /// Create a scheduler with a random holder id
    pub fn new(lock: Arc<dyn DistributedLock>, config: LockConfig) -> Self {
        Self::with_holder(lock, uuid::Uuid::new_v4().to_string(), config)
    }

    pub fn with_holder(
        lock: Arc<dyn DistributedLock>,
        holder: impl Into<String>,
        config: LockConfig,
    ) -> Self {
        Self {
            lock,
            holder: holder.into(),
            config,
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Run `op` while holding `kind`'s lock
    ///
    /// # Errors
    /// Only lock service failures are returned here; the operation's own
    /// result travels inside `LockOutcome::Completed`.
    pub async fn run_exclusive<F, Fut, T>(&self, kind: LockKind, op: F) -> ServerResult<LockOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.run_leased(kind, |_| op()).await
    }

    /// Same as [`run_exclusive`](Self::run_exclusive), handing `op` the held lease
    pub async fn run_leased<F, Fut, T>(&self, kind: LockKind, op: F) -> ServerResult<LockOutcome<T>>
    where
        F: FnOnce(HeldLease) -> Fut,
        Fut: Future<Output = T>,
    {
        self.jitter().await;
        self.hold(kind, op).await
    }

    /// Run one block write under the shared `ledger` lock
    ///
    /// Called while `lease` (the writer's own kind) is held, so writers of
    /// different kinds never link to the same tip. `write` is not polled if
    /// `lease` was lost.
    ///
    /// # Errors
    /// * `ServerError::TransientInfra` - `lease` was lost or the ledger lock stayed busy
    pub async fn write_ledger<Fut, T>(&self, lease: &HeldLease, write: Fut) -> ServerResult<T>
    where
        Fut: Future<Output = ServerResult<T>>,
    {
        lease.ensure_held()?;

        let outcome = self
            .hold(LockKind::Ledger, |_| async move {
                lease.ensure_held()?;
                write.await
            })
            .await?;

        match outcome {
            LockOutcome::Completed(result) => result,
            LockOutcome::Busy => Err(ServerError::TransientInfra(format!(
                "{} lock busy",
                LockKind::Ledger
            ))),
        }
    }

    async fn hold<F, Fut, T>(&self, kind: LockKind, op: F) -> ServerResult<LockOutcome<T>>
    where
        F: FnOnce(HeldLease) -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(token) = self.acquire(kind).await? else {
            tracing::warn!(lock = %kind, holder = %self.holder, "Lock busy, skipping cycle");
            return Ok(LockOutcome::Busy);
        };
        tracing::debug!(lock = %kind, holder = %self.holder, "Lock acquired");

        let lease = HeldLease {
            kind,
            lost: Arc::new(AtomicBool::new(false)),
        };
        let renewal = self.spawn_renewal(kind, token.clone(), lease.lost.clone());

        let held = lease.clone();
        let result = AssertUnwindSafe(async move { op(held).await })
            .catch_unwind()
            .await;

        renewal.abort();
        if lease.is_lost() {
            tracing::warn!(lock = %kind, "Lease was lost while the operation ran");
        }

        if let Err(e) = self.lock.release(&token).await {
            tracing::warn!(lock = %kind, error = %e, "Failed to release lock; it will expire");
        } else {
            tracing::debug!(lock = %kind, "Lock released");
        }

        match result {
            Ok(value) => Ok(LockOutcome::Completed(value)),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn jitter(&self) {
        let max = self.config.max_jitter.as_millis() as u64;
        if max > 0 {
            let delay = rand::thread_rng().gen_range(0..max);
            sleep(Duration::from_millis(delay)).await;
        }
    }

    /// Poll until acquired or the timeout passes
    async fn acquire(&self, kind: LockKind) -> ServerResult<Option<LockToken>> {
        let deadline = Instant::now() + self.config.acquire_timeout;
        loop {
            match self
                .lock
                .try_acquire(kind.key(), &self.holder, kind.operation(), self.config.ttl)
                .await?
            {
                LockAcquisition::Acquired(token) => return Ok(Some(token)),
                LockAcquisition::Busy => {}
            }

            if Instant::now() + self.config.retry_interval > deadline {
                return Ok(None);
            }
            sleep(self.config.retry_interval).await;
        }
    }

    fn spawn_renewal(
        &self,
        kind: LockKind,
        token: LockToken,
        lost: Arc<AtomicBool>,
    ) -> tokio::task::JoinHandle<()> {
        let lock = self.lock.clone();
        let ttl = self.config.ttl;
        let period = (ttl / 3).max(Duration::from_millis(1));

        tokio::spawn(async move {
            loop {
                sleep(period).await;
                match lock.renew(&token, ttl).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(lock = %kind, "Lease renewal refused");
                        lost.store(true, Ordering::SeqCst);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(lock = %kind, error = %e, "Lease renewal failed");
                        lost.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            }
        })
    }
}
