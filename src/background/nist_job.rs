// File: src/background/nist_job.rs

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::interval;

use crate::calendar::{Block, BlockType, CalendarChain};
use crate::error::{ServerError, ServerResult};
use crate::lock::{HeldLease, LockKind, LockOutcome, LockScheduler};

/// A NIST randomness beacon value, `timestamp:seed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconValue {
    /// Beacon pulse time, Unix seconds
    pub timestamp: u64,
    /// Hex output value of the pulse
    pub seed: String,
}

impl FromStr for BeaconValue {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ServerError::Validation(format!("malformed beacon value '{}'", s));

        let (ts, seed) = s.split_once(':').ok_or_else(invalid)?;
        let timestamp = ts.parse::<u64>().map_err(|_| invalid())?;
        if seed.is_empty() || hex::decode(seed).is_err() {
            return Err(invalid());
        }
        Ok(Self {
            timestamp,
            seed: seed.to_lowercase(),
        })
    }
}

impl std::fmt::Display for BeaconValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.timestamp, self.seed)
    }
}

/// NIST tier job
///
/// Writes a `nist` block whenever the beacon channel carries a value other
/// than the one recorded in the latest `nist` block.
pub struct NistJob {
    calendar: Arc<CalendarChain>,
    beacon: watch::Receiver<Option<String>>,
    scheduler: LockScheduler,
    interval: Duration,
}

impl NistJob {
    pub fn new(
        calendar: Arc<CalendarChain>,
        beacon: watch::Receiver<Option<String>>,
        scheduler: LockScheduler,
        interval: Duration,
    ) -> Self {
        Self {
            calendar,
            beacon,
            scheduler,
            interval,
        }
    }

    /// Run until shutdown signal is received via broadcast channel
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::warn!(error = %e, "NIST cycle failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("NIST job shutting down");
                    break;
                }
            }
        }
    }

    /// One NIST cycle; returns the block written, if any
    pub async fn run_once(&self) -> ServerResult<Option<Block>> {
        let Some(raw) = self.beacon.borrow().clone() else {
            return Ok(None);
        };
        let value: BeaconValue = raw.parse()?;

        let outcome = self
            .scheduler
            .run_leased(LockKind::Nist, |lease| self.write_if_changed(lease, value))
            .await?;

        match outcome {
            LockOutcome::Completed(result) => result,
            LockOutcome::Busy => Ok(None),
        }
    }

    async fn write_if_changed(&self, lease: HeldLease, value: BeaconValue) -> ServerResult<Option<Block>> {
        let value_str = value.to_string();
        let latest = self
            .calendar
            .blocking(|c| c.latest_of_type(BlockType::Nist))
            .await?;
        if latest.is_some_and(|b| b.data_val == value_str) {
            return Ok(None);
        }

        let data_id = value.timestamp.to_string();
        let block = self
            .scheduler
            .write_ledger(
                &lease,
                self.calendar
                    .blocking(move |c| c.write_block(BlockType::Nist, &data_id, &value_str)),
            )
            .await?;
        tracing::info!(height = block.height, timestamp = value.timestamp, "NIST block written");
        Ok(Some(block))
    }
}
