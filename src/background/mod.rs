// File: src/background/mod.rs

//! Background jobs for the rollup tiers
//!
//! This module runs the periodic jobs that:
//! - Aggregate staged leaf hashes into Tier-1 trees
//! - Roll staged aggregation roots into `cal` blocks
//! - Record NIST beacon values as `nist` blocks
//! - Roll `cal` blocks into per-chain anchor blocks
//!
//! and the dispatcher that feeds them from broker deliveries. Every job runs
//! on every replica; the ones that write to the calendar serialize through
//! the distributed lock scheduler.

pub mod anchor_job;
pub mod calendar_job;
pub mod config;
pub mod dispatcher;
pub mod genesis;
pub mod nist_job;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};

use crate::aggregation::{AggregationJob, Leaf, StagingBuffer};
use crate::anchoring::{AnchorChain, AnchoringCoordinator};
use crate::calendar::CalendarChain;
use crate::error::ServerResult;
use crate::lock::LockScheduler;
use crate::traits::{BrokerEvent, MessageBroker};

pub use anchor_job::AnchorJob;
pub use calendar_job::{CalendarJob, PendingRoot};
pub use config::{BackgroundConfig, CalendarJobConfig, NistJobConfig};
pub use dispatcher::Dispatcher;
pub use genesis::ensure_genesis;
pub use nist_job::{BeaconValue, NistJob};

/// Background job runner
///
/// Owns the staging buffers shared between the dispatcher and the jobs that
/// drain them. Jobs run continuously until shutdown.
pub struct BackgroundJobRunner {
    calendar: Arc<CalendarChain>,
    broker: Arc<dyn MessageBroker>,
    scheduler: LockScheduler,
    coordinator: Arc<AnchoringCoordinator>,
    beacon: watch::Receiver<Option<String>>,
    leaves: Arc<StagingBuffer<Leaf>>,
    roots: Arc<StagingBuffer<PendingRoot>>,
    stack_uri: String,
    config: BackgroundConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl BackgroundJobRunner {
    pub fn new(
        calendar: Arc<CalendarChain>,
        broker: Arc<dyn MessageBroker>,
        scheduler: LockScheduler,
        beacon: watch::Receiver<Option<String>>,
        stack_uri: impl Into<String>,
        config: BackgroundConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let stack_uri = stack_uri.into();

        let coordinator = Arc::new(AnchoringCoordinator::new(
            Arc::clone(&calendar),
            Arc::clone(&broker),
            scheduler.clone(),
            config.anchor.clone(),
            stack_uri.clone(),
        )
        .with_publish_retry(config.broker_retry));

        Self {
            calendar,
            broker,
            scheduler,
            coordinator,
            beacon,
            leaves: Arc::new(StagingBuffer::new()),
            roots: Arc::new(StagingBuffer::new()),
            stack_uri,
            config,
            shutdown_tx,
        }
    }

    pub fn coordinator(&self) -> &Arc<AnchoringCoordinator> {
        &self.coordinator
    }

    pub fn leaves(&self) -> &Arc<StagingBuffer<Leaf>> {
        &self.leaves
    }

    pub fn roots(&self) -> &Arc<StagingBuffer<PendingRoot>> {
        &self.roots
    }

    /// Start the dispatcher and all periodic jobs
    ///
    /// `events` is the broker's delivery stream; the dispatcher owns it
    /// until shutdown.
    pub async fn start(
        &self,
        events: mpsc::UnboundedReceiver<BrokerEvent>,
    ) -> ServerResult<Vec<tokio::task::JoinHandle<()>>> {
        if self.config.disabled {
            tracing::info!("Background jobs disabled via CAL_BACKGROUND_DISABLED=true");
            return Ok(vec![]);
        }

        let mut handles = Vec::new();

        // 1. Dispatcher (broker deliveries into staging buffers)
        {
            let dispatcher = Dispatcher::new(
                Arc::clone(&self.leaves),
                Arc::clone(&self.roots),
                Arc::clone(&self.coordinator),
                Arc::clone(&self.broker),
                self.config.broker_retry,
            );
            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                dispatcher.run(events, shutdown_rx).await;
            }));
            tracing::info!(
                retry_ms = self.config.broker_retry.as_millis() as u64,
                "Dispatcher started"
            );
        }

        // 2. Aggregation (leaves into Tier-1 trees)
        {
            let job = AggregationJob::new(
                Arc::clone(&self.leaves),
                Arc::clone(&self.broker),
                self.config.aggregation.clone(),
            );
            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                job.run(shutdown_rx).await;
            }));
            tracing::info!(
                interval_ms = self.config.aggregation.interval.as_millis() as u64,
                max_leaves = self.config.aggregation.max_leaves_per_tree,
                "Aggregation job started"
            );
        }

        // 3. Calendar (aggregation roots into cal blocks)
        {
            let job = CalendarJob::new(
                Arc::clone(&self.calendar),
                Arc::clone(&self.roots),
                Arc::clone(&self.broker),
                self.scheduler.clone(),
                self.stack_uri.clone(),
                self.config.calendar.interval,
            )
            .with_publish_retry(self.config.broker_retry);
            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                job.run(shutdown_rx).await;
            }));
            tracing::info!(
                interval_ms = self.config.calendar.interval.as_millis() as u64,
                "Calendar job started"
            );
        }

        // 4. NIST beacon
        {
            let job = NistJob::new(
                Arc::clone(&self.calendar),
                self.beacon.clone(),
                self.scheduler.clone(),
                self.config.nist.interval,
            );
            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                job.run(shutdown_rx).await;
            }));
            tracing::info!(
                interval_ms = self.config.nist.interval.as_millis() as u64,
                "NIST job started"
            );
        }

        // 5. Anchor rollups (per enabled chain)
        for chain in AnchorChain::ALL {
            let chain_config = self.config.anchor.for_chain(chain);
            if !chain_config.enabled {
                tracing::info!(chain = %chain, "Anchor job disabled");
                continue;
            }
            let job = AnchorJob::new(Arc::clone(&self.coordinator), chain);
            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                job.run(shutdown_rx).await;
            }));
            tracing::info!(
                chain = %chain,
                interval_ms = chain_config.interval.as_millis() as u64,
                min_interval_ms = chain_config.min_interval.as_millis() as u64,
                "Anchor job started"
            );
        }

        tracing::info!(job_count = handles.len(), "Background jobs started");

        Ok(handles)
    }

    /// Signal all jobs to shutdown gracefully
    pub fn shutdown(&self) {
        tracing::info!("Signaling background jobs to shutdown");
        let _ = self.shutdown_tx.send(());
    }
}
