// File: src/background/calendar_job.rs

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use uuid::Uuid;

use crate::aggregation::StagingBuffer;
use crate::broker::{publish_until_accepted, settle, DEFAULT_PUBLISH_RETRY};
use crate::calendar::{Block, BlockType, CalendarChain};
use crate::error::{ServerError, ServerResult};
use crate::lock::{HeldLease, LockKind, LockOutcome, LockScheduler};
use crate::merkle::{HashOp, MerkleAggregator, TreeMode};
use crate::proof::{append_anchor_descriptor, append_block_hash_ops, format_ops, ANCHOR_TYPE_CAL};
use crate::traits::{MessageBroker, OutboundMessage, ProofTier, QUEUE_PROOF_STATE};

/// Aggregation root waiting for the next `cal` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRoot {
    pub agg_id: Uuid,
    /// Hex encoded
    pub root: String,
}

/// Calendar tier job
///
/// Each interval, under the `calendar` lock, rolls the staged aggregation
/// roots into one `cal` block and publishes a segment per root from the
/// aggregation root up to the block hash. When the lock is busy the roots
/// stay staged for the next interval.
///
/// Source deliveries are nacked only when the block was not written. Once it
/// is, segment publishing retries until the broker accepts and the roots are
/// acked.
pub struct CalendarJob {
    calendar: Arc<CalendarChain>,
    roots: Arc<StagingBuffer<PendingRoot>>,
    broker: Arc<dyn MessageBroker>,
    scheduler: LockScheduler,
    stack_uri: String,
    interval: Duration,
    publish_retry: Duration,
}

impl CalendarJob {
    pub fn new(
        calendar: Arc<CalendarChain>,
        roots: Arc<StagingBuffer<PendingRoot>>,
        broker: Arc<dyn MessageBroker>,
        scheduler: LockScheduler,
        stack_uri: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            calendar,
            roots,
            broker,
            scheduler,
            stack_uri: stack_uri.into().trim_end_matches('/').to_string(),
            interval,
            publish_retry: DEFAULT_PUBLISH_RETRY,
        }
    }

    /// Backoff between attempts to publish segments for a written block
    pub fn with_publish_retry(mut self, backoff: Duration) -> Self {
        self.publish_retry = backoff;
        self
    }

    /// Run until shutdown signal is received via broadcast channel
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::warn!(error = %e, code = e.error_code(), "Calendar cycle failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Calendar job shutting down");
                    break;
                }
            }
        }
    }

    /// One calendar cycle; returns the `cal` block written, if any
    pub async fn run_once(&self) -> ServerResult<Option<Block>> {
        if self.roots.is_empty() {
            return Ok(None);
        }

        let outcome = self
            .scheduler
            .run_leased(LockKind::Calendar, |lease| async move {
                let drained = self.roots.drain();
                if drained.is_empty() {
                    return Ok(None);
                }

                let (block, tree) = match self.write_cal(&lease, &drained.items).await {
                    Ok(written) => written,
                    Err(e) => {
                        settle(self.broker.as_ref(), &drained.tags, Some(&e)).await;
                        return Err(e);
                    }
                };

                // The roots are in the ledger now; redelivery would write them twice
                let published = self.publish_segments(&drained.items, &block, &tree).await;
                settle(self.broker.as_ref(), &drained.tags, None).await;
                published.map(|()| Some(block))
            })
            .await?;

        match outcome {
            LockOutcome::Completed(result) => result,
            LockOutcome::Busy => Ok(None),
        }
    }

    async fn write_cal(
        &self,
        lease: &HeldLease,
        roots: &[PendingRoot],
    ) -> ServerResult<(Block, MerkleAggregator)> {
        let leaves = roots
            .iter()
            .map(|r| hex::decode(&r.root))
            .collect::<Result<Vec<_>, _>>()?;
        let mut tree = MerkleAggregator::new(HashOp::Sha256);
        tree.add_leaves(&leaves);
        tree.build(TreeMode::Plain)?;
        let root = hex::encode(tree.root()?);

        let block = self
            .scheduler
            .write_ledger(
                lease,
                self.calendar.blocking(move |calendar| {
                    let data_id = next_sequence(calendar)?;
                    calendar.write_block(BlockType::Cal, &data_id.to_string(), &root)
                }),
            )
            .await?;
        Ok((block, tree))
    }

    async fn publish_segments(
        &self,
        roots: &[PendingRoot],
        block: &Block,
        tree: &MerkleAggregator,
    ) -> ServerResult<()> {
        let uri = format!("{}/calendar/{}/hash", self.stack_uri, block.height);
        for (i, pending) in roots.iter().enumerate() {
            let mut segment = format_ops(&tree.proof(i)?, HashOp::Sha256);
            append_block_hash_ops(&mut segment, block);
            append_anchor_descriptor(
                &mut segment,
                ANCHOR_TYPE_CAL,
                block.height.to_string(),
                vec![uri.clone()],
            );

            publish_until_accepted(
                self.broker.as_ref(),
                QUEUE_PROOF_STATE,
                OutboundMessage::ProofSegment {
                    tier: ProofTier::Calendar,
                    entity_id: pending.agg_id.to_string(),
                    root: block.hash.clone(),
                    ops: segment,
                },
                self.publish_retry,
            )
            .await?;
        }

        tracing::info!(
            height = block.height,
            data_id = %block.data_id,
            roots = roots.len(),
            "Calendar block written"
        );
        Ok(())
    }
}

/// Calendar sequence number for the next `cal` block
fn next_sequence(calendar: &CalendarChain) -> ServerResult<u64> {
    match calendar.latest_of_type(BlockType::Cal)? {
        None => Ok(0),
        Some(last) => last.data_id.parse::<u64>().map(|n| n + 1).map_err(|_| {
            ServerError::ChainIntegrity(format!(
                "cal block {} has non-numeric data_id '{}'",
                last.height, last.data_id
            ))
        }),
    }
}
