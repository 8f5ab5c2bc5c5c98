// File: src/anchoring/coordinator.rs

use std::sync::Arc;
use std::time::Duration;

use super::chain::AnchorChain;
use super::config::AnchorConfig;
use super::confirmation::ChainConfirmation;
use crate::broker::{publish_until_accepted, DEFAULT_PUBLISH_RETRY};
use crate::calendar::{Block, CalendarChain};
use crate::error::{ServerError, ServerResult};
use crate::lock::{HeldLease, LockOutcome, LockScheduler};
use crate::merkle::{HashOp, MerkleAggregator, TreeMode};
use crate::proof::{append_anchor_descriptor, format_ops};
use crate::traits::{MessageBroker, OutboundMessage, QUEUE_PROOF_STATE};

/// Result of one rollup attempt that held the lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollupOutcome {
    /// The last anchor is younger than the minimum interval; nothing was written
    Skipped,

    /// An anchor block was written over `included` cal blocks
    Anchored { anchor: Block, included: usize },
}

/// Periodic anchor rollups and confirmation ingestion for every chain
pub struct AnchoringCoordinator {
    calendar: Arc<CalendarChain>,
    broker: Arc<dyn MessageBroker>,
    scheduler: LockScheduler,
    config: AnchorConfig,
    stack_uri: String,
    publish_retry: Duration,
}

impl AnchoringCoordinator {
    pub fn new(
        calendar: Arc<CalendarChain>,
        broker: Arc<dyn MessageBroker>,
        scheduler: LockScheduler,
        config: AnchorConfig,
        stack_uri: impl Into<String>,
    ) -> Self {
        Self {
            calendar,
            broker,
            scheduler,
            config,
            stack_uri: stack_uri.into().trim_end_matches('/').to_string(),
            publish_retry: DEFAULT_PUBLISH_RETRY,
        }
    }

    /// Backoff between attempts to hand off a written anchor block
    pub fn with_publish_retry(mut self, backoff: Duration) -> Self {
        self.publish_retry = backoff;
        self
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Roll every `cal` block since the last anchor into a new anchor block
    ///
    /// Runs under the chain's anchor lock. Once the anchor block is written,
    /// the per-block segments and the submission are retried until the
    /// broker accepts them: the next rollup starts after this one's reference
    /// height and never revisits these `cal` blocks.
    ///
    /// # Errors
    /// * `ServerError::Validation` - no `cal` block since the last anchor
    /// * `ServerError::ChainIntegrity` - the anchor block could not be linked
    pub async fn rollup(&self, chain: AnchorChain) -> ServerResult<LockOutcome<RollupOutcome>> {
        self.scheduler
            .run_leased(chain.anchor_lock(), |lease| self.rollup_locked(lease, chain))
            .await?
            .transpose()
    }

    async fn rollup_locked(&self, lease: HeldLease, chain: AnchorChain) -> ServerResult<RollupOutcome> {
        let block_type = chain.anchor_block_type();
        let last = self.calendar.blocking(move |c| c.latest_of_type(block_type)).await?;

        if let Some(last) = &last {
            let age_ms = chrono::Utc::now().timestamp_millis() - last.time;
            if age_ms < self.config.for_chain(chain).min_interval.as_millis() as i64 {
                tracing::debug!(
                    chain = %chain,
                    last_anchor = last.height,
                    age_ms,
                    "Last anchor too recent, skipping rollup"
                );
                return Ok(RollupOutcome::Skipped);
            }
        }

        let reference = last
            .as_ref()
            .map(|b| {
                b.data_id.parse::<u64>().map_err(|_| {
                    ServerError::ChainIntegrity(format!(
                        "anchor block {} has non-numeric reference height '{}'",
                        b.height, b.data_id
                    ))
                })
            })
            .transpose()?;

        let cal_blocks = self
            .calendar
            .blocking(move |c| c.cal_blocks_after(reference))
            .await?;
        let Some(last_cal) = cal_blocks.last() else {
            return Err(ServerError::Validation(format!(
                "no cal blocks to anchor into {} since height {:?}",
                chain, reference
            )));
        };

        let hashes = cal_blocks
            .iter()
            .map(Block::hash_bytes)
            .collect::<ServerResult<Vec<_>>>()?;
        let mut tree = MerkleAggregator::new(HashOp::Sha256);
        tree.add_leaves(&hashes);
        tree.build(TreeMode::Plain)?;
        let root = hex::encode(tree.root()?);

        let data_id = last_cal.height.to_string();
        let data_val = root.clone();
        let anchor = self
            .scheduler
            .write_ledger(
                &lease,
                self.calendar
                    .blocking(move |c| c.write_block(block_type, &data_id, &data_val)),
            )
            .await?;

        for (i, cal) in cal_blocks.iter().enumerate() {
            publish_until_accepted(
                self.broker.as_ref(),
                QUEUE_PROOF_STATE,
                OutboundMessage::ProofSegment {
                    tier: chain.anchor_tier(),
                    entity_id: cal.height.to_string(),
                    root: root.clone(),
                    ops: format_ops(&tree.proof(i)?, HashOp::Sha256),
                },
                self.publish_retry,
            )
            .await?;
        }

        publish_until_accepted(
            self.broker.as_ref(),
            chain.tx_queue(),
            OutboundMessage::AnchorSubmission {
                chain,
                anchor_id: anchor.height,
                anchor_root: root,
            },
            self.publish_retry,
        )
        .await?;

        tracing::info!(
            chain = %chain,
            height = anchor.height,
            included = cal_blocks.len(),
            "Anchor rollup written"
        );
        Ok(RollupOutcome::Anchored {
            included: cal_blocks.len(),
            anchor,
        })
    }

    /// Record a confirmed anchor transaction and publish the closing segment
    ///
    /// Runs under the chain's confirm lock. Returns the confirm block. A
    /// failed publish is returned as is; the redelivered confirmation reuses
    /// the block written the first time.
    ///
    /// # Errors
    /// * `ServerError::Validation` - unknown anchor, or the proof does not check out
    pub async fn ingest_confirmation(
        &self,
        confirmation: &ChainConfirmation,
    ) -> ServerResult<LockOutcome<Block>> {
        self.scheduler
            .run_leased(confirmation.chain.confirm_lock(), |lease| {
                self.ingest_locked(lease, confirmation)
            })
            .await?
            .transpose()
    }

    async fn ingest_locked(
        &self,
        lease: HeldLease,
        confirmation: &ChainConfirmation,
    ) -> ServerResult<Block> {
        let chain = confirmation.chain;
        let anchor_height = confirmation.anchor_height;
        let anchor = self
            .calendar
            .blocking(move |c| c.by_height(anchor_height))
            .await?
            .filter(|b| b.block_type == chain.anchor_block_type())
            .ok_or_else(|| {
                ServerError::Validation(format!(
                    "no {} block at height {}",
                    chain.anchor_block_type(),
                    anchor_height
                ))
            })?;

        confirmation.verify(&anchor.data_val_bytes())?;

        let chain_height = confirmation.chain_height.to_string();
        let chain_root = confirmation.chain_root.to_lowercase();

        let confirm = {
            let (data_id, data_val) = (chain_height.clone(), chain_root.clone());
            self.scheduler
                .write_ledger(
                    &lease,
                    self.calendar.blocking(move |c| {
                        let block_type = chain.confirm_block_type();
                        // A redelivered confirmation reuses the block written the first time
                        match c.latest_of_type(block_type)? {
                            Some(b) if b.data_id == data_id && b.data_val == data_val => Ok(b),
                            _ => c.write_block(block_type, &data_id, &data_val),
                        }
                    }),
                )
                .await?
        };

        let mut segment = confirmation.segment()?;
        append_anchor_descriptor(
            &mut segment,
            chain.as_str(),
            chain_height,
            vec![format!("{}/calendar/{}/data", self.stack_uri, confirm.height)],
        );

        self.broker
            .publish(
                QUEUE_PROOF_STATE,
                OutboundMessage::ProofSegment {
                    tier: chain.confirm_tier(),
                    entity_id: anchor.height.to_string(),
                    root: chain_root,
                    ops: segment,
                },
            )
            .await?;

        tracing::info!(
            chain = %chain,
            height = confirm.height,
            anchor_height = anchor.height,
            chain_height = confirmation.chain_height,
            "Anchor confirmation recorded"
        );
        Ok(confirm)
    }
}
