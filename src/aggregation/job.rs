// File: src/aggregation/job.rs

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::interval;

use super::buffer::StagingBuffer;
use super::config::AggregationConfig;
use super::leaf::Leaf;
use super::tree::{aggregate_batches, AggregationTree};
use crate::broker::settle;
use crate::error::ServerResult;
use crate::merkle::HashOp;
use crate::proof::format_ops;
use crate::traits::{MessageBroker, OutboundMessage, ProofTier, QUEUE_CALENDAR, QUEUE_PROOF_STATE};

/// Tier-1 aggregation job
///
/// Each interval drains the staged leaves, builds trees of bounded size and
/// publishes every leaf's proof segment followed by each tree's root. The
/// source deliveries are settled only after all publishes went through.
pub struct AggregationJob {
    buffer: Arc<StagingBuffer<Leaf>>,
    broker: Arc<dyn MessageBroker>,
    config: AggregationConfig,
}

impl AggregationJob {
    pub fn new(
        buffer: Arc<StagingBuffer<Leaf>>,
        broker: Arc<dyn MessageBroker>,
        config: AggregationConfig,
    ) -> Self {
        Self {
            buffer,
            broker,
            config,
        }
    }

    /// Run until shutdown signal is received via broadcast channel
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::warn!(error = %e, "Aggregation cycle failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Aggregation job shutting down");
                    break;
                }
            }
        }
    }

    /// One aggregation cycle; returns the number of trees finalized
    pub async fn run_once(&self) -> ServerResult<usize> {
        let drained = self.buffer.drain();
        if drained.is_empty() {
            return Ok(0);
        }

        let result = match aggregate_batches(&drained.items, self.config.max_leaves_per_tree) {
            Ok(trees) => self.finalize(&trees).await.map(|_| trees.len()),
            Err(e) => Err(e),
        };

        settle(self.broker.as_ref(), &drained.tags, result.as_ref().err()).await;

        if let Ok(count) = &result {
            tracing::info!(
                trees = count,
                leaves = drained.items.len(),
                "Aggregation cycle complete"
            );
        }
        result
    }

    /// Publish proof segments in tree-then-entry order, then every tree root
    ///
    /// Returns the number of proof segment messages published.
    pub async fn finalize(&self, trees: &[AggregationTree]) -> ServerResult<usize> {
        let mut segments = 0;
        for tree in trees {
            let root = tree.root_hex();
            for entry in &tree.proofs {
                self.broker
                    .publish(
                        QUEUE_PROOF_STATE,
                        OutboundMessage::ProofSegment {
                            tier: ProofTier::Aggregation,
                            entity_id: entry.hash_id.to_string(),
                            root: root.clone(),
                            ops: format_ops(&entry.proof, HashOp::Sha256),
                        },
                    )
                    .await?;
                segments += 1;
            }
        }

        for tree in trees {
            self.broker
                .publish(
                    QUEUE_CALENDAR,
                    OutboundMessage::AggregationRoot {
                        agg_id: tree.agg_id,
                        agg_root: tree.root_hex(),
                    },
                )
                .await?;
        }

        Ok(segments)
    }
}
