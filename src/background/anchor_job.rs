// File: src/background/anchor_job.rs

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::interval;

use crate::anchoring::{AnchorChain, AnchoringCoordinator};
use crate::error::ServerError;

/// Periodic anchor rollup for one chain
pub struct AnchorJob {
    coordinator: Arc<AnchoringCoordinator>,
    chain: AnchorChain,
}

impl AnchorJob {
    pub fn new(coordinator: Arc<AnchoringCoordinator>, chain: AnchorChain) -> Self {
        Self { coordinator, chain }
    }

    /// Run until shutdown signal is received via broadcast channel
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.coordinator.config().for_chain(self.chain).interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.coordinator.rollup(self.chain).await {
                        Ok(_) => {}
                        // Nothing new to anchor is the idle steady state
                        Err(ServerError::Validation(msg)) => {
                            tracing::debug!(chain = %self.chain, reason = %msg, "Rollup aborted");
                        }
                        Err(e @ ServerError::ChainIntegrity(_)) => {
                            tracing::error!(chain = %self.chain, error = %e, "Rollup write rejected");
                        }
                        Err(e) => {
                            tracing::warn!(chain = %self.chain, error = %e, "Rollup failed");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(chain = %self.chain, "Anchor job shutting down");
                    break;
                }
            }
        }
    }
}
