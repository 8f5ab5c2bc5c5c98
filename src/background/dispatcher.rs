// File: src/background/dispatcher.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::calendar_job::PendingRoot;
use crate::aggregation::{Leaf, StagingBuffer};
use crate::anchoring::{AnchorChain, AnchoringCoordinator, ChainConfirmation};
use crate::error::{ServerError, ServerResult};
use crate::lock::LockOutcome;
use crate::traits::{BrokerEvent, DeliveryTag, InboundMessage, MessageBroker};

/// Routes inbound broker events to the staging buffers and the coordinator
///
/// Leaves and aggregation roots are only staged here; they are settled by
/// the job that rolls them up. Confirmations are ingested on their own task,
/// which settles the delivery, so a confirmation waiting on its lock never
/// holds up the rest of the stream.
pub struct Dispatcher {
    leaves: Arc<StagingBuffer<Leaf>>,
    roots: Arc<StagingBuffer<PendingRoot>>,
    coordinator: Arc<AnchoringCoordinator>,
    broker: Arc<dyn MessageBroker>,
    retry: Duration,
}

impl Dispatcher {
    pub fn new(
        leaves: Arc<StagingBuffer<Leaf>>,
        roots: Arc<StagingBuffer<PendingRoot>>,
        coordinator: Arc<AnchoringCoordinator>,
        broker: Arc<dyn MessageBroker>,
        retry: Duration,
    ) -> Self {
        Self {
            leaves,
            roots,
            coordinator,
            broker,
            retry,
        }
    }

    /// Consume events until the channel closes or shutdown is signalled
    ///
    /// Confirmation tasks still running at that point are awaited.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<BrokerEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::warn!("Broker event channel closed");
                        break;
                    };
                    if let Some(task) = self.handle(event).await {
                        in_flight.retain(|t| !t.is_finished());
                        in_flight.push(task);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Dispatcher shutting down");
                    break;
                }
            }
        }

        for task in in_flight {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Confirmation task ended abnormally");
            }
        }
    }

    /// Handle one event; returns the task ingesting a confirmation
    pub async fn handle(&self, event: BrokerEvent) -> Option<JoinHandle<()>> {
        match event {
            BrokerEvent::Delivery { tag, message } => {
                let kind = message.kind();
                let result = match message {
                    InboundMessage::LeafBatch { leaves } => self.stage_leaves(tag, leaves).await,
                    InboundMessage::AggregationRoot { agg_id, agg_root } => {
                        self.stage_root(tag, agg_id, agg_root)
                    }
                    InboundMessage::BtcConfirmation(c) => {
                        return Some(self.spawn_confirmation(tag, kind, AnchorChain::Btc, c));
                    }
                    InboundMessage::EthConfirmation(c) => {
                        return Some(self.spawn_confirmation(tag, kind, AnchorChain::Eth, c));
                    }
                };
                if let Err(e) = result {
                    reject(self.broker.as_ref(), self.retry, tag, kind, &e).await;
                }
            }
            BrokerEvent::Disconnected => {
                let leaves = self.leaves.clear();
                let roots = self.roots.clear();
                tracing::warn!(leaves, roots, "Broker disconnected, staged items discarded");
            }
            BrokerEvent::Reconnected => {
                tracing::info!("Broker reconnected");
            }
        }
        None
    }

    async fn stage_leaves(&self, tag: DeliveryTag, leaves: Vec<Leaf>) -> ServerResult<()> {
        for leaf in &leaves {
            leaf.hash_bytes()?;
        }
        if leaves.is_empty() {
            return self.broker.ack(tag).await;
        }
        self.leaves.extend(tag, leaves);
        Ok(())
    }

    fn stage_root(&self, tag: DeliveryTag, agg_id: Uuid, agg_root: String) -> ServerResult<()> {
        if agg_root.is_empty() {
            return Err(ServerError::InvalidHash(format!(
                "empty aggregation root for {}",
                agg_id
            )));
        }
        hex::decode(&agg_root)?;
        self.roots.push(
            tag,
            PendingRoot {
                agg_id,
                root: agg_root.to_lowercase(),
            },
        );
        Ok(())
    }

    fn spawn_confirmation(
        &self,
        tag: DeliveryTag,
        kind: &'static str,
        chain: AnchorChain,
        confirmation: ChainConfirmation,
    ) -> JoinHandle<()> {
        let coordinator = Arc::clone(&self.coordinator);
        let broker = Arc::clone(&self.broker);
        let retry = self.retry;

        tokio::spawn(async move {
            let result = confirm(&coordinator, broker.as_ref(), tag, chain, &confirmation).await;
            if let Err(e) = result {
                reject(broker.as_ref(), retry, tag, kind, &e).await;
            }
        })
    }
}

async fn confirm(
    coordinator: &AnchoringCoordinator,
    broker: &dyn MessageBroker,
    tag: DeliveryTag,
    chain: AnchorChain,
    confirmation: &ChainConfirmation,
) -> ServerResult<()> {
    if confirmation.chain != chain {
        return Err(ServerError::Validation(format!(
            "{} confirmation delivered as {}",
            confirmation.chain, chain
        )));
    }

    match coordinator.ingest_confirmation(confirmation).await? {
        LockOutcome::Completed(_) => broker.ack(tag).await,
        LockOutcome::Busy => Err(ServerError::TransientInfra(format!(
            "{} lock busy",
            chain.confirm_lock()
        ))),
    }
}

/// Settle a delivery that could not be handled
async fn reject(
    broker: &dyn MessageBroker,
    retry: Duration,
    tag: DeliveryTag,
    kind: &str,
    error: &ServerError,
) {
    let result = if error.should_redeliver() {
        tracing::warn!(tag, kind, error = %error, "Delivery failed, returning to broker");
        if error.is_recoverable() {
            tokio::time::sleep(retry).await;
        }
        broker.nack(tag).await
    } else {
        tracing::warn!(tag, kind, error = %error, "Dropping invalid delivery");
        broker.ack(tag).await
    };
    if let Err(e) = result {
        tracing::warn!(tag, error = %e, "Failed to settle delivery");
    }
}
