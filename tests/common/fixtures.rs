//! Test fixtures and stack setup utilities

#![allow(dead_code)]

use std::sync::Arc;

use calendar_server::aggregation::{AggregationConfig, AggregationJob, Leaf, StagingBuffer};
use calendar_server::anchoring::{AnchorChain, AnchorConfig, AnchoringCoordinator, ChainConfirmation};
use calendar_server::background::{CalendarJob, Dispatcher, PendingRoot};
use calendar_server::broker::ChannelBroker;
use calendar_server::calendar::{Block, BlockSigner, CalendarChain};
use calendar_server::lock::{LockConfig, LockScheduler, MemoryLockService};
use calendar_server::merkle::HashOp;
use calendar_server::proof::ProofSegment;
use calendar_server::storage::SqliteBlockStore;
use calendar_server::traits::{
    BrokerEvent, DistributedLock, MessageBroker, OutboundMessage, ProofTier,
};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const STACK_URI: &str = "https://a.cal.example";
pub const TX_PREFIX: &[u8] = b"\x01\x00\x00\x00anchor-tx";
pub const TX_SUFFIX: &[u8] = b"\x00\x00\x00\x00";

/// Signer shared by every replica of a test stack
pub fn test_signer() -> BlockSigner {
    BlockSigner::from_bytes(&[42u8; 32])
}

/// Calendar over a fresh in-memory store, genesis written
pub fn test_calendar() -> Arc<CalendarChain> {
    let store = Arc::new(SqliteBlockStore::in_memory().expect("Failed to create in-memory store"));
    let calendar = Arc::new(CalendarChain::new(store, test_signer(), "stack-test"));
    calendar.write_genesis().expect("Failed to write genesis");
    calendar
}

/// Lock settings for tests: no jitter, give up immediately when busy
pub fn test_scheduler(lock: Arc<dyn DistributedLock>) -> LockScheduler {
    LockScheduler::new(lock, LockConfig::immediate())
}

/// Anchoring config with both chains enabled and no minimum interval
pub fn eager_anchor_config() -> AnchorConfig {
    let mut config = AnchorConfig::default();
    config.btc.min_interval = Duration::ZERO;
    config.eth.enabled = true;
    config.eth.min_interval = Duration::ZERO;
    config
}

/// Deterministic leaves with distinct hashes
pub fn make_leaves(count: usize) -> Vec<Leaf> {
    (0..count)
        .map(|i| {
            let hash = HashOp::Sha256.digest(format!("document-{}", i).as_bytes());
            Leaf::new(Uuid::new_v4(), hash)
        })
        .collect()
}

/// Confirm an anchor block in a fake chain block with some other transactions
pub fn confirm_anchor(chain: AnchorChain, anchor: &Block, chain_height: u64) -> ChainConfirmation {
    let root = anchor.data_val_bytes();
    let raw_tx = [TX_PREFIX, root.as_slice(), TX_SUFFIX].concat();
    let anchor_tx = HashOp::Sha256x2.digest(&raw_tx);
    let block_txs = [
        HashOp::Sha256x2.digest(b"coinbase"),
        HashOp::Sha256x2.digest(b"payment-1"),
        anchor_tx,
        HashOp::Sha256x2.digest(b"payment-2"),
        HashOp::Sha256x2.digest(b"payment-3"),
    ];
    ChainConfirmation::from_block_transactions(
        chain,
        anchor.height,
        &root,
        TX_PREFIX,
        TX_SUFFIX,
        chain_height,
        &block_txs,
    )
    .expect("Failed to build confirmation")
}

/// One proof segment as published to the proof state queue
#[derive(Debug, Clone)]
pub struct PublishedSegment {
    pub tier: ProofTier,
    pub entity_id: String,
    pub root: String,
    pub ops: ProofSegment,
}

/// Pull every proof segment published so far
pub fn collect_segments(rx: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<PublishedSegment> {
    let mut segments = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let OutboundMessage::ProofSegment {
            tier,
            entity_id,
            root,
            ops,
        } = message
        {
            segments.push(PublishedSegment {
                tier,
                entity_id,
                root,
                ops,
            });
        }
    }
    segments
}

/// A full single-replica pipeline wired through an in-process broker
pub struct TestStack {
    pub calendar: Arc<CalendarChain>,
    pub broker: Arc<ChannelBroker>,
    pub events: mpsc::UnboundedReceiver<BrokerEvent>,
    pub leaves: Arc<StagingBuffer<Leaf>>,
    pub roots: Arc<StagingBuffer<PendingRoot>>,
    pub dispatcher: Dispatcher,
    pub aggregation: AggregationJob,
    pub calendar_job: CalendarJob,
    pub coordinator: Arc<AnchoringCoordinator>,
}

impl TestStack {
    pub fn new(max_leaves_per_tree: usize) -> Self {
        let calendar = test_calendar();
        let (broker, events) = ChannelBroker::new();
        let scheduler = test_scheduler(Arc::new(MemoryLockService::new()));
        let leaves = Arc::new(StagingBuffer::new());
        let roots = Arc::new(StagingBuffer::new());

        let coordinator = Arc::new(AnchoringCoordinator::new(
            calendar.clone(),
            broker.clone() as Arc<dyn MessageBroker>,
            scheduler.clone(),
            eager_anchor_config(),
            STACK_URI,
        )
        .with_publish_retry(Duration::from_millis(1)));
        let dispatcher = Dispatcher::new(
            leaves.clone(),
            roots.clone(),
            coordinator.clone(),
            broker.clone() as Arc<dyn MessageBroker>,
            Duration::ZERO,
        );
        let aggregation = AggregationJob::new(
            leaves.clone(),
            broker.clone() as Arc<dyn MessageBroker>,
            AggregationConfig {
                max_leaves_per_tree,
                ..Default::default()
            },
        );
        let calendar_job = CalendarJob::new(
            calendar.clone(),
            roots.clone(),
            broker.clone() as Arc<dyn MessageBroker>,
            scheduler,
            STACK_URI,
            Duration::from_secs(1),
        )
        .with_publish_retry(Duration::from_millis(1));

        Self {
            calendar,
            broker,
            events,
            leaves,
            roots,
            dispatcher,
            aggregation,
            calendar_job,
            coordinator,
        }
    }

    /// Hand every pending broker event to the dispatcher, waiting for
    /// confirmation tasks to settle
    pub async fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            if let Some(task) = self.dispatcher.handle(event).await {
                task.await.expect("confirmation task");
            }
            handled += 1;
        }
        handled
    }
}
