//! Message broker contract
//!
//! Inbound messages arrive as [`BrokerEvent`]s on a channel owned by the
//! consumer; each delivery must be settled exactly once with `ack` or `nack`.
//! A nacked or unsettled delivery is redelivered by the broker, possibly
//! after a reconnect.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregation::Leaf;
use crate::anchoring::{AnchorChain, ChainConfirmation};
use crate::error::ServerResult;
use crate::proof::ProofSegment;

/// Downstream proof-state store
pub const QUEUE_PROOF_STATE: &str = "proof_state";

/// Aggregation roots awaiting the calendar tier
pub const QUEUE_CALENDAR: &str = "calendar";

/// Bitcoin transaction submission service
pub const QUEUE_BTC_TX: &str = "btc_tx";

/// Ethereum transaction submission service
pub const QUEUE_ETH_TX: &str = "eth_tx";

/// Broker-assigned identifier of one delivery
pub type DeliveryTag = u64;

/// Messages consumed by this service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Client leaf hashes for tier-1 aggregation
    LeafBatch { leaves: Vec<Leaf> },

    /// Root of one tier-1 tree, for the calendar tier
    AggregationRoot { agg_id: Uuid, agg_root: String },

    /// Bitcoin monitor reports an anchor transaction confirmed
    BtcConfirmation(ChainConfirmation),

    /// Ethereum monitor reports an anchor transaction confirmed
    EthConfirmation(ChainConfirmation),
}

impl InboundMessage {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::LeafBatch { .. } => "leaf_batch",
            InboundMessage::AggregationRoot { .. } => "aggregation_root",
            InboundMessage::BtcConfirmation(_) => "btc_confirmation",
            InboundMessage::EthConfirmation(_) => "eth_confirmation",
        }
    }
}

/// Tier that produced a proof segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofTier {
    Aggregation,
    Calendar,
    BtcAnchor,
    BtcConfirm,
    EthAnchor,
    EthConfirm,
}

/// Messages published by this service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// One entity's proof ops for one tier
    ///
    /// `entity_id` is the hash id, aggregation id or block height the
    /// segment starts from; `root` is the value the segment ends at before
    /// any anchor marker.
    ProofSegment {
        tier: ProofTier,
        entity_id: String,
        root: String,
        ops: ProofSegment,
    },

    /// Tier-1 tree root handed to the calendar tier
    AggregationRoot { agg_id: Uuid, agg_root: String },

    /// Anchor root handed to an external transaction service
    AnchorSubmission {
        chain: AnchorChain,
        anchor_id: u64,
        anchor_root: String,
    },
}

/// Everything a consumer can observe on its inbound channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Delivery {
        tag: DeliveryTag,
        message: InboundMessage,
    },

    /// Connection lost: every unsettled delivery will come again
    Disconnected,

    Reconnected,
}

/// Publish and settle side of the broker
#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn publish(&self, queue: &str, message: OutboundMessage) -> ServerResult<()>;

    async fn ack(&self, tag: DeliveryTag) -> ServerResult<()>;

    /// Reject a delivery and ask for redelivery
    async fn nack(&self, tag: DeliveryTag) -> ServerResult<()>;
}
