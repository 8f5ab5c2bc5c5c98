//! Trait definitions for storage, locking and messaging

pub mod broker;
pub mod lock;
pub mod storage;

pub use broker::{
    BrokerEvent, DeliveryTag, InboundMessage, MessageBroker, OutboundMessage, ProofTier,
    QUEUE_BTC_TX, QUEUE_CALENDAR, QUEUE_ETH_TX, QUEUE_PROOF_STATE,
};
pub use lock::{DistributedLock, LockAcquisition, LockToken};
pub use storage::BlockStore;
