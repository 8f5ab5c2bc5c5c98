// File: src/anchoring/chain.rs

use serde::{Deserialize, Serialize};

use crate::calendar::BlockType;
use crate::lock::LockKind;
use crate::traits::{ProofTier, QUEUE_BTC_TX, QUEUE_ETH_TX};

/// External blockchain the calendar anchors into
///
/// Both chains follow the same rollup and confirmation path; only the names differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorChain {
    Btc,
    Eth,
}

impl AnchorChain {
    pub const ALL: [AnchorChain; 2] = [AnchorChain::Btc, AnchorChain::Eth];

    /// Anchor descriptor type (`"btc"`, `"eth"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorChain::Btc => "btc",
            AnchorChain::Eth => "eth",
        }
    }

    pub fn anchor_block_type(&self) -> BlockType {
        match self {
            AnchorChain::Btc => BlockType::BtcAnchor,
            AnchorChain::Eth => BlockType::EthAnchor,
        }
    }

    pub fn confirm_block_type(&self) -> BlockType {
        match self {
            AnchorChain::Btc => BlockType::BtcConfirm,
            AnchorChain::Eth => BlockType::EthConfirm,
        }
    }

    pub fn anchor_lock(&self) -> LockKind {
        match self {
            AnchorChain::Btc => LockKind::BtcAnchor,
            AnchorChain::Eth => LockKind::EthAnchor,
        }
    }

    pub fn confirm_lock(&self) -> LockKind {
        match self {
            AnchorChain::Btc => LockKind::BtcConfirm,
            AnchorChain::Eth => LockKind::EthConfirm,
        }
    }

    pub fn anchor_tier(&self) -> ProofTier {
        match self {
            AnchorChain::Btc => ProofTier::BtcAnchor,
            AnchorChain::Eth => ProofTier::EthAnchor,
        }
    }

    pub fn confirm_tier(&self) -> ProofTier {
        match self {
            AnchorChain::Btc => ProofTier::BtcConfirm,
            AnchorChain::Eth => ProofTier::EthConfirm,
        }
    }

    /// Queue of the external transaction submission service
    pub fn tx_queue(&self) -> &'static str {
        match self {
            AnchorChain::Btc => QUEUE_BTC_TX,
            AnchorChain::Eth => QUEUE_ETH_TX,
        }
    }
}

impl std::fmt::Display for AnchorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
