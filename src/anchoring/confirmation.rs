// File: src/anchoring/confirmation.rs

use serde::{Deserialize, Serialize};

use super::chain::AnchorChain;
use crate::error::{ServerError, ServerResult};
use crate::merkle::{HashOp, MerkleAggregator, TreeMode};
use crate::proof::{concat, format_ops, ProofOp, ProofSegment};

/// An anchor transaction confirmed in an external chain block
///
/// The transaction embeds the anchor root between `tx_prefix` and
/// `tx_suffix`; `path` proves the transaction id up to the block's
/// Merkle root. All byte fields are hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfirmation {
    pub chain: AnchorChain,

    /// Height of the calendar anchor block this transaction carries
    pub anchor_height: u64,

    pub tx_id: String,
    pub tx_prefix: String,
    pub tx_suffix: String,

    /// External chain block height
    pub chain_height: u64,

    /// External chain block Merkle root
    pub chain_root: String,

    /// Ops from `tx_id` to `chain_root`
    pub path: ProofSegment,
}

impl ChainConfirmation {
    /// Build a confirmation from the confirming block's ordered transaction ids
    ///
    /// The path is computed with the chain's own Merkle algorithm (double
    /// SHA-256, trailing node paired with itself).
    ///
    /// # Errors
    /// * `ServerError::Validation` - the anchor transaction is not in `block_tx_ids`
    pub fn from_block_transactions(
        chain: AnchorChain,
        anchor_height: u64,
        anchor_root: &[u8],
        tx_prefix: &[u8],
        tx_suffix: &[u8],
        chain_height: u64,
        block_tx_ids: &[[u8; 32]],
    ) -> ServerResult<Self> {
        let tx_id = tx_head(tx_prefix, tx_suffix).evaluate(anchor_root)?;

        let index = block_tx_ids
            .iter()
            .position(|id| id.as_slice() == tx_id.as_slice())
            .ok_or_else(|| {
                ServerError::Validation(format!(
                    "anchor transaction {} not found in {} block {}",
                    hex::encode(&tx_id),
                    chain,
                    chain_height
                ))
            })?;

        let mut tree = MerkleAggregator::new(HashOp::Sha256x2);
        tree.add_leaves(block_tx_ids);
        tree.build(TreeMode::ChainCompatible)?;

        Ok(Self {
            chain,
            anchor_height,
            tx_id: hex::encode(&tx_id),
            tx_prefix: hex::encode(tx_prefix),
            tx_suffix: hex::encode(tx_suffix),
            chain_height,
            chain_root: hex::encode(tree.root()?),
            path: format_ops(&tree.proof(index)?, HashOp::Sha256x2),
        })
    }

    /// Full segment from the anchor root to the chain root
    pub fn segment(&self) -> ServerResult<ProofSegment> {
        Ok(concat([self.head()?, self.path.clone()]))
    }

    /// Check the segment against an anchor root
    ///
    /// # Errors
    /// * `ServerError::Validation` - the transaction does not hash to `tx_id`,
    ///   or the path does not end at `chain_root`
    pub fn verify(&self, anchor_root: &[u8]) -> ServerResult<()> {
        let tx_id = self.head()?.evaluate(anchor_root)?;
        if hex::encode(&tx_id) != self.tx_id.to_lowercase() {
            return Err(ServerError::Validation(format!(
                "{} transaction for anchor {} does not hash to {}",
                self.chain, self.anchor_height, self.tx_id
            )));
        }

        let root = self.path.evaluate(&tx_id)?;
        if hex::encode(root) != self.chain_root.to_lowercase() {
            return Err(ServerError::Validation(format!(
                "{} path for anchor {} does not reach chain root at height {}",
                self.chain, self.anchor_height, self.chain_height
            )));
        }
        Ok(())
    }

    fn head(&self) -> ServerResult<ProofSegment> {
        Ok(tx_head(&hex::decode(&self.tx_prefix)?, &hex::decode(&self.tx_suffix)?))
    }
}

fn tx_head(tx_prefix: &[u8], tx_suffix: &[u8]) -> ProofSegment {
    ProofSegment::from_ops(vec![
        ProofOp::left(tx_prefix),
        ProofOp::right(tx_suffix),
        ProofOp::Op(HashOp::Sha256x2),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: [u8; 32] = [0x5a; 32];

    fn block_with_anchor_tx(position: usize, total: usize) -> Vec<[u8; 32]> {
        let raw_tx = [b"prefix".as_slice(), ROOT.as_slice(), b"suffix".as_slice()].concat();
        let tx = HashOp::Sha256x2.digest(&raw_tx);
        (0..total)
            .map(|i| if i == position { tx } else { [i as u8; 32] })
            .collect()
    }

    #[test]
    fn test_built_confirmation_verifies() {
        for (position, total) in [(0, 1), (2, 3), (4, 7), (7, 8)] {
            let txs = block_with_anchor_tx(position, total);
            let c = ChainConfirmation::from_block_transactions(
                AnchorChain::Btc,
                12,
                &ROOT,
                b"prefix",
                b"suffix",
                800_000,
                &txs,
            )
            .unwrap();

            c.verify(&ROOT).unwrap();
            let end = c.segment().unwrap().evaluate(&ROOT).unwrap();
            assert_eq!(hex::encode(end), c.chain_root);
        }
    }

    #[test]
    fn test_missing_transaction_rejected() {
        let txs = vec![[1u8; 32], [2u8; 32]];
        let result = ChainConfirmation::from_block_transactions(
            AnchorChain::Eth,
            1,
            &ROOT,
            b"p",
            b"s",
            10,
            &txs,
        );
        assert!(matches!(result, Err(ServerError::Validation(_))));
    }

    #[test]
    fn test_wrong_root_or_path_rejected() {
        let txs = block_with_anchor_tx(1, 4);
        let good = ChainConfirmation::from_block_transactions(
            AnchorChain::Btc,
            3,
            &ROOT,
            b"prefix",
            b"suffix",
            5,
            &txs,
        )
        .unwrap();

        assert!(matches!(good.verify(&[0u8; 32]), Err(ServerError::Validation(_))));

        let mut bad_root = good.clone();
        bad_root.chain_root = "00".repeat(32);
        assert!(matches!(bad_root.verify(&ROOT), Err(ServerError::Validation(_))));
    }

    #[test]
    fn test_segment_starts_with_transaction_ops() {
        let txs = block_with_anchor_tx(0, 2);
        let c = ChainConfirmation::from_block_transactions(
            AnchorChain::Btc,
            3,
            &ROOT,
            b"prefix",
            b"suffix",
            5,
            &txs,
        )
        .unwrap();
        let segment = c.segment().unwrap();
        assert_eq!(
            &segment.ops()[..3],
            &[
                ProofOp::Left(hex::encode(b"prefix")),
                ProofOp::Right(hex::encode(b"suffix")),
                ProofOp::Op(HashOp::Sha256x2),
            ]
        );
        assert_eq!(segment.len(), 3 + c.path.len());
    }
}
