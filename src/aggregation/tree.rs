// File: src/aggregation/tree.rs

use uuid::Uuid;

use super::leaf::Leaf;
use crate::error::ServerResult;
use crate::merkle::{HashOp, MerkleAggregator, ProofStep, TreeMode};

/// Proof of one leaf up to its aggregation root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafProof {
    pub hash_id: Uuid,
    pub hash: String,
    /// Starts with the `hash_id:<uuid>` literal, then the tree siblings
    pub proof: Vec<ProofStep>,
}

/// One tier-1 tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationTree {
    pub agg_id: Uuid,
    pub root: Vec<u8>,
    pub proofs: Vec<LeafProof>,
}

impl AggregationTree {
    pub fn root_hex(&self) -> String {
        hex::encode(&self.root)
    }
}

/// Build one tree over `leaves` in the given order
pub fn aggregate(leaves: &[Leaf]) -> ServerResult<AggregationTree> {
    let nodes = leaves
        .iter()
        .map(Leaf::node)
        .collect::<ServerResult<Vec<_>>>()?;

    let mut tree = MerkleAggregator::new(HashOp::Sha256);
    tree.add_leaves(&nodes);
    tree.build(TreeMode::Plain)?;

    let proofs = leaves
        .iter()
        .enumerate()
        .map(|(i, leaf)| -> ServerResult<LeafProof> {
            let mut proof = vec![ProofStep::Left(leaf.node_prefix().into_bytes())];
            proof.extend(tree.proof(i)?);
            Ok(LeafProof {
                hash_id: leaf.hash_id,
                hash: leaf.hash.clone(),
                proof,
            })
        })
        .collect::<ServerResult<Vec<_>>>()?;

    Ok(AggregationTree {
        agg_id: Uuid::new_v4(),
        root: tree.root()?.to_vec(),
        proofs,
    })
}

/// Split leaves into trees of at most `max_leaves` each, order preserved
pub fn aggregate_batches(leaves: &[Leaf], max_leaves: usize) -> ServerResult<Vec<AggregationTree>> {
    leaves.chunks(max_leaves.max(1)).map(aggregate).collect()
}
