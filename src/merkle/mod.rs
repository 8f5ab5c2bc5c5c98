//! Ephemeral Merkle trees
//!
//! One tree is built per aggregation cycle and discarded once its root and
//! proofs have been extracted. The same builder serves all three rollup
//! tiers: leaf batching, calendar blocks and anchor roots.

pub mod hash;
pub mod tree;

pub use hash::HashOp;
pub use tree::{MerkleAggregator, ProofStep, TreeMode};
