//! Proof paths
//!
//! Converts Merkle proofs into the canonical op list and splices segments
//! from successive rollup tiers into one continuous verifiable path.

pub mod composer;
pub mod ops;

pub use composer::{
    append_anchor_descriptor, append_block_hash_ops, concat, format_ops, ANCHOR_TYPE_CAL,
};
pub use ops::{AnchorDescriptor, ProofOp, ProofSegment};
