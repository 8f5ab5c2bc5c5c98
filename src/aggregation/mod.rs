//! Tier-1 aggregation of client leaf hashes

mod buffer;
mod config;
mod job;
mod leaf;
mod tree;

pub use buffer::{Drained, StagingBuffer};
pub use config::AggregationConfig;
pub use job::AggregationJob;
pub use leaf::{Leaf, LEAF_HASH_LEN};
pub use tree::{aggregate, aggregate_batches, AggregationTree, LeafProof};
