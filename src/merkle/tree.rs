//! Merkle tree construction and proof extraction

use super::hash::HashOp;
use crate::error::{ServerError, ServerResult};

/// How an unpaired trailing node is handled at a level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeMode {
    /// Carry the unpaired node upward unhashed until it finds a partner
    Plain,

    /// Pair the unpaired node with a copy of itself (Bitcoin block Merkle root)
    ChainCompatible,
}

/// One step of a Merkle proof, leaf to root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofStep {
    /// The operand is the left input of this level's hash
    Left(Vec<u8>),

    /// The operand is the right input of this level's hash
    Right(Vec<u8>),
}

impl ProofStep {
    /// The operand bytes regardless of side
    pub fn value(&self) -> &[u8] {
        match self {
            ProofStep::Left(v) | ProofStep::Right(v) => v,
        }
    }
}

/// Builds one Merkle tree per cycle from an ordered list of leaves
///
/// Leaf order is significant: both the root and every proof index depend on
/// it, so leaves are kept exactly as added. Not re-entrant.
#[derive(Debug)]
pub struct MerkleAggregator {
    hash_op: HashOp,
    leaves: Vec<Vec<u8>>,
    /// levels[0] is the leaves, the last level holds only the root
    levels: Option<Vec<Vec<Vec<u8>>>>,
    mode: TreeMode,
}

impl MerkleAggregator {
    /// Create an empty aggregator combining nodes with `hash_op`
    pub fn new(hash_op: HashOp) -> Self {
        Self {
            hash_op,
            leaves: Vec::new(),
            levels: None,
            mode: TreeMode::Plain,
        }
    }

    /// Hash operation used to combine sibling pairs
    pub fn hash_op(&self) -> HashOp {
        self.hash_op
    }

    /// Discard any leaves and tree state
    pub fn reset(&mut self) {
        self.leaves.clear();
        self.levels = None;
    }

    /// Append leaves in caller order
    ///
    /// Invalidates a previously built tree.
    pub fn add_leaves<I, L>(&mut self, leaves: I)
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        self.leaves
            .extend(leaves.into_iter().map(|l| l.as_ref().to_vec()));
        self.levels = None;
    }

    /// Number of leaves added since the last reset
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Build the tree bottom-up, hashing sibling pairs left to right
    pub fn build(&mut self, mode: TreeMode) -> ServerResult<()> {
        if self.leaves.is_empty() {
            return Err(ServerError::EmptyTree);
        }

        let mut levels = vec![self.leaves.clone()];

        while let Some(prev) = levels.last() {
            if prev.len() <= 1 {
                break;
            }

            let mut next = Vec::with_capacity(prev.len().div_ceil(2));
            for pair in prev.chunks(2) {
                match pair {
                    [left, right] => next.push(self.hash_op.combine(left, right).to_vec()),
                    [single] => match mode {
                        TreeMode::Plain => next.push(single.clone()),
                        TreeMode::ChainCompatible => {
                            next.push(self.hash_op.combine(single, single).to_vec())
                        }
                    },
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                }
            }
            levels.push(next);
        }

        self.mode = mode;
        self.levels = Some(levels);
        Ok(())
    }

    /// Mode of the last build
    pub fn mode(&self) -> TreeMode {
        self.mode
    }

    /// Top hash of the built tree
    ///
    /// For a one-leaf tree the root is the leaf itself.
    pub fn root(&self) -> ServerResult<&[u8]> {
        let levels = self.built_levels()?;
        levels
            .last()
            .and_then(|top| top.first())
            .map(Vec::as_slice)
            .ok_or(ServerError::EmptyTree)
    }

    /// Ordered sibling list from leaf `index` up to the root
    pub fn proof(&self, index: usize) -> ServerResult<Vec<ProofStep>> {
        let levels = self.built_levels()?;
        let leaf_count = levels[0].len();
        if index >= leaf_count {
            return Err(ServerError::LeafIndexOutOfBounds { index, leaf_count });
        }

        let mut steps = Vec::new();
        let mut idx = index;

        for level in &levels[..levels.len() - 1] {
            if idx % 2 == 1 {
                steps.push(ProofStep::Left(level[idx - 1].clone()));
            } else if idx + 1 < level.len() {
                steps.push(ProofStep::Right(level[idx + 1].clone()));
            } else if self.mode == TreeMode::ChainCompatible {
                steps.push(ProofStep::Right(level[idx].clone()));
            }
            // Plain mode: unpaired node carries up with no step at this level
            idx /= 2;
        }

        Ok(steps)
    }

    fn built_levels(&self) -> ServerResult<&Vec<Vec<Vec<u8>>>> {
        self.levels
            .as_ref()
            .ok_or_else(|| ServerError::Computation("Merkle tree has not been built".into()))
    }
}
