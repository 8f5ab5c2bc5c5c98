//! Building and splicing proof segments

use super::ops::{AnchorDescriptor, ProofOp, ProofSegment};
use crate::calendar::Block;
use crate::merkle::{HashOp, ProofStep};

/// Anchor type of a calendar block anchor
pub const ANCHOR_TYPE_CAL: &str = "cal";

/// Convert a Merkle proof into ops: one literal then one hash op per step
pub fn format_ops(proof: &[ProofStep], hash_op: HashOp) -> ProofSegment {
    let mut segment = ProofSegment::new();
    for step in proof {
        let literal = match step {
            ProofStep::Left(v) => ProofOp::left(v),
            ProofStep::Right(v) => ProofOp::right(v),
        };
        segment.push(literal);
        segment.push(ProofOp::Op(hash_op));
    }
    segment
}

/// Extend a path ending at `block.data_val` up to `block.hash`
///
/// Mirrors the block hash derivation, so it only applies to blocks whose
/// `data_val` is a hex root.
pub fn append_block_hash_ops(segment: &mut ProofSegment, block: &Block) {
    segment.push(ProofOp::left(block.hash_prefix().as_bytes()));
    segment.push(ProofOp::Right(block.prev_hash.clone()));
    segment.push(ProofOp::Op(HashOp::Sha256));
}

/// Terminate a path with an anchor marker
pub fn append_anchor_descriptor(
    segment: &mut ProofSegment,
    anchor_type: &str,
    anchor_id: impl Into<String>,
    uris: Vec<String>,
) {
    segment.push(ProofOp::Anchors(vec![AnchorDescriptor {
        anchor_type: anchor_type.to_string(),
        anchor_id: anchor_id.into(),
        uris,
    }]));
}

/// Join segments left to right without reordering or deduplication
pub fn concat<I>(segments: I) -> ProofSegment
where
    I: IntoIterator<Item = ProofSegment>,
{
    segments
        .into_iter()
        .fold(ProofSegment::new(), |mut acc, segment| {
            acc.extend(segment);
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{BlockHeader, BlockType, BLOCK_VERSION, ZERO_HASH_HEX};
    use crate::merkle::{MerkleAggregator, TreeMode};

    fn block_over(root: &[u8]) -> Block {
        let data_val = hex::encode(root);
        let prev_hash = "ee".repeat(32);
        let header = BlockHeader {
            height: 4,
            time: 1_700_000_000_000,
            version: BLOCK_VERSION,
            stack_id: "stack-a",
            block_type: BlockType::Cal,
            data_id: "2",
            data_val: &data_val,
            prev_hash: &prev_hash,
        };
        let hash = header.compute_hash().unwrap();
        Block {
            height: 4,
            time: header.time,
            version: BLOCK_VERSION,
            stack_id: "stack-a".into(),
            block_type: BlockType::Cal,
            data_id: "2".into(),
            data_val,
            prev_hash,
            hash,
            sig: String::new(),
        }
    }

    #[test]
    fn test_format_ops_alternates_literal_and_op() {
        let proof = vec![ProofStep::Right(vec![1]), ProofStep::Left(vec![2])];
        let segment = format_ops(&proof, HashOp::Sha256);
        assert_eq!(
            segment.ops(),
            &[
                ProofOp::Right("01".into()),
                ProofOp::Op(HashOp::Sha256),
                ProofOp::Left("02".into()),
                ProofOp::Op(HashOp::Sha256),
            ]
        );
        assert!(format_ops(&[], HashOp::Sha256).is_empty());
    }

    #[test]
    fn test_leaf_path_reaches_block_hash() {
        let leaves: Vec<[u8; 32]> = (1..=5u8).map(|b| [b; 32]).collect();
        let mut tree = MerkleAggregator::new(HashOp::Sha256);
        tree.add_leaves(&leaves);
        tree.build(TreeMode::Plain).unwrap();
        let block = block_over(tree.root().unwrap());

        for (i, leaf) in leaves.iter().enumerate() {
            let mut segment = format_ops(&tree.proof(i).unwrap(), HashOp::Sha256);
            append_block_hash_ops(&mut segment, &block);
            append_anchor_descriptor(&mut segment, ANCHOR_TYPE_CAL, "4", vec![]);

            assert_eq!(
                segment.evaluate(leaf).unwrap(),
                block.hash_bytes().unwrap(),
                "leaf {i}"
            );
        }
    }

    #[test]
    fn test_block_hash_ops_shape() {
        let block = block_over(&[7u8; 32]);
        let mut segment = ProofSegment::new();
        append_block_hash_ops(&mut segment, &block);

        assert_eq!(
            segment.ops(),
            &[
                ProofOp::Left(hex::encode("4:1700000000000:1:stack-a:cal:2")),
                ProofOp::Right(block.prev_hash.clone()),
                ProofOp::Op(HashOp::Sha256),
            ]
        );
        assert_ne!(block.prev_hash, ZERO_HASH_HEX);
    }

    #[test]
    fn test_anchor_descriptor_is_terminal_marker() {
        let mut segment = ProofSegment::new();
        append_anchor_descriptor(
            &mut segment,
            ANCHOR_TYPE_CAL,
            "9",
            vec!["https://a.example/calendar/9/hash".into()],
        );
        let anchors: Vec<_> = segment.anchors().collect();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].anchor_type, "cal");
        assert_eq!(anchors[0].anchor_id, "9");
    }

    #[test]
    fn test_concat_preserves_order_and_duplicates() {
        let a = ProofSegment::from_ops(vec![ProofOp::left([1])]);
        let b = ProofSegment::from_ops(vec![ProofOp::left([1]), ProofOp::Op(HashOp::Sha256)]);
        let joined = concat([a.clone(), b.clone()]);

        assert_eq!(joined.len(), 3);
        assert_eq!(&joined.ops()[..1], a.ops());
        assert_eq!(&joined.ops()[1..], b.ops());
        assert!(concat(Vec::new()).is_empty());
    }
}
