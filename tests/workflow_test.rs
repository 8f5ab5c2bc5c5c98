//! End-to-end rollup workflow tests

mod common;

use common::*;

use calendar_server::aggregation::aggregate;
use calendar_server::anchoring::{AnchorChain, RollupOutcome};
use calendar_server::calendar::BlockType;
use calendar_server::lock::LockOutcome;
use calendar_server::proof::{concat, ProofOp};
use calendar_server::traits::{InboundMessage, OutboundMessage, ProofTier, QUEUE_BTC_TX, QUEUE_PROOF_STATE};

#[test]
fn test_tier_one_proof_lengths() {
    let single = aggregate(&make_leaves(1)).expect("aggregate one");
    let lengths: Vec<usize> = single.proofs.iter().map(|p| p.proof.len()).collect();
    assert_eq!(lengths, vec![1]);

    let three = aggregate(&make_leaves(3)).expect("aggregate three");
    let lengths: Vec<usize> = three.proofs.iter().map(|p| p.proof.len()).collect();
    assert_eq!(lengths, vec![3, 3, 2]);
}

#[tokio::test]
async fn test_leaf_to_chain_root_path() {
    let mut stack = TestStack::new(4096);
    let mut proof_rx = stack.broker.subscribe(QUEUE_PROOF_STATE).expect("subscribe");
    let mut tx_rx = stack.broker.subscribe(QUEUE_BTC_TX).expect("subscribe");

    let leaves = make_leaves(3);
    stack
        .broker
        .deliver(InboundMessage::LeafBatch {
            leaves: leaves.clone(),
        })
        .expect("deliver leaves");
    stack.pump().await;
    assert_eq!(stack.leaves.len(), 3);

    // Tier 1: the aggregation root loops back through the calendar queue
    assert_eq!(stack.aggregation.run_once().await.expect("aggregate"), 1);
    assert_eq!(stack.pump().await, 1);
    assert_eq!(stack.roots.len(), 1);

    // Calendar tier
    let cal = stack
        .calendar_job
        .run_once()
        .await
        .expect("calendar cycle")
        .expect("cal block written");
    assert_eq!(cal.block_type, BlockType::Cal);
    assert_eq!(cal.data_id, "0");

    // Anchor tier
    let anchor = match stack.coordinator.rollup(AnchorChain::Btc).await.expect("rollup") {
        LockOutcome::Completed(RollupOutcome::Anchored { anchor, included }) => {
            assert_eq!(included, 1);
            anchor
        }
        other => panic!("unexpected rollup outcome {:?}", other),
    };
    match tx_rx.try_recv().expect("anchor submission") {
        OutboundMessage::AnchorSubmission {
            chain, anchor_id, anchor_root,
        } => {
            assert_eq!(chain, AnchorChain::Btc);
            assert_eq!(anchor_id, anchor.height);
            assert_eq!(anchor_root, anchor.data_val);
        }
        other => panic!("unexpected message {:?}", other),
    }

    // Confirmation tier
    let confirmation = confirm_anchor(AnchorChain::Btc, &anchor, 840_000);
    let chain_root = confirmation.chain_root.clone();
    stack
        .broker
        .deliver(InboundMessage::BtcConfirmation(confirmation))
        .expect("deliver confirmation");
    stack.pump().await;

    let segments = collect_segments(&mut proof_rx);
    let of_tier = |tier: ProofTier| -> Vec<&PublishedSegment> {
        segments.iter().filter(|s| s.tier == tier).collect()
    };
    let agg = of_tier(ProofTier::Aggregation);
    let cal_segments = of_tier(ProofTier::Calendar);
    let anchor_segments = of_tier(ProofTier::BtcAnchor);
    let confirm_segments = of_tier(ProofTier::BtcConfirm);
    assert_eq!(agg.len(), 3);
    assert_eq!(cal_segments.len(), 1);
    assert_eq!(anchor_segments.len(), 1);
    assert_eq!(confirm_segments.len(), 1);

    assert_eq!(anchor_segments[0].entity_id, cal.height.to_string());
    assert_eq!(confirm_segments[0].entity_id, anchor.height.to_string());
    assert_eq!(cal_segments[0].root, cal.hash);
    assert_eq!(confirm_segments[0].root, chain_root);

    for (leaf, segment) in leaves.iter().zip(&agg) {
        assert_eq!(segment.entity_id, leaf.hash_id.to_string());

        let path = concat([
            segment.ops.clone(),
            cal_segments[0].ops.clone(),
            anchor_segments[0].ops.clone(),
            confirm_segments[0].ops.clone(),
        ]);
        let start = leaf.hash_bytes().expect("leaf hash");

        // Every tier boundary lands on the tier's root
        let agg_root = segment.ops.evaluate(&start).expect("evaluate");
        assert_eq!(hex::encode(&agg_root), segment.root);
        let block_hash = cal_segments[0].ops.evaluate(&agg_root).expect("evaluate");
        assert_eq!(hex::encode(&block_hash), cal.hash);
        let anchor_root = anchor_segments[0].ops.evaluate(&block_hash).expect("evaluate");
        assert_eq!(hex::encode(&anchor_root), anchor.data_val);

        let end = path.evaluate(&start).expect("evaluate full path");
        assert_eq!(hex::encode(end), chain_root);

        let anchor_types: Vec<&str> = path.anchors().map(|a| a.anchor_type.as_str()).collect();
        assert_eq!(anchor_types, vec!["cal", "btc"]);
    }

    // The calendar anchor points at the block's public hash
    let uris: Vec<String> = cal_segments[0]
        .ops
        .anchors()
        .flat_map(|a| a.uris.clone())
        .collect();
    assert_eq!(uris, vec![format!("{}/calendar/{}/hash", STACK_URI, cal.height)]);

    // The confirm block carries the chain height and root
    let confirm = stack.calendar.latest().expect("latest").expect("tip");
    assert_eq!(confirm.block_type, BlockType::BtcConfirm);
    assert_eq!(confirm.data_id, "840000");
    assert_eq!(confirm.data_val, chain_root);
    match confirm_segments[0].ops.ops().last() {
        Some(ProofOp::Anchors(a)) => {
            assert_eq!(a[0].anchor_id, "840000");
            assert_eq!(a[0].uris, vec![format!("{}/calendar/{}/data", STACK_URI, confirm.height)]);
        }
        other => panic!("expected anchor marker, got {:?}", other),
    }

    // Every delivery was settled along the way
    assert_eq!(stack.broker.unsettled_count(), 0);
    assert!(stack.leaves.is_empty());
    assert!(stack.roots.is_empty());

    let tip = stack.calendar.latest().expect("latest").expect("tip");
    assert_eq!(stack.calendar.verify_chain(0, tip.height).expect("verify"), tip.height + 1);
}

#[tokio::test]
async fn test_aggregation_emits_n_times_m_segments() {
    let n_trees = 3;
    let per_tree = 4;
    let mut stack = TestStack::new(per_tree);
    let mut proof_rx = stack.broker.subscribe(QUEUE_PROOF_STATE).expect("subscribe");

    for leaves in make_leaves(n_trees * per_tree).chunks(per_tree) {
        stack
            .broker
            .deliver(InboundMessage::LeafBatch {
                leaves: leaves.to_vec(),
            })
            .expect("deliver");
    }
    stack.pump().await;

    assert_eq!(stack.aggregation.run_once().await.expect("aggregate"), n_trees);
    let segments = collect_segments(&mut proof_rx);
    assert_eq!(segments.len(), n_trees * per_tree);
    assert!(segments.iter().all(|s| s.tier == ProofTier::Aggregation));

    // One root per tree loops back, then all roots share one cal block
    assert_eq!(stack.pump().await, n_trees);
    assert_eq!(stack.roots.len(), n_trees);
    let cal = stack
        .calendar_job
        .run_once()
        .await
        .expect("calendar cycle")
        .expect("cal block");
    let cal_segments = collect_segments(&mut proof_rx);
    assert_eq!(cal_segments.len(), n_trees);
    assert!(cal_segments.iter().all(|s| s.root == cal.hash));
    assert_eq!(stack.broker.unsettled_count(), 0);
}

#[tokio::test]
async fn test_cal_sequence_numbers_follow_previous_block() {
    let mut stack = TestStack::new(16);

    for expected in 0..3u64 {
        stack
            .broker
            .deliver(InboundMessage::LeafBatch {
                leaves: make_leaves(2),
            })
            .expect("deliver");
        stack.pump().await;
        stack.aggregation.run_once().await.expect("aggregate");
        stack.pump().await;

        let cal = stack
            .calendar_job
            .run_once()
            .await
            .expect("calendar cycle")
            .expect("cal block");
        assert_eq!(cal.data_id, expected.to_string());
    }

    // A nist block in between does not disturb the sequence
    stack
        .calendar
        .write_block(BlockType::Nist, "1700000000", "1700000000:abcdef")
        .expect("nist");
    stack
        .broker
        .deliver(InboundMessage::LeafBatch {
            leaves: make_leaves(1),
        })
        .expect("deliver");
    stack.pump().await;
    stack.aggregation.run_once().await.expect("aggregate");
    stack.pump().await;
    let cal = stack
        .calendar_job
        .run_once()
        .await
        .expect("calendar cycle")
        .expect("cal block");
    assert_eq!(cal.data_id, "3");
}

#[tokio::test]
async fn test_anchor_rollup_covers_only_new_cal_blocks() {
    let stack = TestStack::new(16);
    for i in 0..3u8 {
        stack
            .calendar
            .write_block(BlockType::Cal, &i.to_string(), &format!("{:02x}", i + 1).repeat(32))
            .expect("cal");
    }

    let first = match stack.coordinator.rollup(AnchorChain::Eth).await.expect("rollup") {
        LockOutcome::Completed(RollupOutcome::Anchored { anchor, included }) => {
            assert_eq!(included, 3);
            anchor
        }
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(first.block_type, BlockType::EthAnchor);
    assert_eq!(first.data_id, "3");

    // Nothing new: the rollup is rejected and nothing is written
    let result = stack.coordinator.rollup(AnchorChain::Eth).await;
    assert!(matches!(result, Err(calendar_server::ServerError::Validation(_))));

    let last = stack
        .calendar
        .write_block(BlockType::Cal, "3", &"aa".repeat(32))
        .expect("cal");
    let second = match stack.coordinator.rollup(AnchorChain::Eth).await.expect("rollup") {
        LockOutcome::Completed(RollupOutcome::Anchored { anchor, included }) => {
            assert_eq!(included, 1);
            anchor
        }
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(second.data_id, last.height.to_string());
}
