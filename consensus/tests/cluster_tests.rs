//! End-to-end runs of small in-process clusters for both variants.
//!
//! Members exchange real signed messages through an in-memory router, so
//! these cover validation, leader rotation, pacing and the commit rules
//! together.

mod common;

use common::Cluster;
use hotstuff_consensus::{CoreStatus, VariantKind};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Basic variant
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn basic_cluster_decides_in_agreement() {
    let cluster = Cluster::new(4, VariantKind::Basic);
    cluster.begin().await;

    assert!(
        cluster.wait_for_decisions(3, Duration::from_secs(20)).await,
        "basic cluster made no progress"
    );
    cluster.shutdown().await;
    cluster.assert_agreement();
    cluster.assert_ordered();

    for node in &cluster.nodes {
        let snap = node.core.snapshot().await;
        assert_eq!(snap.status, CoreStatus::Stopped);
        assert!(snap.decided >= 3);
        assert!(snap.locked_qc_view.is_some());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn basic_decisions_chain_to_their_parents() {
    let cluster = Cluster::new(4, VariantKind::Basic);
    cluster.begin().await;
    assert!(cluster.wait_for_decisions(3, Duration::from_secs(20)).await);
    cluster.shutdown().await;

    let committed = cluster.nodes[0].processor.committed();
    let (_, first) = &committed[0];
    assert_eq!(
        first.parent,
        hotstuff_messages::payload_hash(
            &hotstuff_crypto::Blake2bHasher,
            &hotstuff_messages::ConsensusPayload::genesis()
        )
        .unwrap()
    );
    assert!(!first.customer_data.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn basic_cluster_survives_a_crashed_member() {
    let cluster = Cluster::new(4, VariantKind::Basic);
    cluster.crash(3);
    cluster.begin().await;

    assert!(
        cluster.wait_for_decisions(2, Duration::from_secs(30)).await,
        "three of four members should still decide"
    );
    cluster.shutdown().await;
    cluster.assert_agreement();
    cluster.assert_ordered();
    assert!(cluster.nodes[3].processor.committed().is_empty());
}

// ---------------------------------------------------------------------------
// Chained variant
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chained_cluster_decides_in_agreement() {
    let cluster = Cluster::new(4, VariantKind::Chained);
    cluster.begin().await;

    assert!(
        cluster.wait_for_decisions(3, Duration::from_secs(20)).await,
        "chained cluster made no progress"
    );
    cluster.shutdown().await;
    cluster.assert_agreement();
    cluster.assert_ordered();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chained_cluster_survives_a_crashed_member() {
    // With strict rotation a commit needs four consecutive live leaders,
    // which one crash out of seven still leaves.
    let cluster = Cluster::new(7, VariantKind::Chained);
    cluster.crash(6);
    cluster.begin().await;

    assert!(
        cluster.wait_for_decisions(2, Duration::from_secs(40)).await,
        "six of seven members should still decide"
    );
    cluster.shutdown().await;
    cluster.assert_agreement();
    cluster.assert_ordered();
}

// ---------------------------------------------------------------------------
// View changes
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn silent_cluster_keeps_changing_views() {
    // Two of four down: no quorum, so only timeouts move the view.
    let cluster = Cluster::new(4, VariantKind::Basic);
    cluster.crash(2);
    cluster.crash(3);
    cluster.begin().await;

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    for node in cluster.live() {
        let snap = node.core.snapshot().await;
        assert!(snap.view >= 1, "view stuck at {}", snap.view);
        assert_eq!(snap.decided, 0);
    }
    cluster.shutdown().await;
}
