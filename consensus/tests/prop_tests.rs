use proptest::prelude::*;

use hotstuff_consensus::{has_enough_votes, leader_index, quorum_threshold, MessageLog, MIN_MEMBERS};
use hotstuff_messages::{ConsensusData, ConsensusPayload, QuorumCertificate, SignedConsensusData};
use hotstuff_types::{Phase, PublicKey, Signature};
use std::collections::HashSet;

fn entry(signer: u8, view: u64, phase: Phase) -> SignedConsensusData {
    SignedConsensusData {
        data: ConsensusData::new(view, phase, ConsensusPayload::genesis(), QuorumCertificate::genesis()),
        signer: PublicKey([signer; 32]),
        vote_signature: Signature([0; 64]),
        seal: Signature([0; 64]),
    }
}

fn phase_strategy() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::NewView),
        Just(Phase::Prepare),
        Just(Phase::PreCommit),
        Just(Phase::Commit),
        Just(Phase::Decide),
        Just(Phase::Generic),
    ]
}

proptest! {
    /// Any two quorums (leader included) share more than `f` members.
    #[test]
    fn quorums_intersect_in_an_honest_member(n in MIN_MEMBERS..300usize) {
        let f = (n - 1) / 3;
        let quorum = quorum_threshold(n) + 1;
        prop_assert!(2 * quorum >= n + f + 1, "n={} quorum={} f={}", n, quorum, f);
    }

    /// Honest members alone can always form a quorum.
    #[test]
    fn honest_members_reach_quorum(n in MIN_MEMBERS..300usize) {
        let f = (n - 1) / 3;
        prop_assert!(has_enough_votes(n - f - 1, n));
        prop_assert!(!has_enough_votes(quorum_threshold(n) - 1, n));
    }

    /// Every member leads exactly once in any window of `n` views.
    #[test]
    fn rotation_covers_every_member(n in 1usize..64, start in 0u64..1_000_000) {
        let leaders: HashSet<usize> = (start..start + n as u64)
            .map(|v| leader_index(v, n))
            .collect();
        prop_assert_eq!(leaders.len(), n);
        prop_assert_eq!(leader_index(start, n), ((start + 1) % n as u64) as usize);
    }

    /// The log holds one entry per (signer, view, phase), whatever the input order.
    #[test]
    fn message_log_dedupes(
        entries in prop::collection::vec((0u8..6, 0u64..4, phase_strategy()), 0..60)
    ) {
        let mut log = MessageLog::default();
        let mut keys = HashSet::new();
        for (signer, view, phase) in &entries {
            let fresh = keys.insert((*signer, *view, *phase));
            prop_assert_eq!(log.insert(entry(*signer, *view, *phase)), fresh);
        }
        prop_assert_eq!(log.len(), keys.len());
    }
}
