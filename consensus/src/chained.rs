//! Chained HotStuff.
//!
//! Every view produces one Generic node whose justify certifies the node
//! before it. A replica votes for a node by sending it to the next view's
//! leader, who turns a quorum of those votes into the next node's justify.
//! Three consecutive certified links commit the oldest node of the chain:
//!
//! ```text
//! b <- b0 <- b1 <- b2
//! ```
//!
//! On receiving `b2`: `b2.justify` becomes the high QC, `b1.justify` the
//! locked QC, and `b` is decided.

use crate::config::VariantKind;
use crate::replica::{Deferred, Round};
use crate::node_tree::NodeTree;
use crate::pacemaker::RoundRobinPm;
use crate::state::next_view;
use crate::variant::ProtocolVariant;
use crate::ConsensusError;
use hotstuff_crypto::Hasher;
use hotstuff_messages::{
    ConsensusData, ConsensusPayload, QcData, QuorumCertificate, SignedConsensusData, Vote,
};
use hotstuff_types::{Hash, MessageType, Phase, ViewNumber};
use tracing::{debug, info, warn};

pub struct ChainedHotStuff {
    tree: NodeTree,
    /// Most recently accepted node.
    leaf: Hash,
    pacemaker: RoundRobinPm,
    last_decided_view: Option<ViewNumber>,
}

impl ChainedHotStuff {
    pub fn new(hasher: &dyn Hasher) -> Result<Self, ConsensusError> {
        let tree = NodeTree::new(hasher)?;
        let genesis = tree.genesis_id();
        Ok(Self {
            tree,
            leaf: genesis,
            pacemaker: RoundRobinPm::new(genesis),
            last_decided_view: None,
        })
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    pub fn leaf(&self) -> Hash {
        self.leaf
    }

    pub fn high_qc(&self) -> &QuorumCertificate {
        self.pacemaker.high_qc()
    }

    pub fn last_decided_view(&self) -> Option<ViewNumber> {
        self.last_decided_view
    }

    /// Build, broadcast and locally apply this view's node, if this replica
    /// leads the view and has not proposed in it yet.
    fn propose(&mut self, round: &mut Round<'_>) -> Result<(), ConsensusError> {
        let view = round.state.view;
        if !round.is_leader(view) || round.state.proposal.is_some() {
            return Ok(());
        }

        let high_qc = self.pacemaker.high_qc().clone();
        let start = if self.tree.contains(&high_qc.node_id()) {
            high_qc.node_id()
        } else {
            warn!(view, node = %high_qc.node_id(), "high QC node unknown, building on leaf");
            self.leaf
        };
        let parent_id = self.tree.backfill(start, view, round.hasher())?;

        let customer_data = round.processor().customer_data_to_consensus()?;
        let parent_hash = round.payload_hash(high_qc.payload())?;
        let high_qc_view = high_qc.view();
        let node = ConsensusData::new(
            view,
            Phase::Generic,
            ConsensusPayload::new(parent_hash, customer_data),
            high_qc,
        )
        .with_parent(parent_id)
        .sealed_id(round.hasher())?;
        let msg = round.build(MessageType::Generic, node.clone())?;

        round.state.proposal = Some(node.clone());
        round.state.phase = Phase::Generic;
        round.reset_timer();
        info!(view, high_qc_view, node = %node.id, parent = %parent_id, "proposing");
        round.broadcast(msg);
        self.update(round, node)
    }

    /// Apply an accepted node: store it, forward a vote to the next leader
    /// and run the commit rule.
    fn update(&mut self, round: &mut Round<'_>, node: ConsensusData) -> Result<(), ConsensusError> {
        let view = node.view_number;
        self.tree.insert(node.clone());
        self.leaf = node.id;

        let next_leader = round.leader(next_view(view)?).clone();
        if next_leader.public_key != *round.me() {
            let vote = ConsensusData::new(
                view,
                Phase::Generic,
                node.payload.clone(),
                QuorumCertificate::genesis(),
            )
            .with_parent(node.id);
            let msg = round.build(MessageType::Vote, vote)?;
            round.defer(
                round.consensus_interval(),
                Deferred::Send {
                    to: next_leader,
                    msg,
                },
            );
        }

        self.walk(round, &node);
        Ok(())
    }

    /// The three-chain commit rule.
    fn walk(&mut self, round: &mut Round<'_>, b2: &ConsensusData) {
        let Some(b1) = self.consecutive_parent(b2) else {
            return;
        };
        if self.pacemaker.update_high_qc(&b2.justify) {
            round.state.prepare_qc = Some(b2.justify.clone());
        }

        let Some(b0) = self.consecutive_parent(&b1) else {
            return;
        };
        round.state.lock(b1.justify.clone());

        let Some(b) = self.consecutive_parent(&b0) else {
            return;
        };
        self.commit(round, b);
    }

    /// The node `child.justify` certifies, if it is also `child`'s direct parent.
    fn consecutive_parent(&self, child: &ConsensusData) -> Option<ConsensusData> {
        let parent = self.tree.get(&child.justify.node_id())?;
        (child.parent_id == parent.id).then(|| parent.clone())
    }

    fn commit(&mut self, round: &mut Round<'_>, node: ConsensusData) {
        if node.id == self.tree.genesis_id() {
            return;
        }
        if self
            .last_decided_view
            .is_some_and(|decided| node.view_number <= decided)
        {
            return;
        }
        self.last_decided_view = Some(node.view_number);
        let pruned = self.tree.prune_below(node.view_number);
        debug!(view = node.view_number, pruned, "node tree pruned");
        round.decide(node.view_number, node.payload);
    }

    /// If `node.parent_id` is unknown, regenerate the dummy chain the leader
    /// would have built over skipped views and keep it only if it ends at
    /// that parent.
    fn ensure_parent(&mut self, round: &Round<'_>, node: &ConsensusData) -> Result<(), ConsensusError> {
        if self.tree.contains(&node.parent_id) {
            return Ok(());
        }
        let from = node.justify.node_id();
        let chain = self.tree.dummy_chain(from, node.view_number, round.hasher())?;
        match chain.last() {
            Some(last) if last.id == node.parent_id => {
                debug!(view = node.view_number, dummies = chain.len(), "regenerated skipped views");
                for dummy in chain {
                    self.tree.insert(dummy);
                }
            }
            _ => debug!(view = node.view_number, parent = %node.parent_id, "parent unknown"),
        }
        Ok(())
    }
}

fn check_node_id(round: &Round<'_>, node: &ConsensusData) -> Result<(), ConsensusError> {
    if node.compute_id(round.hasher())? != node.id {
        return Err(ConsensusError::SafetyViolation(format!(
            "node id mismatch at view {}",
            node.view_number
        )));
    }
    Ok(())
}

impl ProtocolVariant for ChainedHotStuff {
    fn kind(&self) -> VariantKind {
        VariantKind::Chained
    }

    fn build_new_view(&self, round: &Round<'_>) -> Result<ConsensusData, ConsensusError> {
        let high_qc = self.pacemaker.high_qc().clone();
        Ok(ConsensusData::new(
            round.state.view,
            Phase::NewView,
            high_qc.payload().clone(),
            high_qc,
        )
        .with_parent(self.leaf))
    }

    fn on_new_round(&mut self, round: &mut Round<'_>) -> Result<(), ConsensusError> {
        let new_view = self.build_new_view(round)?;
        if self.pacemaker.on_next_sync_view(round, new_view)?
            && self.pacemaker.on_receive_new_view(round, None)?
        {
            self.propose(round)?;
        }
        Ok(())
    }

    fn on_new_view(
        &mut self,
        round: &mut Round<'_>,
        msg: SignedConsensusData,
    ) -> Result<(), ConsensusError> {
        if self.pacemaker.on_receive_new_view(round, Some(msg))? {
            self.propose(round)?;
        }
        Ok(())
    }

    fn on_vote(
        &mut self,
        round: &mut Round<'_>,
        msg: SignedConsensusData,
    ) -> Result<(), ConsensusError> {
        let vote_view = msg.view();
        if msg.phase() != Phase::Generic {
            debug!(phase = %msg.phase(), "non-generic vote");
            return Ok(());
        }
        if round.state.view > vote_view {
            debug!(vote_view, view = round.state.view, "stale vote");
            return Ok(());
        }
        if !round.within_window(vote_view) {
            return Err(ConsensusError::ViewOutOfRange(format!(
                "vote for view {vote_view} from {} while at view {}",
                msg.signer.short(),
                round.state.view
            )));
        }
        let next = next_view(vote_view)?;
        if !round.is_leader(next) {
            debug!(vote_view, from = %msg.signer.short(), "vote for a view this replica does not follow");
            return Ok(());
        }
        let node_id = msg.data.parent_id;
        let payload = msg.data.payload.clone();
        if !round.state.votes.insert(msg) {
            return Ok(());
        }

        let votes: Vec<Vote> = round
            .state
            .votes
            .matching(vote_view, Phase::Generic, |m| {
                m.data.parent_id == node_id && m.data.payload == payload
            })
            .map(SignedConsensusData::vote)
            .collect();
        if !round.has_enough_votes(votes.len()) {
            return Ok(());
        }
        if !self.tree.contains(&node_id) {
            debug!(vote_view, node = %node_id, "quorum for an unknown node");
            return Ok(());
        }

        let mut qc = QuorumCertificate::with_votes(
            QcData::new(Phase::Generic, vote_view, payload.clone()).with_node(node_id),
            votes,
        );
        qc.add_vote(round.self_vote(&payload)?);
        info!(vote_view, node = %node_id, votes = qc.vote_count(), "quorum certificate formed");

        self.pacemaker.update_high_qc(&qc);
        round.state.prepare_qc = Some(self.pacemaker.high_qc().clone());
        self.pacemaker.advance_view(round, next);
        self.propose(round)
    }

    fn on_proposal(
        &mut self,
        round: &mut Round<'_>,
        msg_type: MessageType,
        msg: SignedConsensusData,
    ) -> Result<(), ConsensusError> {
        if msg_type != MessageType::Generic {
            return Err(ConsensusError::ProtocolMismatch(format!(
                "chained HotStuff does not handle {msg_type} messages"
            )));
        }
        let view = msg.view();
        if view < round.state.view {
            debug!(msg_view = view, view = round.state.view, "stale proposal");
            return Ok(());
        }
        if view == round.state.view && round.state.proposal.is_some() {
            debug!(view, "already accepted a proposal in this view");
            return Ok(());
        }

        // Cheap checks first: regenerating skipped views costs one hash per view.
        round.screen_proposal(&msg)?;
        check_node_id(round, &msg.data)?;
        self.ensure_parent(round, &msg.data)?;
        self.verify_proposal(round, &msg)?;

        if view > round.state.view {
            info!(from = round.state.view, to = view, "adopting proposal view");
            round.state.view = view;
            round.state.reset_round();
        }
        round.state.phase = Phase::Generic;
        round.state.proposal = Some(msg.data.clone());
        round.reset_timer();
        self.update(round, msg.data)
    }

    fn verify_proposal(
        &self,
        round: &Round<'_>,
        msg: &SignedConsensusData,
    ) -> Result<(), ConsensusError> {
        let node = &msg.data;
        check_node_id(round, node)?;
        round.check_proposal(msg, |locked| {
            self.tree.extends(node.parent_id, locked.node_id())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_VIEW_GAP;
    use crate::testing::{signed, Fixture};
    use hotstuff_crypto::Blake2bHasher;

    const REPLICA: usize = 0;

    /// A child of `parent` at `view` whose justify certifies `parent`.
    /// Genesis is certified by a bootstrap QC.
    fn child_of(fx: &Fixture, parent: &ConsensusData, view: ViewNumber, data: &[u8]) -> ConsensusData {
        let phase = if parent.payload.is_genesis() {
            Phase::NewView
        } else {
            Phase::Generic
        };
        let justify = fx.qc(phase, parent.view_number, parent.payload.clone(), &[0, 2, 3]);
        let justify = QuorumCertificate {
            data: justify.data.with_node(parent.id),
            votes: justify.votes,
        };
        ConsensusData::new(
            view,
            Phase::Generic,
            ConsensusPayload::new(fx.hash_of(&parent.payload), data.to_vec()),
            justify,
        )
        .with_parent(parent.id)
        .sealed_id(&Blake2bHasher)
        .unwrap()
    }

    fn genesis(chained: &ChainedHotStuff) -> ConsensusData {
        chained.tree().get(&chained.tree().genesis_id()).unwrap().clone()
    }

    /// A node at `view` whose parent nobody has, justified by a QC for
    /// `justify_view` that names genesis.
    fn orphan_at(
        fx: &Fixture,
        chained: &ChainedHotStuff,
        view: ViewNumber,
        justify_view: ViewNumber,
    ) -> ConsensusData {
        let g = genesis(chained);
        let qc = fx.qc(Phase::Generic, justify_view, g.payload.clone(), &[0, 2, 3]);
        ConsensusData::new(
            view,
            Phase::Generic,
            ConsensusPayload::new(fx.hash_of(&g.payload), b"orphan".to_vec()),
            QuorumCertificate {
                data: qc.data.with_node(g.id),
                votes: qc.votes,
            },
        )
        .with_parent(Hash::new([7; 32]))
        .sealed_id(&Blake2bHasher)
        .unwrap()
    }

    fn vote_from(fx: &Fixture, voter: usize, view: ViewNumber) -> SignedConsensusData {
        signed(
            &fx.signers[voter],
            ConsensusData::new(view, Phase::Generic, ConsensusPayload::genesis(), QuorumCertificate::genesis())
                .with_parent(Hash::new([1; 32])),
        )
    }

    #[tokio::test]
    async fn three_chain_locks_and_decides() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        let mut chained = ChainedHotStuff::new(&Blake2bHasher).unwrap();
        let g = genesis(&chained);
        let a = child_of(&fx, &g, 1, b"a");
        let b = child_of(&fx, &a, 2, b"b");
        let c = child_of(&fx, &b, 3, b"c");
        let d = child_of(&fx, &c, 4, b"d");

        for node in [a.clone(), b.clone(), c.clone()] {
            fx.core
                .with_round(|round| chained.update(round, node))
                .await
                .unwrap();
        }
        // The chain through C only reaches genesis, which is never decided.
        assert!(fx.processor.committed().is_empty());

        fx.core
            .with_round(|round| chained.update(round, d.clone()))
            .await
            .unwrap();

        assert_eq!(chained.high_qc().node_id(), c.id);
        fx.core
            .with_round(|round| {
                let locked = round.state.locked_qc.as_ref().unwrap();
                assert_eq!(locked.node_id(), b.id);
                assert_eq!(locked.view(), 2);
            })
            .await;
        let committed = fx.processor.committed();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0], (1, a.payload.clone()));
        assert_eq!(chained.last_decided_view(), Some(1));
        assert!(!chained.tree().contains(&g.id));

        // Re-applying D decides nothing new.
        fx.core
            .with_round(|round| chained.update(round, d))
            .await
            .unwrap();
        assert_eq!(fx.processor.committed().len(), 1);
    }

    #[tokio::test]
    async fn gap_in_chain_blocks_commit() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        let mut chained = ChainedHotStuff::new(&Blake2bHasher).unwrap();
        let g = genesis(&chained);
        let a = child_of(&fx, &g, 1, b"a");
        let b = child_of(&fx, &a, 2, b"b");
        // C's justify certifies A, not its parent B.
        let mut c = child_of(&fx, &b, 3, b"c");
        c.justify = b.justify.clone();
        let c = c.sealed_id(&Blake2bHasher).unwrap();
        let d = child_of(&fx, &c, 4, b"d");

        for node in [a, b, c, d] {
            fx.core
                .with_round(|round| chained.update(round, node))
                .await
                .unwrap();
        }
        assert!(fx.processor.committed().is_empty());
    }

    #[tokio::test]
    async fn replica_accepts_proposal_and_defers_vote_to_next_leader() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        let mut chained = ChainedHotStuff::new(&Blake2bHasher).unwrap();
        let g = genesis(&chained);
        let justify = QuorumCertificate {
            data: fx.bootstrap_qc(&[0, 2, 3]).data.with_node(g.id),
            votes: fx.bootstrap_qc(&[0, 2, 3]).votes,
        };
        let node = ConsensusData::new(
            0,
            Phase::Generic,
            ConsensusPayload::new(fx.hash_of(&ConsensusPayload::genesis()), b"p0".to_vec()),
            justify,
        )
        .with_parent(g.id)
        .sealed_id(&Blake2bHasher)
        .unwrap();
        let msg = signed(&fx.signers[fx.index_of_leader(0)], node.clone());

        fx.core
            .with_round(|round| chained.on_proposal(round, MessageType::Generic, msg))
            .await
            .unwrap();
        assert_eq!(chained.leaf(), node.id);
        assert_eq!(fx.core.snapshot().await.phase, Phase::Generic);
        // The vote is held back for the pacing interval.
        fx.settle().await;
        assert!(fx.network.sent_of_type(MessageType::Vote).is_empty());
    }

    #[tokio::test]
    async fn tampered_node_id_is_rejected() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        let mut chained = ChainedHotStuff::new(&Blake2bHasher).unwrap();
        let g = genesis(&chained);
        let mut node = child_of(&fx, &g, 0, b"p0");
        node.justify = QuorumCertificate {
            data: fx.bootstrap_qc(&[0, 2, 3]).data.with_node(g.id),
            votes: fx.bootstrap_qc(&[0, 2, 3]).votes,
        };
        node.id = Hash::new([9; 32]);
        let msg = signed(&fx.signers[fx.index_of_leader(0)], node);

        let err = fx
            .core
            .with_round(|round| chained.on_proposal(round, MessageType::Generic, msg))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::SafetyViolation(_)));
        assert_eq!(chained.leaf(), g.id);
    }

    #[tokio::test]
    async fn replica_regenerates_skipped_views() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        let mut chained = ChainedHotStuff::new(&Blake2bHasher).unwrap();
        let g = genesis(&chained);
        let a = child_of(&fx, &g, 1, b"a");
        fx.core
            .with_round(|round| chained.update(round, a.clone()))
            .await
            .unwrap();

        // Leader of view 4 skips views 2 and 3.
        let mut leader_tree = NodeTree::new(&Blake2bHasher).unwrap();
        leader_tree.insert(a.clone());
        let parent = leader_tree.backfill(a.id, 4, &Blake2bHasher).unwrap();
        let mut node = child_of(&fx, &a, 4, b"e");
        node.parent_id = parent;
        let node = node.sealed_id(&Blake2bHasher).unwrap();
        let msg = signed(&fx.signers[fx.index_of_leader(4)], node.clone());

        fx.core
            .with_round(|round| chained.on_proposal(round, MessageType::Generic, msg))
            .await
            .unwrap();
        assert!(chained.tree().contains(&parent));
        assert_eq!(chained.leaf(), node.id);
        assert_eq!(fx.core.snapshot().await.view, 4);
    }

    #[tokio::test]
    async fn far_future_proposal_from_non_leader_skips_backfill() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        let mut chained = ChainedHotStuff::new(&Blake2bHasher).unwrap();
        let view = 400_000;
        let impostor = (fx.index_of_leader(view) + 1) % fx.signers.len();
        let msg = signed(&fx.signers[impostor], orphan_at(&fx, &chained, view, 0));

        let err = fx
            .core
            .with_round(|round| chained.on_proposal(round, MessageType::Generic, msg))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::SafetyViolation(_)));
        assert_eq!(chained.tree().len(), 1);
        assert_eq!(fx.core.snapshot().await.view, 0);
    }

    #[tokio::test]
    async fn leader_proposal_too_far_past_its_justify_is_rejected() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        let mut chained = ChainedHotStuff::new(&Blake2bHasher).unwrap();
        let view = 400_000;
        let msg = signed(&fx.signers[fx.index_of_leader(view)], orphan_at(&fx, &chained, view, 0));

        let err = fx
            .core
            .with_round(|round| chained.on_proposal(round, MessageType::Generic, msg))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::ViewOutOfRange(_)));
        assert_eq!(chained.tree().len(), 1);
        assert_eq!(chained.leaf(), chained.tree().genesis_id());
    }

    #[tokio::test]
    async fn justify_naming_an_old_node_cannot_force_a_long_backfill() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        let mut chained = ChainedHotStuff::new(&Blake2bHasher).unwrap();
        // The justify view is recent, but the node it names is genesis.
        let view = MAX_VIEW_GAP + 10;
        let msg = signed(
            &fx.signers[fx.index_of_leader(view)],
            orphan_at(&fx, &chained, view, view - 1),
        );

        let err = fx
            .core
            .with_round(|round| chained.on_proposal(round, MessageType::Generic, msg))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::ViewOutOfRange(_)));
        assert_eq!(chained.tree().len(), 1);
    }

    #[tokio::test]
    async fn far_future_votes_are_not_retained() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        let mut chained = ChainedHotStuff::new(&Blake2bHasher).unwrap();
        for view in (1..=100).map(|i| i * 1_000) {
            let vote = vote_from(&fx, 2, view);
            let err = fx
                .core
                .with_round(|round| chained.on_vote(round, vote))
                .await
                .unwrap_err();
            assert!(matches!(err, ConsensusError::ViewOutOfRange(_)));
        }
        fx.core
            .with_round(|round| assert!(round.state.votes.is_empty()))
            .await;
    }

    #[tokio::test]
    async fn vote_at_the_top_of_the_view_range_is_refused() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        let mut chained = ChainedHotStuff::new(&Blake2bHasher).unwrap();
        let top = vote_from(&fx, 2, ViewNumber::MAX);
        let err = fx
            .core
            .with_round(|round| chained.on_vote(round, top))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::ViewOutOfRange(_)));

        // Within the window, but no view follows it.
        fx.core
            .with_round(|round| round.state.view = ViewNumber::MAX - 1)
            .await;
        let top = vote_from(&fx, 2, ViewNumber::MAX);
        let err = fx
            .core
            .with_round(|round| chained.on_vote(round, top))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::ViewOutOfRange(_)));
        fx.core
            .with_round(|round| {
                assert_eq!(round.state.view, ViewNumber::MAX - 1);
                assert!(round.state.votes.is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn next_leader_turns_vote_quorum_into_proposal() {
        // Member 2 leads view 1, so it collects votes for view 0.
        let fx = Fixture::running(VariantKind::Chained, 2).await;
        let mut chained = ChainedHotStuff::new(&Blake2bHasher).unwrap();
        let g = genesis(&chained);
        let node = child_of(&fx, &g, 0, b"p0");
        fx.core
            .with_round(|round| chained.update(round, node.clone()))
            .await
            .unwrap();

        for voter in [0, 3] {
            let vote = signed(
                &fx.signers[voter],
                ConsensusData::new(0, Phase::Generic, node.payload.clone(), QuorumCertificate::genesis())
                    .with_parent(node.id),
            );
            fx.core
                .with_round(|round| chained.on_vote(round, vote))
                .await
                .unwrap();
        }

        assert_eq!(chained.high_qc().node_id(), node.id);
        assert_eq!(chained.high_qc().vote_count(), 3);
        assert_eq!(fx.core.snapshot().await.view, 1);
        let proposal = fx
            .core
            .with_round(|round| round.state.proposal.clone())
            .await
            .unwrap();
        assert_eq!(proposal.parent_id, node.id);
        assert_eq!(chained.leaf(), proposal.id);
        fx.settle().await;
        assert_eq!(fx.network.sent_of_type(MessageType::Generic).len(), 3);
    }
}
