//! Round-robin pacemaker for the chained variant.
//!
//! Owns the highest QC this replica has seen and decides when a leader has
//! gathered enough NewViews to propose. Leader rotation itself is the
//! member set's `(view + 1) mod N`.

use crate::replica::Round;
use crate::ConsensusError;
use hotstuff_messages::{ConsensusData, QuorumCertificate, SignedConsensusData};
use hotstuff_types::{Hash, MessageType, Phase, ViewNumber};
use tracing::debug;

pub struct RoundRobinPm {
    high_qc: QuorumCertificate,
}

impl RoundRobinPm {
    /// Start from the view-0 certificate pointing at the genesis node.
    pub fn new(genesis_id: Hash) -> Self {
        let mut high_qc = QuorumCertificate::genesis();
        high_qc.data.node_id = genesis_id;
        Self { high_qc }
    }

    pub fn high_qc(&self) -> &QuorumCertificate {
        &self.high_qc
    }

    /// Replace the high QC with a newer one.
    ///
    /// At equal views a signed certificate beats the unsigned starting one,
    /// and a certificate for a real node beats the view-0 bootstrap one.
    pub fn update_high_qc(&mut self, qc: &QuorumCertificate) -> bool {
        let current = &self.high_qc;
        let newer = qc.view() > current.view()
            || (qc.view() == current.view()
                && qc != current
                && (current.votes.is_empty()
                    || (current.phase() == Phase::NewView && qc.phase() == Phase::Generic)));
        if !newer {
            return false;
        }
        debug!(
            from = self.high_qc.view(),
            to = qc.view(),
            node = %qc.node_id(),
            "high QC updated"
        );
        self.high_qc = qc.clone();
        true
    }

    /// Jump to `view` mid-round, as a leader does after certifying the
    /// previous view's node.
    pub fn advance_view(&self, round: &mut Round<'_>, view: ViewNumber) {
        if view <= round.state.view {
            return;
        }
        debug!(from = round.state.view, to = view, "pacemaker advancing view");
        round.state.view = view;
        round.state.reset_round();
        round.reset_timer();
    }

    /// Opening move of a fresh view: replicas send `new_view` to the leader.
    /// Returns `true` when this replica leads the view instead.
    pub fn on_next_sync_view(
        &self,
        round: &mut Round<'_>,
        new_view: ConsensusData,
    ) -> Result<bool, ConsensusError> {
        let view = round.state.view;
        if round.is_leader(view) {
            return Ok(true);
        }
        let msg = round.build(MessageType::NewView, new_view)?;
        let leader = round.leader(view).clone();
        round.send(&leader, msg);
        Ok(false)
    }

    /// Record a NewView (if any) and, when this replica leads the current
    /// view and has not proposed yet, try to adopt the highest collected QC.
    /// Returns `true` if the caller should propose now.
    pub fn on_receive_new_view(
        &mut self,
        round: &mut Round<'_>,
        msg: Option<SignedConsensusData>,
    ) -> Result<bool, ConsensusError> {
        if let Some(msg) = msg {
            if !round.accept_new_view(msg)? {
                return Ok(false);
            }
        }
        let view = round.state.view;
        if !round.is_leader(view) || round.state.proposal.is_some() {
            return Ok(false);
        }
        let Some((mut qc, sender_leaf)) = round.take_high_qc()? else {
            return Ok(false);
        };
        // Only a certificate that names no node borrows the sender's leaf.
        if qc.node_id().is_zero() && !sender_leaf.is_zero() {
            qc.data.node_id = sender_leaf;
        }
        self.update_high_qc(&qc);
        round.state.prepare_qc = Some(self.high_qc.clone());
        Ok(true)
    }
}
