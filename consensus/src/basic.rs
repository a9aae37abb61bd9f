//! Basic (five-phase) HotStuff.
//!
//! A view opens with replicas sending NewView to its leader, who then
//! drives Prepare, PreCommit, Commit and Decide in sequence, each phase
//! certified by a QC built from replica votes. All round state lives in
//! [`CoreState`](crate::state::CoreState), so the variant itself carries
//! nothing between messages.

use crate::config::VariantKind;
use crate::replica::{advance_to, Deferred, Round};
use crate::state::next_view;
use crate::variant::ProtocolVariant;
use crate::ConsensusError;
use hotstuff_messages::{
    ConsensusData, ConsensusPayload, QcData, QuorumCertificate, SignedConsensusData, Vote,
};
use hotstuff_types::{MessageType, Phase, ViewNumber};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct BasicHotStuff;

/// Position of a phase within one basic round.
fn rank(phase: Phase) -> u8 {
    match phase {
        Phase::NewView | Phase::Generic => 0,
        Phase::Prepare => 1,
        Phase::PreCommit => 2,
        Phase::Commit => 3,
        Phase::Decide => 4,
    }
}

impl BasicHotStuff {
    pub fn new() -> Self {
        Self
    }

    /// Propose once a quorum of NewViews for the current view is in.
    fn try_lead(&mut self, round: &mut Round<'_>) -> Result<(), ConsensusError> {
        let view = round.state.view;
        if !round.is_leader(view) || round.state.phase != Phase::NewView {
            return Ok(());
        }
        let Some((high_qc, _)) = round.take_high_qc()? else {
            return Ok(());
        };

        let customer_data = round.processor().customer_data_to_consensus()?;
        let parent = round.payload_hash(high_qc.payload())?;
        let high_qc_view = high_qc.view();
        let data = ConsensusData::new(
            view,
            Phase::Prepare,
            ConsensusPayload::new(parent, customer_data),
            high_qc,
        );
        let msg = round.build(MessageType::Prepare, data.clone())?;

        round.state.proposal = Some(data);
        round.state.phase = Phase::Prepare;
        round.reset_timer();
        info!(view, high_qc_view, %parent, "proposing");
        round.broadcast(msg);
        Ok(())
    }

    fn send_vote(
        round: &Round<'_>,
        view: ViewNumber,
        phase: Phase,
        payload: ConsensusPayload,
    ) -> Result<(), ConsensusError> {
        let data = ConsensusData::new(view, phase, payload, QuorumCertificate::genesis());
        let msg = round.build(MessageType::Vote, data)?;
        let leader = round.leader(view).clone();
        debug!(view, %phase, leader = %leader.public_key.short(), "voting");
        round.send(&leader, msg);
        Ok(())
    }

    fn on_prepare(
        &mut self,
        round: &mut Round<'_>,
        msg: SignedConsensusData,
    ) -> Result<(), ConsensusError> {
        let view = msg.view();
        if view < round.state.view {
            debug!(msg_view = view, view = round.state.view, "stale Prepare");
            return Ok(());
        }
        if view == round.state.view && round.state.phase != Phase::NewView {
            debug!(view, phase = %round.state.phase, "already past Prepare in this view");
            return Ok(());
        }
        self.verify_proposal(round, &msg)?;

        if view > round.state.view {
            info!(from = round.state.view, to = view, "adopting proposal view");
            round.state.view = view;
            round.state.reset_round();
        }
        let payload = msg.data.payload.clone();
        round.state.proposal = Some(msg.data);
        round.state.phase = Phase::Prepare;
        round.reset_timer();
        Self::send_vote(round, view, Phase::Prepare, payload)
    }

    /// PreCommit, Commit and Decide from the leader, each carrying the QC of
    /// the phase before it.
    fn on_certified(
        &mut self,
        round: &mut Round<'_>,
        msg_type: MessageType,
        msg: SignedConsensusData,
    ) -> Result<(), ConsensusError> {
        let view = round.state.view;
        if msg.view() != view {
            debug!(%msg_type, msg_view = msg.view(), view, "stale phase message");
            return Ok(());
        }
        if rank(round.state.phase) >= rank(msg.phase()) {
            debug!(%msg_type, view, phase = %round.state.phase, "phase already handled");
            return Ok(());
        }
        let leader = round.leader(view);
        if leader.public_key != msg.signer {
            return Err(ConsensusError::SafetyViolation(format!(
                "{msg_type} for view {view} signed by {} but leader is {}",
                msg.signer.short(),
                leader.public_key.short()
            )));
        }

        let expected = match msg_type {
            MessageType::PreCommit => Phase::Prepare,
            MessageType::Commit => Phase::PreCommit,
            _ => Phase::Commit,
        };
        let justify = msg.justify();
        if justify.phase() != expected || justify.view() != view {
            return Err(ConsensusError::SafetyViolation(format!(
                "{msg_type} carries a {} QC for view {}, expected {expected} for view {view}",
                justify.phase(),
                justify.view()
            )));
        }
        if let Some(proposal) = &round.state.proposal {
            if justify.payload() != &proposal.payload {
                return Err(ConsensusError::SafetyViolation(format!(
                    "{msg_type} certifies a different payload than the view {view} proposal"
                )));
            }
        }
        if !round.verify_qc(justify) {
            return Err(ConsensusError::SafetyViolation(format!(
                "{msg_type} QC for view {view} does not form a quorum"
            )));
        }

        let qc = msg.data.justify;
        let payload = qc.payload().clone();
        round.reset_timer();
        match msg_type {
            MessageType::PreCommit => {
                round.state.prepare_qc = Some(qc);
                round.state.phase = Phase::PreCommit;
                Self::send_vote(round, view, Phase::PreCommit, payload)
            }
            MessageType::Commit => {
                round.state.lock(qc);
                round.state.phase = Phase::Commit;
                Self::send_vote(round, view, Phase::Commit, payload)
            }
            _ => {
                round.state.phase = Phase::Decide;
                round.decide(view, payload);
                round.defer(round.consensus_interval(), Deferred::NextRound);
                Ok(())
            }
        }
    }
}

impl ProtocolVariant for BasicHotStuff {
    fn kind(&self) -> VariantKind {
        VariantKind::Basic
    }

    fn build_new_view(&self, round: &Round<'_>) -> Result<ConsensusData, ConsensusError> {
        let high_qc = round.state.high_qc();
        Ok(ConsensusData::new(
            round.state.view,
            Phase::NewView,
            high_qc.payload().clone(),
            high_qc,
        ))
    }

    fn on_new_round(&mut self, round: &mut Round<'_>) -> Result<(), ConsensusError> {
        let view = round.state.view;
        if round.is_leader(view) {
            // NewViews for this view may already be waiting.
            return self.try_lead(round);
        }
        let data = self.build_new_view(round)?;
        let msg = round.build(MessageType::NewView, data)?;
        let leader = round.leader(view).clone();
        round.send(&leader, msg);
        Ok(())
    }

    fn on_new_view(
        &mut self,
        round: &mut Round<'_>,
        msg: SignedConsensusData,
    ) -> Result<(), ConsensusError> {
        if !round.accept_new_view(msg)? {
            return Ok(());
        }
        self.try_lead(round)
    }

    fn on_vote(
        &mut self,
        round: &mut Round<'_>,
        msg: SignedConsensusData,
    ) -> Result<(), ConsensusError> {
        let view = round.state.view;
        let phase = round.state.phase;
        if !round.is_leader(view) {
            debug!(view, from = %msg.signer.short(), "vote received while not leader");
            return Ok(());
        }
        if msg.view() != view || msg.phase() != phase {
            debug!(
                msg_view = msg.view(),
                msg_phase = %msg.phase(),
                view,
                %phase,
                "stale vote"
            );
            return Ok(());
        }
        let Some(proposal) = round.state.proposal.clone() else {
            return Ok(());
        };
        if msg.data.payload != proposal.payload {
            debug!(view, from = %msg.signer.short(), "vote for a different payload");
            return Ok(());
        }
        if !round.state.votes.insert(msg) {
            return Ok(());
        }

        let votes: Vec<Vote> = round
            .state
            .votes
            .matching(view, phase, |m| m.data.payload == proposal.payload)
            .map(SignedConsensusData::vote)
            .collect();
        if !round.has_enough_votes(votes.len()) {
            return Ok(());
        }

        let mut qc = QuorumCertificate::with_votes(
            QcData::new(phase, view, proposal.payload.clone()),
            votes,
        );
        qc.add_vote(round.self_vote(&proposal.payload)?);
        info!(view, %phase, votes = qc.vote_count(), "quorum certificate formed");
        round.state.votes.remove_view(view);
        round.reset_timer();

        let next = |phase: Phase, qc: QuorumCertificate| {
            ConsensusData::new(view, phase, proposal.payload.clone(), qc)
        };
        match phase {
            Phase::Prepare => {
                round.state.prepare_qc = Some(qc.clone());
                round.state.phase = Phase::PreCommit;
                let msg = round.build(MessageType::PreCommit, next(Phase::PreCommit, qc))?;
                round.broadcast(msg);
            }
            Phase::PreCommit => {
                round.state.lock(qc.clone());
                round.state.phase = Phase::Commit;
                let msg = round.build(MessageType::Commit, next(Phase::Commit, qc))?;
                round.broadcast(msg);
            }
            Phase::Commit => {
                round.state.phase = Phase::Decide;
                let msg = round.build(MessageType::Decide, next(Phase::Decide, qc))?;
                round.broadcast(msg);
                round.decide(view, proposal.payload.clone());
                advance_to(self, round, next_view(view)?);
            }
            _ => {}
        }
        Ok(())
    }

    fn on_proposal(
        &mut self,
        round: &mut Round<'_>,
        msg_type: MessageType,
        msg: SignedConsensusData,
    ) -> Result<(), ConsensusError> {
        match msg_type {
            MessageType::Prepare => self.on_prepare(round, msg),
            MessageType::PreCommit | MessageType::Commit | MessageType::Decide => {
                self.on_certified(round, msg_type, msg)
            }
            other => Err(ConsensusError::ProtocolMismatch(format!(
                "basic HotStuff does not handle {other} messages"
            ))),
        }
    }

    fn verify_proposal(
        &self,
        round: &Round<'_>,
        msg: &SignedConsensusData,
    ) -> Result<(), ConsensusError> {
        let parent = msg.data.payload.parent;
        round.check_proposal(msg, |locked| {
            [msg.justify().payload(), locked.payload()]
                .into_iter()
                .any(|p| round.payload_hash(p).is_ok_and(|h| h == parent))
        })
    }
}
