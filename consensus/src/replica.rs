//! The per-replica consensus state machine.
//!
//! All mutation goes through one `tokio::sync::Mutex`, taken once per
//! inbound message, timer fire or deferred task. Variant handlers receive a
//! [`Round`] that pairs the locked [`CoreState`] with the core's immutable
//! collaborators. Outbound sends are spawned and never awaited under the lock.

use crate::config::{Capabilities, ConsensusConfig, VariantKind, MAX_VIEW_GAP, VIEW_WINDOW};
use crate::quorum::MemberSet;
use crate::state::{next_view, CoreSnapshot, CoreState, CoreStatus};
use crate::timer::ViewTimer;
use crate::variant::{new_variant, ProtocolVariant};
use crate::ConsensusError;
use hotstuff_crypto::Hasher;
use hotstuff_messages::{
    build_message, parse_message, payload_hash, verify_signed, ConsensusData, ConsensusEvent,
    ConsensusMessage, ConsensusPayload, ExternalProcessor, QuorumCertificate,
    SignedConsensusData, Vote,
};
use hotstuff_types::{Hash, Member, MessageType, Phase, PublicKey, ViewNumber};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct Engine {
    state: CoreState,
    variant: Box<dyn ProtocolVariant>,
}

pub(crate) struct Shared {
    config: ConsensusConfig,
    caps: Capabilities,
    members: MemberSet,
    me: Member,
    timer: ViewTimer,
    engine: Mutex<Engine>,
    shutdown: broadcast::Sender<()>,
}

/// Work scheduled to run later under the lock, if the view has not moved.
#[derive(Debug)]
pub enum Deferred {
    /// Unicast a prepared message.
    Send { to: Member, msg: ConsensusMessage },
    /// Advance to the next view and start a round there.
    NextRound,
}

/// Handle to one replica's consensus core. Cheap to clone.
#[derive(Clone)]
pub struct ConsensusCore {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConsensusCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusCore").finish_non_exhaustive()
    }
}

impl ConsensusCore {
    /// Validate `config` and build a core in the `Init` state. Nothing runs
    /// until [`begin`](Self::begin) is called.
    pub fn new(config: ConsensusConfig, caps: Capabilities) -> Result<Self, ConsensusError> {
        let self_key = caps.signer.public_key();
        config.validate(&self_key)?;

        let members = MemberSet::new(config.members.clone(), caps.signer_generator.as_ref())?;
        let me = members
            .get(&self_key)
            .cloned()
            .ok_or_else(|| ConsensusError::Config(format!("local key {self_key} is not a member")))?;
        let variant = new_variant(config.variant, caps.hasher.as_ref())?;
        let timer = ViewTimer::new(config.consensus_timeout);
        let (shutdown, _) = broadcast::channel(1);

        tracing::info!(
            member = %me.public_key.short(),
            members = members.len(),
            variant = %config.variant,
            timeout_ms = config.consensus_timeout.as_millis() as u64,
            "consensus core created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                caps,
                members,
                me,
                timer,
                engine: Mutex::new(Engine {
                    state: CoreState::new(),
                    variant,
                }),
                shutdown,
            }),
        })
    }

    /// Validate, then wait in the background for every other member to come
    /// online before beginning round 0.
    pub fn start(config: ConsensusConfig, caps: Capabilities) -> Result<Self, ConsensusError> {
        let core = Self::new(config, caps)?;
        core.spawn_init_service();
        Ok(core)
    }

    pub fn public_key(&self) -> PublicKey {
        self.shared.me.public_key
    }

    pub fn variant(&self) -> VariantKind {
        self.shared.config.variant
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.shared.config
    }

    pub fn leader(&self, view: ViewNumber) -> &Member {
        self.shared.members.leader(view)
    }

    fn spawn_init_service(&self) -> JoinHandle<()> {
        let core = self.clone();
        let mut shutdown_rx = self.shared.shutdown.subscribe();
        tokio::spawn(async move {
            let shared = &core.shared;
            let mut ticker = tokio::time::interval(shared.config.member_check_interval);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("init service shutting down");
                        return;
                    }
                    _ = ticker.tick() => {}
                }
                let offline = shared
                    .members
                    .members()
                    .iter()
                    .filter(|m| m.public_key != shared.me.public_key)
                    .filter(|m| !shared.caps.network.is_online(m))
                    .count();
                if offline == 0 {
                    break;
                }
                tracing::debug!(offline, "waiting for members to come online");
            }
            if let Err(e) = core.begin().await {
                tracing::warn!(error = %e, "failed to begin consensus");
            }
        })
    }

    /// Arm the view-change timer, start the monitor and run round 0.
    pub async fn begin(&self) -> Result<(), ConsensusError> {
        let mut guard = self.shared.engine.lock().await;
        let Engine { state, variant } = &mut *guard;
        match state.status {
            CoreStatus::Running => return Ok(()),
            CoreStatus::Stopped => return Err(ConsensusError::NotRunning),
            CoreStatus::Init => {}
        }
        state.status = CoreStatus::Running;
        tracing::info!(member = %self.shared.me.public_key.short(), "consensus running");

        self.shared.timer.reset();
        self.spawn_view_change_monitor();

        let mut round = Round {
            shared: &self.shared,
            state,
        };
        new_round(&mut **variant, &mut round);
        Ok(())
    }

    fn spawn_view_change_monitor(&self) -> JoinHandle<()> {
        let core = self.clone();
        let mut deadline_rx = self.shared.timer.subscribe();
        let mut shutdown_rx = self.shared.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                let deadline = *deadline_rx.borrow_and_update();
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("view-change monitor shutting down");
                        break;
                    }
                    changed = deadline_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        core.on_timeout(deadline).await;
                    }
                }
            }
        })
    }

    async fn on_timeout(&self, deadline: Instant) {
        let mut guard = self.shared.engine.lock().await;
        let Engine { state, variant } = &mut *guard;
        if state.status != CoreStatus::Running {
            return;
        }
        // Reset while we waited for the lock.
        if self.shared.timer.deadline() != deadline {
            return;
        }
        tracing::warn!(view = state.view, phase = %state.phase, "view-change timeout");
        let mut round = Round {
            shared: &self.shared,
            state,
        };
        view_change(&mut **variant, &mut round);
    }

    /// Entry point for every inbound consensus message.
    ///
    /// Protocol tag, membership and both signatures are checked before the
    /// lock is taken. A rejected message never touches state.
    pub async fn feed(
        &self,
        msg: ConsensusMessage,
    ) -> Result<Option<ConsensusMessage>, ConsensusError> {
        if let Err(e) = msg.check_protocol() {
            tracing::debug!(error = %e, "dropping message");
            return Err(ConsensusError::ProtocolMismatch(e.to_string()));
        }
        let signed = parse_message(&msg).map_err(|e| {
            tracing::debug!(msg_type = %msg.msg_type, error = %e, "dropping undecodable message");
            ConsensusError::Message(e)
        })?;

        if msg.msg_type.is_proposal() && signed.phase().message_type() != Some(msg.msg_type) {
            return Err(ConsensusError::ProtocolMismatch(format!(
                "{} message carries {} phase",
                msg.msg_type,
                signed.phase()
            )));
        }

        let Some(verifier) = self.shared.members.verifier(&signed.signer) else {
            tracing::warn!(signer = %signed.signer.short(), "dropping message from non-member");
            return Err(ConsensusError::UnknownSender(signed.signer.to_string()));
        };
        if !verify_signed(&signed, verifier, self.shared.caps.hasher.as_ref()) {
            tracing::warn!(
                signer = %signed.signer.short(),
                msg_type = %msg.msg_type,
                view = signed.view(),
                "dropping message with bad signature"
            );
            return Err(ConsensusError::BadSignature(format!(
                "{} from {}",
                msg.msg_type,
                signed.signer.short()
            )));
        }

        let mut guard = self.shared.engine.lock().await;
        let Engine { state, variant } = &mut *guard;
        if state.status != CoreStatus::Running {
            return Err(ConsensusError::NotRunning);
        }

        tracing::trace!(
            msg_type = %msg.msg_type,
            from = %signed.signer.short(),
            msg_view = signed.view(),
            view = state.view,
            "feed"
        );

        let mut round = Round {
            shared: &self.shared,
            state,
        };
        let result = match msg.msg_type {
            MessageType::NewView => variant.on_new_view(&mut round, signed),
            MessageType::Vote => variant.on_vote(&mut round, signed),
            other => variant.on_proposal(&mut round, other, signed),
        };

        match &result {
            Err(e @ ConsensusError::SafetyViolation(_)) => {
                tracing::error!(msg_type = %msg.msg_type, error = %e, "proposal rejected");
            }
            Err(e) => {
                tracing::warn!(msg_type = %msg.msg_type, error = %e, "message dropped");
            }
            Ok(()) => {}
        }
        result.map(|()| None)
    }

    pub async fn snapshot(&self) -> CoreSnapshot {
        self.shared.engine.lock().await.state.snapshot()
    }

    /// Stop the monitor, the init service and pending deferred tasks.
    pub async fn shutdown(&self) {
        let _ = self.shared.shutdown.send(());
        let mut guard = self.shared.engine.lock().await;
        guard.state.status = CoreStatus::Stopped;
        tracing::info!(member = %self.shared.me.public_key.short(), "consensus stopped");
    }

    async fn run_deferred(&self, scheduled_view: ViewNumber, action: Deferred) {
        let mut guard = self.shared.engine.lock().await;
        let Engine { state, variant } = &mut *guard;
        if state.status != CoreStatus::Running || state.view != scheduled_view {
            tracing::debug!(
                scheduled_view,
                view = state.view,
                "deferred task is stale, skipping"
            );
            return;
        }
        let mut round = Round {
            shared: &self.shared,
            state,
        };
        match action {
            Deferred::Send { to, msg } => round.send(&to, msg),
            Deferred::NextRound => match next_view(round.state.view) {
                Ok(next) => advance_to(&mut **variant, &mut round, next),
                Err(e) => tracing::warn!(error = %e, "cannot open the next round"),
            },
        }
    }

    /// Run `f` with a [`Round`] over the live state.
    #[cfg(test)]
    pub(crate) async fn with_round<R>(&self, f: impl FnOnce(&mut Round<'_>) -> R) -> R {
        let mut guard = self.shared.engine.lock().await;
        let mut round = Round {
            shared: &self.shared,
            state: &mut guard.state,
        };
        f(&mut round)
    }
}

/// Clear per-round collections and let the variant open the round.
pub(crate) fn new_round(variant: &mut dyn ProtocolVariant, round: &mut Round<'_>) {
    round.state.reset_round();
    tracing::debug!(
        view = round.state.view,
        leader = %round.leader(round.state.view).public_key.short(),
        is_leader = round.is_leader(round.state.view),
        "new round"
    );
    if let Err(e) = variant.on_new_round(round) {
        tracing::warn!(view = round.state.view, error = %e, "failed to open round");
    }
}

/// Move to `view` in the NewView phase, re-arm the timer, open a round.
pub(crate) fn advance_to(variant: &mut dyn ProtocolVariant, round: &mut Round<'_>, view: ViewNumber) {
    round.state.view = view;
    round.state.phase = Phase::NewView;
    round.reset_timer();
    new_round(variant, round);
}

/// Timeout-driven view change: exactly one view forward.
fn view_change(variant: &mut dyn ProtocolVariant, round: &mut Round<'_>) {
    let next = match next_view(round.state.view) {
        Ok(next) => next,
        Err(e) => {
            tracing::error!(error = %e, "view change impossible");
            return;
        }
    };
    variant.on_view_change(round);
    advance_to(variant, round, next);
}

/// A variant handler's access to the locked state and the core's collaborators.
pub struct Round<'a> {
    shared: &'a Arc<Shared>,
    pub state: &'a mut CoreState,
}

impl Round<'_> {
    pub fn me(&self) -> &PublicKey {
        &self.shared.me.public_key
    }

    pub fn members(&self) -> &MemberSet {
        &self.shared.members
    }

    pub fn leader(&self, view: ViewNumber) -> &Member {
        self.shared.members.leader(view)
    }

    pub fn is_leader(&self, view: ViewNumber) -> bool {
        self.leader(view).public_key == self.shared.me.public_key
    }

    pub fn has_enough_votes(&self, votes: usize) -> bool {
        self.shared.members.has_enough_votes(votes)
    }

    pub fn hasher(&self) -> &dyn Hasher {
        self.shared.caps.hasher.as_ref()
    }

    pub fn processor(&self) -> &dyn ExternalProcessor {
        self.shared.caps.processor.as_ref()
    }

    pub fn consensus_interval(&self) -> Duration {
        self.shared.config.consensus_interval
    }

    /// Whether a NewView or vote for `view` is near enough to keep.
    pub fn within_window(&self, view: ViewNumber) -> bool {
        view <= self.state.view.saturating_add(VIEW_WINDOW)
    }

    /// Checks that cost no hashing or signature work, run before anything
    /// else touches a proposal: the signer leads the proposal's view, and
    /// its justify is neither ahead of it nor more than [`MAX_VIEW_GAP`]
    /// views behind.
    pub fn screen_proposal(&self, msg: &SignedConsensusData) -> Result<(), ConsensusError> {
        let view = msg.view();
        let leader = self.leader(view);
        if leader.public_key != msg.signer {
            return Err(ConsensusError::SafetyViolation(format!(
                "proposal for view {view} signed by {} but leader is {}",
                msg.signer.short(),
                leader.public_key.short()
            )));
        }
        let justify_view = msg.justify().view();
        if justify_view > view {
            return Err(ConsensusError::SafetyViolation(format!(
                "justify view {justify_view} is ahead of proposal view {view}"
            )));
        }
        if view - justify_view > MAX_VIEW_GAP {
            return Err(ConsensusError::ViewOutOfRange(format!(
                "proposal view {view} is {} views past its justify",
                view - justify_view
            )));
        }
        Ok(())
    }

    pub fn verify_qc(&self, qc: &QuorumCertificate) -> bool {
        self.shared.members.verify_qc_votes(qc, self.hasher())
    }

    pub fn payload_hash(&self, payload: &ConsensusPayload) -> Result<Hash, ConsensusError> {
        Ok(payload_hash(self.hasher(), payload)?)
    }

    /// This replica's vote over `payload`.
    pub fn self_vote(&self, payload: &ConsensusPayload) -> Result<Vote, ConsensusError> {
        let hash = self.payload_hash(payload)?;
        Ok(Vote {
            signer: self.shared.me.public_key,
            signature: self.shared.caps.signer.sign(&hash)?,
        })
    }

    pub fn build(
        &self,
        msg_type: MessageType,
        data: ConsensusData,
    ) -> Result<ConsensusMessage, ConsensusError> {
        Ok(build_message(
            msg_type,
            data,
            self.shared.caps.signer.as_ref(),
            self.hasher(),
        )?)
    }

    /// Fire-and-forget unicast.
    pub fn send(&self, to: &Member, msg: ConsensusMessage) {
        if to.public_key == self.shared.me.public_key {
            tracing::debug!(msg_type = %msg.msg_type, "not sending to self");
            return;
        }
        let network = Arc::clone(&self.shared.caps.network);
        let to = to.clone();
        tokio::spawn(async move {
            let msg_type = msg.msg_type;
            if let Err(e) = network.send_to(&to, msg).await {
                tracing::debug!(to = %to.public_key.short(), %msg_type, error = %e, "send failed");
            }
        });
    }

    /// Fire-and-forget send to every other member.
    pub fn broadcast(&self, msg: ConsensusMessage) {
        for member in self.shared.members.members() {
            if member.public_key != self.shared.me.public_key {
                self.send(member, msg.clone());
            }
        }
    }

    pub fn reset_timer(&self) {
        self.shared.timer.reset();
    }

    /// Run `action` after `delay` unless the view moves in the meantime.
    pub fn defer(&self, delay: Duration, action: Deferred) {
        let core = ConsensusCore {
            shared: Arc::clone(self.shared),
        };
        let view = self.state.view;
        let mut shutdown_rx = self.shared.shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            core.run_deferred(view, action).await;
        });
    }

    /// Deliver a finalized payload to the application.
    pub fn decide(&mut self, view: ViewNumber, payload: ConsensusPayload) {
        self.state.decided += 1;
        tracing::info!(
            view,
            parent = %payload.parent,
            bytes = payload.customer_data.len(),
            "decided"
        );
        self.processor()
            .on_event(ConsensusEvent::Success { view, payload });
    }

    /// Record a NewView for the current view or one at most [`VIEW_WINDOW`]
    /// views ahead. Returns `false` for stale or duplicate messages.
    pub fn accept_new_view(&mut self, msg: SignedConsensusData) -> Result<bool, ConsensusError> {
        if msg.view() < self.state.view {
            tracing::debug!(msg_view = msg.view(), view = self.state.view, "stale NewView");
            return Ok(false);
        }
        if !self.within_window(msg.view()) {
            return Err(ConsensusError::ViewOutOfRange(format!(
                "NewView for view {} from {} while at view {}",
                msg.view(),
                msg.signer.short(),
                self.state.view
            )));
        }
        if msg.justify().view() > 0 && !self.verify_qc(msg.justify()) {
            return Err(ConsensusError::BadSignature(format!(
                "NewView justify for view {} from {}",
                msg.justify().view(),
                msg.signer.short()
            )));
        }
        Ok(self.state.new_views.insert(msg))
    }

    /// If NewViews for the current view reached quorum, consume them and
    /// return the highest justify (first seen on ties) together with its
    /// sender's `parent_id`.
    ///
    /// When the winner is still the view-0 certificate, a bootstrap QC is
    /// synthesized from every valid collected vote plus this replica's own,
    /// each signer counted once.
    pub fn take_high_qc(&mut self) -> Result<Option<(QuorumCertificate, Hash)>, ConsensusError> {
        let view = self.state.view;
        let collected: Vec<&SignedConsensusData> = self.state.new_views.for_view(view).collect();
        if collected.is_empty() || !self.has_enough_votes(collected.len()) {
            return Ok(None);
        }

        let mut best = collected[0];
        for msg in &collected[1..] {
            if msg.justify().view() > best.justify().view() {
                best = *msg;
            }
        }
        let mut qc = best.justify().clone();
        let sender_parent = best.data.parent_id;

        if qc.view() == 0 {
            let hash = self.payload_hash(qc.payload())?;
            let is_valid = |vote: &Vote| {
                self.members()
                    .verifier(&vote.signer)
                    .is_some_and(|v| v.verify(&hash, &vote.signature))
            };
            for msg in &collected {
                for vote in &msg.justify().votes {
                    if is_valid(vote) {
                        qc.add_vote(vote.clone());
                    }
                }
                let own = msg.vote();
                if is_valid(&own) {
                    qc.add_vote(own);
                }
            }
            let mine = self.self_vote(qc.payload())?;
            qc.add_vote(mine);
            tracing::debug!(votes = qc.vote_count(), "synthesized bootstrap QC");
        }

        tracing::debug!(
            view,
            new_views = collected.len(),
            high_qc_view = qc.view(),
            "NewView quorum reached"
        );
        self.state.new_views.remove_view(view);
        Ok(Some((qc, sender_parent)))
    }

    /// Full proposal check: [`screen_proposal`](Self::screen_proposal), then
    /// a quorum-forming justify, accepted customer data and the locking rule.
    ///
    /// `extends` decides whether the proposal extends the locked QC and is
    /// only consulted when one exists.
    pub fn check_proposal(
        &self,
        msg: &SignedConsensusData,
        extends: impl FnOnce(&QuorumCertificate) -> bool,
    ) -> Result<(), ConsensusError> {
        self.screen_proposal(msg)?;
        let data = &msg.data;
        let justify = &data.justify;

        if !self.verify_qc(justify) {
            return Err(ConsensusError::SafetyViolation(format!(
                "justify QC for view {} does not form a quorum",
                justify.view()
            )));
        }
        if !self
            .processor()
            .verify_customer_data(&data.payload.customer_data)
        {
            return Err(ConsensusError::SafetyViolation(format!(
                "customer data rejected at view {}",
                data.view_number
            )));
        }
        if let Some(locked) = &self.state.locked_qc {
            if data.view_number <= locked.view() && !extends(locked) {
                return Err(ConsensusError::SafetyViolation(format!(
                    "proposal at view {} neither outranks nor extends locked QC at view {}",
                    data.view_number,
                    locked.view()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{signed, signer, Fixture, LEADER_OF_VIEW_0};
    use hotstuff_crypto::Blake2bHasher;

    const REPLICA: usize = 0;

    fn new_view_from(fx: &Fixture, index: usize, view: ViewNumber) -> ConsensusMessage {
        let data = ConsensusData::new(
            view,
            Phase::NewView,
            ConsensusPayload::genesis(),
            QuorumCertificate::genesis(),
        );
        build_message(MessageType::NewView, data, fx.signers[index].as_ref(), &Blake2bHasher).unwrap()
    }

    #[tokio::test]
    async fn feed_accepts_valid_new_view() {
        let fx = Fixture::running(VariantKind::Basic, LEADER_OF_VIEW_0).await;
        let reply = fx.core.feed(new_view_from(&fx, 0, 0)).await.unwrap();
        assert!(reply.is_none());
        fx.core
            .with_round(|round| assert_eq!(round.state.new_views.len(), 1))
            .await;
    }

    #[tokio::test]
    async fn feed_rejects_foreign_protocol() {
        let fx = Fixture::running(VariantKind::Basic, REPLICA).await;
        let mut msg = new_view_from(&fx, 1, 0);
        msg.family = "other".into();
        let err = fx.core.feed(msg).await.unwrap_err();
        assert!(matches!(err, ConsensusError::ProtocolMismatch(_)));
    }

    #[tokio::test]
    async fn feed_rejects_non_member() {
        let fx = Fixture::running(VariantKind::Basic, REPLICA).await;
        let outsider = signer(40);
        let data = ConsensusData::new(
            0,
            Phase::NewView,
            ConsensusPayload::genesis(),
            QuorumCertificate::genesis(),
        );
        let msg = build_message(MessageType::NewView, data, outsider.as_ref(), &Blake2bHasher).unwrap();
        let err = fx.core.feed(msg).await.unwrap_err();
        assert!(matches!(err, ConsensusError::UnknownSender(_)));
    }

    #[tokio::test]
    async fn feed_rejects_tampered_seal() {
        let fx = Fixture::running(VariantKind::Basic, REPLICA).await;
        let mut body = signed(
            &fx.signers[1],
            ConsensusData::new(0, Phase::NewView, ConsensusPayload::genesis(), QuorumCertificate::genesis()),
        );
        body.data.view_number = 7;
        let msg = ConsensusMessage::new(MessageType::NewView, bincode::serialize(&body).unwrap());
        let err = fx.core.feed(msg).await.unwrap_err();
        assert!(matches!(err, ConsensusError::BadSignature(_)));
        assert_eq!(fx.core.snapshot().await.view, 0);
    }

    #[tokio::test]
    async fn feed_rejects_type_phase_mismatch() {
        let fx = Fixture::running(VariantKind::Basic, REPLICA).await;
        let data = ConsensusData::new(
            0,
            Phase::PreCommit,
            ConsensusPayload::genesis(),
            QuorumCertificate::genesis(),
        );
        let msg = build_message(MessageType::Prepare, data, fx.signers[1].as_ref(), &Blake2bHasher).unwrap();
        let err = fx.core.feed(msg).await.unwrap_err();
        assert!(matches!(err, ConsensusError::ProtocolMismatch(_)));
    }

    #[tokio::test]
    async fn feed_before_begin_is_not_running() {
        let fx = Fixture::new(VariantKind::Basic, LEADER_OF_VIEW_0);
        let err = fx.core.feed(new_view_from(&fx, 0, 0)).await.unwrap_err();
        assert!(matches!(err, ConsensusError::NotRunning));
    }

    #[tokio::test]
    async fn bootstrap_qc_counts_own_vote_once() {
        let fx = Fixture::running(VariantKind::Basic, LEADER_OF_VIEW_0).await;
        // Member 0 relays a bootstrap certificate that already holds our vote.
        let relayed = fx.bootstrap_qc(&[LEADER_OF_VIEW_0, 3]);
        let first = signed(
            &fx.signers[0],
            ConsensusData::new(0, Phase::NewView, ConsensusPayload::genesis(), relayed),
        );
        let second = signed(
            &fx.signers[2],
            ConsensusData::new(0, Phase::NewView, ConsensusPayload::genesis(), QuorumCertificate::genesis()),
        );

        let (qc, _) = fx
            .core
            .with_round(|round| {
                assert!(round.accept_new_view(first).unwrap());
                assert!(round.accept_new_view(second).unwrap());
                round.take_high_qc().unwrap().unwrap()
            })
            .await;

        let me = fx.members[LEADER_OF_VIEW_0].public_key;
        assert_eq!(qc.votes.iter().filter(|v| v.signer == me).count(), 1);
        assert_eq!(qc.vote_count(), 4);
        fx.core
            .with_round(|round| {
                assert!(round.verify_qc(&qc));
                assert!(round.state.new_views.is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn far_future_new_views_are_not_retained() {
        let fx = Fixture::running(VariantKind::Basic, REPLICA).await;
        for view in (1..=200).map(|i| i * 1_000) {
            let err = fx.core.feed(new_view_from(&fx, 2, view)).await.unwrap_err();
            assert!(matches!(err, ConsensusError::ViewOutOfRange(_)));
        }
        fx.core
            .with_round(|round| assert!(round.state.new_views.is_empty()))
            .await;

        // The edge of the window is still kept for later.
        fx.core.feed(new_view_from(&fx, 2, VIEW_WINDOW)).await.unwrap();
        fx.core
            .with_round(|round| assert_eq!(round.state.new_views.len(), 1))
            .await;
    }

    #[tokio::test]
    async fn far_future_generic_is_refused_before_regenerating_views() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        let view = 400_000;
        let data = ConsensusData::new(
            view,
            Phase::Generic,
            ConsensusPayload::new(Hash::ZERO, b"far".to_vec()),
            fx.bootstrap_qc(&[0, 2, 3]),
        )
        .with_parent(Hash::new([7; 32]))
        .sealed_id(&Blake2bHasher)
        .unwrap();
        let leader = fx.index_of_leader(view);
        let msg = build_message(MessageType::Generic, data, fx.signers[leader].as_ref(), &Blake2bHasher)
            .unwrap();

        let err = fx.core.feed(msg).await.unwrap_err();
        assert!(matches!(err, ConsensusError::ViewOutOfRange(_)));
        assert_eq!(fx.core.snapshot().await.view, 0);
    }

    #[tokio::test]
    async fn new_views_below_quorum_do_not_yield_high_qc() {
        let fx = Fixture::running(VariantKind::Basic, LEADER_OF_VIEW_0).await;
        let msg = signed(
            &fx.signers[0],
            ConsensusData::new(0, Phase::NewView, ConsensusPayload::genesis(), QuorumCertificate::genesis()),
        );
        let taken = fx
            .core
            .with_round(|round| {
                round.accept_new_view(msg).unwrap();
                round.take_high_qc().unwrap()
            })
            .await;
        assert!(taken.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn view_change_fires_once_per_timeout() {
        let fx = Fixture::new(VariantKind::Basic, REPLICA);
        fx.core.begin().await.unwrap();
        let timeout = fx.core.config().consensus_timeout;

        let leader_1 = fx.members[fx.index_of_leader(1)].public_key;
        let new_views_to_leader_1 = || -> Vec<ViewNumber> {
            fx.network
                .sent_of_type(MessageType::NewView)
                .iter()
                .filter(|(to, _)| to.public_key == leader_1)
                .map(|(_, msg)| parse_message(msg).unwrap().view())
                .collect()
        };

        tokio::time::sleep(timeout + Duration::from_millis(1)).await;
        let snap = fx.core.snapshot().await;
        assert_eq!(snap.view, 1);
        assert_eq!(snap.phase, Phase::NewView);
        fx.settle().await;
        assert_eq!(new_views_to_leader_1(), vec![1]);

        tokio::time::sleep(timeout - Duration::from_millis(500)).await;
        assert_eq!(fx.core.snapshot().await.view, 1);
        fx.settle().await;
        assert_eq!(new_views_to_leader_1(), vec![1]);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(fx.core.snapshot().await.view, 2);
        fx.core.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_task_skips_when_view_moved() {
        let fx = Fixture::running(VariantKind::Basic, REPLICA).await;
        fx.core
            .with_round(|round| {
                round.defer(Duration::from_millis(100), Deferred::NextRound);
                round.state.view = 3;
            })
            .await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fx.core.snapshot().await.view, 3);

        fx.core
            .with_round(|round| round.defer(Duration::from_millis(100), Deferred::NextRound))
            .await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fx.core.snapshot().await.view, 4);
    }

    #[tokio::test]
    async fn shutdown_stops_the_core() {
        let fx = Fixture::running(VariantKind::Chained, REPLICA).await;
        fx.core.shutdown().await;
        assert_eq!(fx.core.snapshot().await.status, CoreStatus::Stopped);
        assert!(matches!(
            fx.core.begin().await,
            Err(ConsensusError::NotRunning)
        ));
    }
}
