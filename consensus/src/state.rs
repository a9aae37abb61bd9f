//! Per-replica mutable state, guarded by the core's single lock.

use crate::ConsensusError;
use hotstuff_messages::{ConsensusData, QuorumCertificate, SignedConsensusData};
use hotstuff_types::{Phase, PublicKey, ViewNumber};
use std::collections::HashSet;

/// The view after `view`. Views near the top of the range come from the
/// network, so running off the end is an error rather than a wrap.
pub fn next_view(view: ViewNumber) -> Result<ViewNumber, ConsensusError> {
    view.checked_add(1)
        .ok_or_else(|| ConsensusError::ViewOutOfRange(format!("no view follows {view}")))
}

/// Lifecycle of a core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreStatus {
    /// Waiting for members to come online.
    Init,
    Running,
    Stopped,
}

/// Insertion-ordered messages, at most one per (signer, view, phase).
///
/// Later duplicates are ignored, so ties resolve to the first one seen.
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    entries: Vec<SignedConsensusData>,
    seen: HashSet<(PublicKey, ViewNumber, Phase)>,
}

fn key_of(msg: &SignedConsensusData) -> (PublicKey, ViewNumber, Phase) {
    (msg.signer, msg.view(), msg.phase())
}

impl MessageLog {
    /// Record `msg`. Returns `false` if its signer already has an entry for
    /// the same view and phase.
    pub fn insert(&mut self, msg: SignedConsensusData) -> bool {
        if !self.seen.insert(key_of(&msg)) {
            return false;
        }
        self.entries.push(msg);
        true
    }

    /// Drop everything older than `view`.
    pub fn retain_from(&mut self, view: ViewNumber) {
        self.entries.retain(|e| e.view() >= view);
        self.seen.retain(|&(_, v, _)| v >= view);
    }

    pub fn for_view(&self, view: ViewNumber) -> impl Iterator<Item = &SignedConsensusData> {
        self.entries.iter().filter(move |e| e.view() == view)
    }

    /// Entries for `(view, phase)` that `accept` lets through.
    pub fn matching<'a>(
        &'a self,
        view: ViewNumber,
        phase: Phase,
        mut accept: impl FnMut(&SignedConsensusData) -> bool + 'a,
    ) -> impl Iterator<Item = &'a SignedConsensusData> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.view() == view && e.phase() == phase && accept(e))
    }

    pub fn contains_signer(&self, view: ViewNumber, signer: &PublicKey) -> bool {
        self.entries
            .iter()
            .any(|e| e.view() == view && &e.signer == signer)
    }

    pub fn remove_view(&mut self, view: ViewNumber) {
        self.entries.retain(|e| e.view() != view);
        self.seen.retain(|&(_, v, _)| v != view);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct CoreState {
    pub view: ViewNumber,
    pub phase: Phase,
    pub status: CoreStatus,
    pub new_views: MessageLog,
    pub votes: MessageLog,
    pub prepare_qc: Option<QuorumCertificate>,
    pub locked_qc: Option<QuorumCertificate>,
    /// The proposal being voted on in the current view.
    pub proposal: Option<ConsensusData>,
    pub decided: u64,
}

impl CoreState {
    pub fn new() -> Self {
        Self {
            view: 0,
            phase: Phase::NewView,
            status: CoreStatus::Init,
            new_views: MessageLog::default(),
            votes: MessageLog::default(),
            prepare_qc: None,
            locked_qc: None,
            proposal: None,
            decided: 0,
        }
    }

    /// Highest QC this replica knows of, for NewView messages.
    pub fn high_qc(&self) -> QuorumCertificate {
        self.prepare_qc
            .clone()
            .unwrap_or_else(QuorumCertificate::genesis)
    }

    /// Replace the locked QC unless that would move it to a lower view.
    pub fn lock(&mut self, qc: QuorumCertificate) -> bool {
        if let Some(current) = &self.locked_qc {
            if qc.view() < current.view() {
                tracing::warn!(
                    locked = current.view(),
                    offered = qc.view(),
                    "refusing to lower locked QC"
                );
                return false;
            }
        }
        self.locked_qc = Some(qc);
        true
    }

    /// Per-round reset: drop stale collections and the current proposal.
    pub fn reset_round(&mut self) {
        self.new_views.retain_from(self.view);
        self.votes.retain_from(self.view);
        self.proposal = None;
    }

    pub fn snapshot(&self) -> CoreSnapshot {
        CoreSnapshot {
            view: self.view,
            phase: self.phase,
            status: self.status,
            prepare_qc_view: self.prepare_qc.as_ref().map(|qc| qc.view()),
            locked_qc_view: self.locked_qc.as_ref().map(|qc| qc.view()),
            decided: self.decided,
        }
    }
}

impl Default for CoreState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a core's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreSnapshot {
    pub view: ViewNumber,
    pub phase: Phase,
    pub status: CoreStatus,
    pub prepare_qc_view: Option<ViewNumber>,
    pub locked_qc_view: Option<ViewNumber>,
    /// Payloads finalized so far.
    pub decided: u64,
}
