//! Quorum certificates.

use crate::ConsensusPayload;
use hotstuff_types::{Hash, Phase, PublicKey, Signature, ViewNumber};
use serde::{Deserialize, Serialize};

/// What a quorum certificate certifies.
///
/// `node_id` is only meaningful in the chained variant, where it names the
/// tree node the votes were cast for. The basic variant leaves it zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcData {
    pub phase: Phase,
    pub view_number: ViewNumber,
    pub payload: ConsensusPayload,
    pub node_id: Hash,
}

impl QcData {
    pub fn new(phase: Phase, view_number: ViewNumber, payload: ConsensusPayload) -> Self {
        Self {
            phase,
            view_number,
            payload,
            node_id: Hash::ZERO,
        }
    }

    pub fn with_node(mut self, node_id: Hash) -> Self {
        self.node_id = node_id;
        self
    }
}

/// A member's signature over the payload hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub signer: PublicKey,
    pub signature: Signature,
}

/// A set of votes from distinct members over the same [`QcData`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumCertificate {
    pub data: QcData,
    pub votes: Vec<Vote>,
}

impl QuorumCertificate {
    pub fn new(data: QcData) -> Self {
        Self {
            data,
            votes: Vec::new(),
        }
    }

    pub fn with_votes(data: QcData, votes: Vec<Vote>) -> Self {
        let mut qc = Self::new(data);
        for vote in votes {
            qc.add_vote(vote);
        }
        qc
    }

    /// The certificate every replica holds before anything is certified.
    pub fn genesis() -> Self {
        Self::new(QcData::new(Phase::NewView, 0, ConsensusPayload::genesis()))
    }

    pub fn view(&self) -> ViewNumber {
        self.data.view_number
    }

    pub fn phase(&self) -> Phase {
        self.data.phase
    }

    pub fn payload(&self) -> &ConsensusPayload {
        &self.data.payload
    }

    pub fn node_id(&self) -> Hash {
        self.data.node_id
    }

    pub fn has_vote_from(&self, signer: &PublicKey) -> bool {
        self.votes.iter().any(|v| &v.signer == signer)
    }

    /// Append `vote` unless its signer already voted. Returns whether it was added.
    pub fn add_vote(&mut self, vote: Vote) -> bool {
        if self.has_vote_from(&vote.signer) {
            return false;
        }
        self.votes.push(vote);
        true
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }
}
