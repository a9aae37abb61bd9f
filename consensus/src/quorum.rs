//! Membership, leader rotation and quorum certificate verification.

use crate::ConsensusError;
use hotstuff_crypto::{Hasher, Signer, SignerGenerator};
use hotstuff_messages::{payload_hash, QuorumCertificate};
use hotstuff_types::{Member, PublicKey, ViewNumber};
use std::collections::{HashMap, HashSet};

/// Votes a leader needs besides its own: `N - ⌊N/3⌋ - 1`.
pub fn quorum_threshold(members: usize) -> usize {
    members.saturating_sub(members / 3).saturating_sub(1)
}

pub fn has_enough_votes(votes: usize, members: usize) -> bool {
    votes >= quorum_threshold(members)
}

/// Index of the leader for `view`: `(view + 1) mod N`.
pub fn leader_index(view: ViewNumber, members: usize) -> usize {
    debug_assert!(members > 0);
    (view.wrapping_add(1) % members as u64) as usize
}

/// The fixed validator set with a verifier per member.
pub struct MemberSet {
    members: Vec<Member>,
    verifiers: HashMap<PublicKey, Box<dyn Signer>>,
}

impl MemberSet {
    pub fn new(members: Vec<Member>, generator: &dyn SignerGenerator) -> Result<Self, ConsensusError> {
        if members.is_empty() {
            return Err(ConsensusError::Config("member list is empty".into()));
        }
        let mut verifiers = HashMap::with_capacity(members.len());
        for member in &members {
            let verifier = generator
                .from_raw_public_key(&member.public_key)
                .map_err(|e| ConsensusError::Config(format!("member {}: {e}", member.public_key)))?;
            verifiers.insert(member.public_key, verifier);
        }
        Ok(Self { members, verifiers })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.verifiers.contains_key(key)
    }

    pub fn get(&self, key: &PublicKey) -> Option<&Member> {
        self.members.iter().find(|m| &m.public_key == key)
    }

    pub fn verifier(&self, key: &PublicKey) -> Option<&dyn Signer> {
        self.verifiers.get(key).map(|v| v.as_ref())
    }

    pub fn leader(&self, view: ViewNumber) -> &Member {
        &self.members[leader_index(view, self.members.len())]
    }

    pub fn has_enough_votes(&self, votes: usize) -> bool {
        has_enough_votes(votes, self.members.len())
    }

    /// Check every vote in `qc` against hash(qc payload).
    ///
    /// Any non-member signer fails the certificate. A certificate carrying a
    /// single vote passes iff that vote is valid; otherwise the number of
    /// distinct valid signers must reach the quorum threshold.
    pub fn verify_qc_votes(&self, qc: &QuorumCertificate, hasher: &dyn Hasher) -> bool {
        let Ok(hash) = payload_hash(hasher, qc.payload()) else {
            return false;
        };

        let mut valid = HashSet::with_capacity(qc.votes.len());
        for vote in &qc.votes {
            let Some(verifier) = self.verifier(&vote.signer) else {
                tracing::warn!(signer = %vote.signer, view = qc.view(), "QC vote from non-member");
                return false;
            };
            if verifier.verify(&hash, &vote.signature) {
                valid.insert(vote.signer);
            } else {
                tracing::debug!(signer = %vote.signer, view = qc.view(), "invalid QC vote signature");
            }
        }

        if qc.votes.len() == 1 {
            return valid.len() == 1;
        }
        !valid.is_empty() && self.has_enough_votes(valid.len())
    }
}
