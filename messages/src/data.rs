//! Proposal and vote bodies.

use crate::{ConsensusPayload, QuorumCertificate, Vote};
use hotstuff_crypto::{digest, CryptoError, Hasher};
use hotstuff_types::{Hash, Phase, PublicKey, Signature, ViewNumber};
use serde::{Deserialize, Serialize};

/// The body of every consensus message.
///
/// `id` and `parent_id` link chained-variant nodes into a tree; the basic
/// variant leaves both zero. In chained NewView and Vote messages
/// `parent_id` names the node being voted for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusData {
    pub view_number: ViewNumber,
    pub phase: Phase,
    pub payload: ConsensusPayload,
    pub justify: QuorumCertificate,
    pub id: Hash,
    pub parent_id: Hash,
}

impl ConsensusData {
    pub fn new(
        view_number: ViewNumber,
        phase: Phase,
        payload: ConsensusPayload,
        justify: QuorumCertificate,
    ) -> Self {
        Self {
            view_number,
            phase,
            payload,
            justify,
            id: Hash::ZERO,
            parent_id: Hash::ZERO,
        }
    }

    pub fn with_parent(mut self, parent_id: Hash) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Hash of this node with its own `id` treated as zero.
    pub fn compute_id(&self, hasher: &dyn Hasher) -> Result<Hash, CryptoError> {
        digest(
            hasher,
            &(
                self.view_number,
                self.phase,
                &self.payload,
                &self.justify,
                Hash::ZERO,
                self.parent_id,
            ),
        )
    }

    /// Fill in `id` from [`compute_id`](Self::compute_id).
    pub fn sealed_id(mut self, hasher: &dyn Hasher) -> Result<Self, CryptoError> {
        self.id = self.compute_id(hasher)?;
        Ok(self)
    }

    /// Digest the sender seals. Covers every field, including `id` and `parent_id`.
    pub fn seal_hash(&self, hasher: &dyn Hasher) -> Result<Hash, CryptoError> {
        digest(hasher, self)
    }
}

/// A [`ConsensusData`] together with its signer's vote and seal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedConsensusData {
    pub data: ConsensusData,
    pub signer: PublicKey,
    /// Signature over hash(payload). Aggregated into quorum certificates.
    pub vote_signature: Signature,
    /// Signature over [`ConsensusData::seal_hash`].
    pub seal: Signature,
}

impl SignedConsensusData {
    pub fn view(&self) -> ViewNumber {
        self.data.view_number
    }

    pub fn phase(&self) -> Phase {
        self.data.phase
    }

    pub fn justify(&self) -> &QuorumCertificate {
        &self.data.justify
    }

    /// This message's vote, as it appears inside a certificate.
    pub fn vote(&self) -> Vote {
        Vote {
            signer: self.signer,
            signature: self.vote_signature.clone(),
        }
    }
}
