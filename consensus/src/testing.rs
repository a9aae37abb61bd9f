//! Four-member fixture for unit tests: one real core over nullable
//! collaborators, plus the other members' signers for forging traffic.

use crate::config::{Capabilities, ConsensusConfig, VariantKind};
use crate::replica::ConsensusCore;
use crate::quorum::leader_index;
use crate::state::CoreStatus;
use hotstuff_crypto::{keypair_from_seed, Blake2bHasher, Ed25519Signer, Ed25519SignerGenerator, Signer};
use hotstuff_messages::{
    payload_hash, sign_data, ConsensusData, ConsensusPayload, QcData, QuorumCertificate,
    SignedConsensusData, Vote,
};
use hotstuff_nullables::{NullNetwork, NullProcessor};
use hotstuff_types::{Hash, Member, Phase, ViewNumber};
use std::sync::Arc;

/// Member index that leads view 0.
pub(crate) const LEADER_OF_VIEW_0: usize = 1;

pub(crate) fn signer(index: usize) -> Arc<Ed25519Signer> {
    let seed = [index as u8 + 1; 32];
    Arc::new(Ed25519Signer::from_keypair(keypair_from_seed(&seed)))
}

pub(crate) fn signed(signer: &Ed25519Signer, data: ConsensusData) -> SignedConsensusData {
    sign_data(data, signer, &Blake2bHasher).unwrap()
}

pub(crate) struct Fixture {
    pub signers: Vec<Arc<Ed25519Signer>>,
    pub members: Vec<Member>,
    pub network: Arc<NullNetwork>,
    pub processor: Arc<NullProcessor>,
    pub core: ConsensusCore,
}

impl Fixture {
    /// A core for member `me`, marked running without arming the timer.
    pub async fn running(variant: VariantKind, me: usize) -> Self {
        let fx = Self::new(variant, me);
        fx.core
            .with_round(|round| round.state.status = CoreStatus::Running)
            .await;
        fx
    }

    /// A core for member `me` in the `Init` state.
    pub fn new(variant: VariantKind, me: usize) -> Self {
        let signers: Vec<_> = (0..4).map(signer).collect();
        let members: Vec<Member> = signers
            .iter()
            .enumerate()
            .map(|(i, s)| Member::new(s.public_key(), format!("127.0.0.1:{}", 7000 + i)))
            .collect();
        let network = Arc::new(NullNetwork::new(members.clone()));
        let processor = Arc::new(NullProcessor::new());
        let caps = Capabilities {
            signer: signers[me].clone(),
            signer_generator: Arc::new(Ed25519SignerGenerator),
            hasher: Arc::new(Blake2bHasher),
            network: network.clone(),
            processor: processor.clone(),
        };
        let core = ConsensusCore::new(ConsensusConfig::new(members.clone(), variant), caps).unwrap();
        Self {
            signers,
            members,
            network,
            processor,
            core,
        }
    }

    pub fn index_of_leader(&self, view: ViewNumber) -> usize {
        leader_index(view, self.members.len())
    }

    pub fn hash_of(&self, payload: &ConsensusPayload) -> Hash {
        payload_hash(&Blake2bHasher, payload).unwrap()
    }

    pub fn qc(
        &self,
        phase: Phase,
        view: ViewNumber,
        payload: ConsensusPayload,
        voters: &[usize],
    ) -> QuorumCertificate {
        let hash = self.hash_of(&payload);
        let votes = voters
            .iter()
            .map(|&i| Vote {
                signer: self.signers[i].public_key(),
                signature: self.signers[i].sign(&hash).unwrap(),
            })
            .collect();
        QuorumCertificate::with_votes(QcData::new(phase, view, payload), votes)
    }

    pub fn bootstrap_qc(&self, voters: &[usize]) -> QuorumCertificate {
        self.qc(Phase::NewView, 0, ConsensusPayload::genesis(), voters)
    }

    /// Let spawned sends run to completion.
    pub async fn settle(&self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }
}
