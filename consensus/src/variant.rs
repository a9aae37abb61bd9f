//! The protocol strategy a core is built with.

use crate::basic::BasicHotStuff;
use crate::chained::ChainedHotStuff;
use crate::config::VariantKind;
use crate::replica::Round;
use crate::ConsensusError;
use hotstuff_crypto::Hasher;
use hotstuff_messages::{ConsensusData, SignedConsensusData};
use hotstuff_types::MessageType;

/// Leader and replica behaviour for one HotStuff variant.
///
/// Every method runs under the core's lock. Handlers return an error only
/// to report why a message was dropped; state is left consistent either way.
pub trait ProtocolVariant: Send {
    fn kind(&self) -> VariantKind;

    /// Body of the NewView a replica sends to the leader of a fresh view.
    fn build_new_view(&self, round: &Round<'_>) -> Result<ConsensusData, ConsensusError>;

    /// Open the round for `round.state.view`.
    fn on_new_round(&mut self, round: &mut Round<'_>) -> Result<(), ConsensusError>;

    fn on_new_view(
        &mut self,
        round: &mut Round<'_>,
        msg: SignedConsensusData,
    ) -> Result<(), ConsensusError>;

    fn on_vote(&mut self, round: &mut Round<'_>, msg: SignedConsensusData)
        -> Result<(), ConsensusError>;

    /// A leader broadcast: Prepare, PreCommit, Commit, Decide or Generic.
    fn on_proposal(
        &mut self,
        round: &mut Round<'_>,
        msg_type: MessageType,
        msg: SignedConsensusData,
    ) -> Result<(), ConsensusError>;

    fn verify_proposal(
        &self,
        round: &Round<'_>,
        msg: &SignedConsensusData,
    ) -> Result<(), ConsensusError>;

    /// Called when the view-change timer fires, before the next round opens.
    fn on_view_change(&mut self, _round: &mut Round<'_>) {}
}

pub fn new_variant(
    kind: VariantKind,
    hasher: &dyn Hasher,
) -> Result<Box<dyn ProtocolVariant>, ConsensusError> {
    Ok(match kind {
        VariantKind::Basic => Box::new(BasicHotStuff::new()),
        VariantKind::Chained => Box::new(ChainedHotStuff::new(hasher)?),
    })
}
