//! The outbound capability consumed by the consensus core.

use crate::NetworkError;
use async_trait::async_trait;
use hotstuff_messages::ConsensusMessage;
use hotstuff_types::Member;

/// Point-to-point delivery to other members.
#[async_trait]
pub trait Network: Send + Sync {
    /// Deliver `msg` to `member`, returning the member's reply if it produced one.
    async fn send_to(
        &self,
        member: &Member,
        msg: ConsensusMessage,
    ) -> Result<Option<ConsensusMessage>, NetworkError>;

    /// Members this node currently has a link to.
    fn linked_nodes(&self) -> Vec<Member>;

    fn is_online(&self, member: &Member) -> bool;
}
