//! The bridge between consensus and the application it orders.

use crate::{ConsensusPayload, ProcessorError};
use hotstuff_types::ViewNumber;

/// Notifications the core delivers to the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsensusEvent {
    /// A payload was finalized.
    Success {
        view: ViewNumber,
        payload: ConsensusPayload,
    },
}

/// Application-side capability consumed by the consensus core.
///
/// Calls happen while the core holds its state lock, so implementations
/// should return promptly and must not call back into the core.
pub trait ExternalProcessor: Send + Sync {
    /// Produce the customer data for the next proposal this replica leads.
    fn customer_data_to_consensus(&self) -> Result<Vec<u8>, ProcessorError>;

    /// Independently check customer data proposed by another member.
    fn verify_customer_data(&self, data: &[u8]) -> bool;

    fn on_event(&self, event: ConsensusEvent);
}
