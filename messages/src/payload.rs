//! The payload that consensus orders.

use hotstuff_types::Hash;
use serde::{Deserialize, Serialize};

/// An application payload linked to its predecessor by hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusPayload {
    /// Hash of the preceding accepted payload.
    pub parent: Hash,
    /// Opaque bytes owned by the external processor.
    pub customer_data: Vec<u8>,
}

impl ConsensusPayload {
    pub fn new(parent: Hash, customer_data: Vec<u8>) -> Self {
        Self {
            parent,
            customer_data,
        }
    }

    /// The payload every replica starts from: zero parent, no data.
    pub fn genesis() -> Self {
        Self::default()
    }

    pub fn is_genesis(&self) -> bool {
        self.parent.is_zero() && self.customer_data.is_empty()
    }
}
