//! The tagged envelope consensus messages travel in.

use crate::MessageError;
use hotstuff_types::MessageType;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_FAMILY: &str = "hotstuff";
pub const PROTOCOL_VERSION: u16 = 1;

/// A consensus message as handed to and received from the network.
///
/// `payload` is the bincode encoding of a
/// [`SignedConsensusData`](crate::SignedConsensusData).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusMessage {
    pub family: String,
    pub version: u16,
    pub msg_type: MessageType,
    pub payload: Vec<u8>,
}

impl ConsensusMessage {
    pub fn new(msg_type: MessageType, payload: Vec<u8>) -> Self {
        Self {
            family: PROTOCOL_FAMILY.to_string(),
            version: PROTOCOL_VERSION,
            msg_type,
            payload,
        }
    }

    pub fn check_protocol(&self) -> Result<(), MessageError> {
        if self.family != PROTOCOL_FAMILY || self.version != PROTOCOL_VERSION {
            return Err(MessageError::ProtocolMismatch {
                family: self.family.clone(),
                version: self.version,
            });
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        bincode::serialize(self).map_err(|e| MessageError::Encode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        bincode::deserialize(bytes).map_err(|e| MessageError::Decode(e.to_string()))
    }
}
