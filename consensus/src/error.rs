use hotstuff_crypto::CryptoError;
use hotstuff_messages::{MessageError, ProcessorError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("sender {0} is not a member")]
    UnknownSender(String),

    #[error("bad signature: {0}")]
    BadSignature(String),

    #[error("safety violation: {0}")]
    SafetyViolation(String),

    #[error("view out of range: {0}")]
    ViewOutOfRange(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("external processor error: {0}")]
    Processor(#[from] ProcessorError),

    #[error("message error: {0}")]
    Message(#[from] MessageError),

    #[error("consensus core is not running")]
    NotRunning,
}

impl From<CryptoError> for ConsensusError {
    fn from(e: CryptoError) -> Self {
        Self::Message(MessageError::Crypto(e))
    }
}
