use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("protocol mismatch: family {family:?} version {version}")]
    ProtocolMismatch { family: String, version: u16 },

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] hotstuff_crypto::CryptoError),
}

/// Failures raised by an [`ExternalProcessor`](crate::ExternalProcessor).
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("failed to build customer data: {0}")]
    Build(String),

    #[error("failed to decode customer data: {0}")]
    Decode(String),
}
