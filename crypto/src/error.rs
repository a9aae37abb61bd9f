use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("signer {0} holds no private key")]
    VerifyOnly(String),

    #[error("invalid private key seed: {0}")]
    InvalidSeed(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("canonical encoding failed: {0}")]
    Encode(String),
}
