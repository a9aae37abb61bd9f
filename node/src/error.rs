use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("consensus error: {0}")]
    Consensus(#[from] hotstuff_consensus::ConsensusError),

    #[error("network error: {0}")]
    Network(#[from] hotstuff_network::NetworkError),

    #[error("crypto error: {0}")]
    Crypto(#[from] hotstuff_crypto::CryptoError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("logging already initialised: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
