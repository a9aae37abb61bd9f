use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("connection to {address} failed: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("member {0} not found")]
    UnknownMember(String),

    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),

    #[error("timed out talking to {0}")]
    Timeout(String),

    #[error("message error: {0}")]
    Message(#[from] hotstuff_messages::MessageError),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for NetworkError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
