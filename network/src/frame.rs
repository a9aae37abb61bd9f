//! Length-prefixed framing.
//!
//! A frame is a 4-byte big-endian length followed by that many bytes. A
//! zero-length request frame is a liveness ping; the server answers it with
//! an empty reply.

use crate::NetworkError;
use hotstuff_messages::ConsensusMessage;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame body size.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024; // 4 MiB

pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<(), NetworkError>
where
    W: AsyncWrite + Unpin,
{
    if body.len() > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge(body.len()));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, NetworkError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

pub(crate) fn encode_reply(reply: &Option<ConsensusMessage>) -> Result<Vec<u8>, NetworkError> {
    bincode::serialize(reply).map_err(|e| NetworkError::Codec(e.to_string()))
}

pub(crate) fn decode_reply(bytes: &[u8]) -> Result<Option<ConsensusMessage>, NetworkError> {
    bincode::deserialize(bytes).map_err(|e| NetworkError::Codec(e.to_string()))
}
