//! Inbound side of the TCP transport.

use crate::frame::{encode_reply, read_frame, write_frame};
use crate::NetworkError;
use async_trait::async_trait;
use hotstuff_messages::ConsensusMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Read timeout for a single inbound exchange.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives decoded inbound messages and produces the optional reply.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, msg: ConsensusMessage) -> Option<ConsensusMessage>;
}

/// Accept connections until shutdown, serving one framed exchange per connection.
pub fn spawn_listener(
    listener: TcpListener,
    handler: Arc<dyn InboundHandler>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::debug!("listener shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, handler.as_ref()).await {
                                tracing::debug!(peer = %peer, error = %e, "inbound exchange failed");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }
    })
}

async fn serve_connection(
    mut stream: TcpStream,
    handler: &dyn InboundHandler,
) -> Result<(), NetworkError> {
    let body = tokio::time::timeout(READ_TIMEOUT, read_frame(&mut stream))
        .await
        .map_err(|_| NetworkError::Timeout("inbound peer".into()))??;

    // Empty frame: liveness ping.
    let reply = if body.is_empty() {
        None
    } else {
        let msg = ConsensusMessage::from_bytes(&body)?;
        handler.handle(msg).await
    };

    write_frame(&mut stream, &encode_reply(&reply)?).await
}
