//! Outbound side of the TCP transport.

use crate::frame::{decode_reply, read_frame, write_frame};
use crate::{Network, NetworkError, PeerTable};
use async_trait::async_trait;
use hotstuff_messages::ConsensusMessage;
use hotstuff_types::{Member, PublicKey};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// [`Network`] over plain TCP, one connection per exchange.
pub struct TcpNetwork {
    self_key: PublicKey,
    peers: RwLock<PeerTable>,
}

impl TcpNetwork {
    pub fn new(self_key: PublicKey, members: &[Member]) -> Self {
        Self {
            self_key,
            peers: RwLock::new(PeerTable::new(members)),
        }
    }

    fn peers(&self) -> RwLockReadGuard<'_, PeerTable> {
        self.peers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn peers_mut(&self) -> RwLockWriteGuard<'_, PeerTable> {
        self.peers.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn online_count(&self) -> usize {
        self.peers().online_count()
    }

    /// One request/reply exchange. Updates liveness either way.
    async fn exchange(&self, member: &Member, body: &[u8]) -> Result<Vec<u8>, NetworkError> {
        let result = exchange_with(&member.address, body).await;
        match &result {
            Ok(_) => self.peers_mut().mark_online(&member.public_key),
            Err(e) => {
                tracing::debug!(member = %member.public_key, address = %member.address, error = %e, "exchange failed");
                self.peers_mut().mark_offline(&member.public_key);
            }
        }
        result
    }

    /// Ping every other member once.
    pub async fn probe_all(&self) {
        let targets: Vec<Member> = self
            .peers()
            .members()
            .filter(|m| m.public_key != self.self_key)
            .cloned()
            .collect();
        for member in targets {
            let _ = self.exchange(&member, &[]).await;
        }
    }

    /// Probe all members every `interval` until shutdown.
    pub fn spawn_prober(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let network = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("prober shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        network.probe_all().await;
                        tracing::trace!(online = network.online_count(), "probe round complete");
                    }
                }
            }
        })
    }
}

async fn exchange_with(address: &str, body: &[u8]) -> Result<Vec<u8>, NetworkError> {
    let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
        .await
        .map_err(|_| NetworkError::Timeout(address.to_string()))?
        .map_err(|e| NetworkError::ConnectionFailed {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

    tokio::time::timeout(EXCHANGE_TIMEOUT, async {
        write_frame(&mut stream, body).await?;
        read_frame(&mut stream).await
    })
    .await
    .map_err(|_| NetworkError::Timeout(address.to_string()))?
}

#[async_trait]
impl Network for TcpNetwork {
    async fn send_to(
        &self,
        member: &Member,
        msg: ConsensusMessage,
    ) -> Result<Option<ConsensusMessage>, NetworkError> {
        if self.peers().get(&member.public_key).is_none() {
            return Err(NetworkError::UnknownMember(member.public_key.to_string()));
        }
        let body = msg.to_bytes()?;
        let reply = self.exchange(member, &body).await?;
        decode_reply(&reply)
    }

    fn linked_nodes(&self) -> Vec<Member> {
        self.peers()
            .online_members()
            .into_iter()
            .filter(|m| m.public_key != self.self_key)
            .collect()
    }

    fn is_online(&self, member: &Member) -> bool {
        member.public_key == self.self_key || self.peers().is_online(&member.public_key)
    }
}
