//! Member liveness tracking.

use hotstuff_types::{Member, PublicKey};
use std::collections::HashMap;
use std::time::Instant;

/// Per-member liveness metadata tracked by the [`PeerTable`].
#[derive(Clone, Debug)]
pub struct PeerState {
    pub member: Member,
    pub online: bool,
    /// When the member last answered a probe or a send.
    pub last_seen: Option<Instant>,
    /// Consecutive failed probes or sends since the member was last seen.
    pub failures: u32,
}

/// Liveness table for a fixed member set, keyed by public key.
///
/// Members start offline and flip online on the first successful exchange.
pub struct PeerTable {
    peers: HashMap<PublicKey, PeerState>,
    /// Members in configuration order.
    order: Vec<PublicKey>,
    num_online: usize,
}

impl PeerTable {
    pub fn new(members: &[Member]) -> Self {
        let mut peers = HashMap::with_capacity(members.len());
        let mut order = Vec::with_capacity(members.len());
        for member in members {
            if peers.contains_key(&member.public_key) {
                continue;
            }
            order.push(member.public_key);
            peers.insert(
                member.public_key,
                PeerState {
                    member: member.clone(),
                    online: false,
                    last_seen: None,
                    failures: 0,
                },
            );
        }
        Self {
            peers,
            order,
            num_online: 0,
        }
    }

    pub fn get(&self, key: &PublicKey) -> Option<&PeerState> {
        self.peers.get(key)
    }

    pub fn is_online(&self, key: &PublicKey) -> bool {
        self.peers.get(key).is_some_and(|p| p.online)
    }

    /// Record a successful exchange. Unknown keys are ignored.
    pub fn mark_online(&mut self, key: &PublicKey) {
        if let Some(peer) = self.peers.get_mut(key) {
            if !peer.online {
                self.num_online += 1;
                tracing::info!(member = %key, "member online");
            }
            peer.online = true;
            peer.last_seen = Some(Instant::now());
            peer.failures = 0;
        }
    }

    /// Record a failed exchange. Unknown keys are ignored.
    pub fn mark_offline(&mut self, key: &PublicKey) {
        if let Some(peer) = self.peers.get_mut(key) {
            if peer.online {
                self.num_online -= 1;
                tracing::info!(member = %key, "member offline");
            }
            peer.online = false;
            peer.failures = peer.failures.saturating_add(1);
        }
    }

    pub fn online_count(&self) -> usize {
        self.num_online
    }

    /// Online members in configuration order.
    pub fn online_members(&self) -> Vec<Member> {
        self.order
            .iter()
            .filter_map(|k| self.peers.get(k))
            .filter(|p| p.online)
            .map(|p| p.member.clone())
            .collect()
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.order.iter().filter_map(|k| self.peers.get(k)).map(|p| &p.member)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
