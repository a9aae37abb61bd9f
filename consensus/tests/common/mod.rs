//! In-process cluster: every core talks to the others through a router
//! that calls `feed` directly.

#![allow(dead_code)]

use async_trait::async_trait;
use hotstuff_consensus::{Capabilities, ConsensusConfig, ConsensusCore, VariantKind};
use hotstuff_crypto::{keypair_from_seed, Blake2bHasher, Ed25519Signer, Ed25519SignerGenerator, Signer};
use hotstuff_messages::{ConsensusMessage, ConsensusPayload};
use hotstuff_network::{Network, NetworkError};
use hotstuff_nullables::NullProcessor;
use hotstuff_types::{Member, PublicKey, ViewNumber};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Router {
    cores: RwLock<HashMap<PublicKey, ConsensusCore>>,
    down: Mutex<HashSet<PublicKey>>,
}

impl Router {
    fn core(&self, key: &PublicKey) -> Option<ConsensusCore> {
        self.cores.read().unwrap().get(key).cloned()
    }

    fn is_down(&self, key: &PublicKey) -> bool {
        self.down.lock().unwrap().contains(key)
    }

    pub fn set_down(&self, key: PublicKey, down: bool) {
        let mut set = self.down.lock().unwrap();
        if down {
            set.insert(key);
        } else {
            set.remove(&key);
        }
    }
}

/// One member's view of the router.
pub struct RoutedNetwork {
    from: PublicKey,
    members: Vec<Member>,
    router: Arc<Router>,
}

#[async_trait]
impl Network for RoutedNetwork {
    async fn send_to(
        &self,
        member: &Member,
        msg: ConsensusMessage,
    ) -> Result<Option<ConsensusMessage>, NetworkError> {
        if self.router.is_down(&self.from) || self.router.is_down(&member.public_key) {
            return Err(NetworkError::ConnectionFailed {
                address: member.address.clone(),
                reason: "member is down".into(),
            });
        }
        let core = self
            .router
            .core(&member.public_key)
            .ok_or_else(|| NetworkError::UnknownMember(member.public_key.short()))?;
        // Rejections are the receiver's business.
        let _ = core.feed(msg).await;
        Ok(None)
    }

    fn linked_nodes(&self) -> Vec<Member> {
        self.members.clone()
    }

    fn is_online(&self, member: &Member) -> bool {
        !self.router.is_down(&member.public_key)
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

pub struct Node {
    pub member: Member,
    pub core: ConsensusCore,
    pub processor: Arc<NullProcessor>,
}

pub struct Cluster {
    pub nodes: Vec<Node>,
    pub router: Arc<Router>,
}

pub fn member_signer(index: usize) -> Arc<Ed25519Signer> {
    let seed = [index as u8 + 1; 32];
    Arc::new(Ed25519Signer::from_keypair(keypair_from_seed(&seed)))
}

pub fn config(members: Vec<Member>, variant: VariantKind) -> ConsensusConfig {
    let mut config = ConsensusConfig::new(members, variant);
    config.member_check_interval = Duration::from_millis(10);
    config.consensus_timeout = Duration::from_millis(600);
    config.consensus_interval = Duration::from_millis(10);
    config
}

impl Cluster {
    /// Build `n` cores and register them with the router. Nothing runs yet.
    pub fn new(n: usize, variant: VariantKind) -> Self {
        let signers: Vec<_> = (0..n).map(member_signer).collect();
        let members: Vec<Member> = signers
            .iter()
            .enumerate()
            .map(|(i, s)| Member::new(s.public_key(), format!("node-{i}")))
            .collect();
        let router = Arc::new(Router::default());

        let nodes: Vec<Node> = signers
            .into_iter()
            .zip(members.iter().cloned())
            .map(|(signer, member)| {
                let processor = Arc::new(NullProcessor::new());
                let caps = Capabilities {
                    signer,
                    signer_generator: Arc::new(Ed25519SignerGenerator),
                    hasher: Arc::new(Blake2bHasher),
                    network: Arc::new(RoutedNetwork {
                        from: member.public_key,
                        members: members.clone(),
                        router: router.clone(),
                    }),
                    processor: processor.clone(),
                };
                let core = ConsensusCore::new(config(members.clone(), variant), caps).unwrap();
                Node {
                    member,
                    core,
                    processor,
                }
            })
            .collect();

        {
            let mut cores = router.cores.write().unwrap();
            for node in &nodes {
                cores.insert(node.member.public_key, node.core.clone());
            }
        }
        Self { nodes, router }
    }

    /// Begin round 0 on every member that is not down.
    pub async fn begin(&self) {
        for node in &self.nodes {
            if !self.router.is_down(&node.member.public_key) {
                node.core.begin().await.unwrap();
            }
        }
    }

    pub fn crash(&self, index: usize) {
        self.router.set_down(self.nodes[index].member.public_key, true);
    }

    pub fn live(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(|n| !self.router.is_down(&n.member.public_key))
    }

    /// Poll until every live member has decided at least `count` payloads.
    pub async fn wait_for_decisions(&self, count: usize, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.live().all(|n| n.processor.committed().len() >= count) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    pub async fn shutdown(&self) {
        for node in &self.nodes {
            node.core.shutdown().await;
        }
    }

    /// No two members decided different payloads for the same view.
    pub fn assert_agreement(&self) {
        let mut by_view: HashMap<ViewNumber, ConsensusPayload> = HashMap::new();
        for node in &self.nodes {
            for (view, payload) in node.processor.committed() {
                if let Some(existing) = by_view.get(&view) {
                    assert_eq!(existing, &payload, "conflicting decisions at view {view}");
                } else {
                    by_view.insert(view, payload);
                }
            }
        }
    }

    /// Every member's decisions are in strictly increasing view order.
    pub fn assert_ordered(&self) {
        for node in &self.nodes {
            let views: Vec<_> = node.processor.committed().iter().map(|(v, _)| *v).collect();
            assert!(
                views.windows(2).all(|w| w[0] < w[1]),
                "decisions out of order: {views:?}"
            );
        }
    }
}
