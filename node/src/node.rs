//! `HotStuffNode`: one member process wired end to end.
//!
//! Startup binds the listener, builds the TCP network and the batch
//! processor, then starts the consensus core, which waits in the background
//! until every member answers a probe before running round 0.

use crate::{BatchProcessor, NodeConfig, NodeError, NodeMetrics, ShutdownController};
use async_trait::async_trait;
use hotstuff_consensus::{Capabilities, ConsensusCore, ConsensusError};
use hotstuff_crypto::{Blake2bHasher, Ed25519Signer, Ed25519SignerGenerator, Signer};
use hotstuff_messages::ConsensusMessage;
use hotstuff_network::{spawn_listener, InboundHandler, TcpNetwork};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// How long `stop` waits for background tasks.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Feeds every inbound message to the core and counts the outcome.
struct CoreHandler {
    core: ConsensusCore,
    metrics: Arc<NodeMetrics>,
}

#[async_trait]
impl InboundHandler for CoreHandler {
    async fn handle(&self, msg: ConsensusMessage) -> Option<ConsensusMessage> {
        self.metrics.messages_received.inc();
        match self.core.feed(msg).await {
            Ok(reply) => reply,
            Err(ConsensusError::NotRunning) => None,
            Err(e) => {
                self.metrics.messages_rejected.inc();
                tracing::debug!(error = %e, "inbound message rejected");
                None
            }
        }
    }
}

pub struct HotStuffNode {
    config: NodeConfig,
    core: ConsensusCore,
    network: Arc<TcpNetwork>,
    processor: Arc<BatchProcessor>,
    metrics: Arc<NodeMetrics>,
    shutdown: ShutdownController,
    local_addr: SocketAddr,
    task_handles: Vec<JoinHandle<()>>,
}

impl HotStuffNode {
    /// Bind `config.listen_addr` and start every subsystem.
    pub async fn start(config: NodeConfig) -> Result<Self, NodeError> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        Self::start_with_listener(config, listener).await
    }

    /// Start on an already-bound listener.
    pub async fn start_with_listener(
        config: NodeConfig,
        listener: TcpListener,
    ) -> Result<Self, NodeError> {
        let consensus_config = config.consensus_config()?;
        let signer = Arc::new(Ed25519Signer::from_keypair(config.keypair()?));
        let self_key = signer.public_key();
        let local_addr = listener.local_addr()?;

        tracing::info!(
            member = %self_key.short(),
            listen = %local_addr,
            members = consensus_config.members.len(),
            variant = %consensus_config.variant,
            "HotStuff node starting"
        );

        let metrics = Arc::new(NodeMetrics::new()?);
        let processor = Arc::new(
            BatchProcessor::new(config.max_batch_items, config.recent_capacity)
                .with_metrics(Arc::clone(&metrics)),
        );
        let network = Arc::new(TcpNetwork::new(self_key, &consensus_config.members));

        let caps = Capabilities {
            signer,
            signer_generator: Arc::new(Ed25519SignerGenerator),
            hasher: Arc::new(Blake2bHasher),
            network: network.clone(),
            processor: processor.clone(),
        };
        let core = ConsensusCore::start(consensus_config, caps)?;

        let shutdown = ShutdownController::new();
        let handler = Arc::new(CoreHandler {
            core: core.clone(),
            metrics: Arc::clone(&metrics),
        });
        let task_handles = vec![
            spawn_listener(listener, handler, shutdown.subscribe()),
            network.spawn_prober(config.probe_interval(), shutdown.subscribe()),
            spawn_metrics_refresher(
                core.clone(),
                network.clone(),
                metrics.clone(),
                config.probe_interval(),
                shutdown.subscribe(),
            ),
        ];

        Ok(Self {
            config,
            core,
            network,
            processor,
            metrics,
            shutdown,
            local_addr,
            task_handles,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn core(&self) -> &ConsensusCore {
        &self.core
    }

    pub fn processor(&self) -> &Arc<BatchProcessor> {
        &self.processor
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn online_peers(&self) -> usize {
        self.network.online_count()
    }

    /// Queue an item for ordering.
    pub fn submit(&self, item: Vec<u8>) {
        self.processor.submit(item);
    }

    /// A controller whose `shutdown` stops this node's background tasks.
    pub fn shutdown_controller(&self) -> ShutdownController {
        self.shutdown.clone()
    }

    /// Block until SIGINT/SIGTERM, then stop.
    pub async fn run_until_signal(mut self) -> Result<(), NodeError> {
        self.shutdown.wait_for_signal().await;
        self.stop().await
    }

    /// Stop the core and every background task.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!(member = %self.core.public_key().short(), "HotStuff node stopping");

        self.shutdown.shutdown();
        self.core.shutdown().await;

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }

        refresh_metrics(&self.core, &self.network, &self.metrics).await;
        tracing::info!(decided = self.metrics.payloads_decided.get(), "HotStuff node stopped");
        Ok(())
    }
}

async fn refresh_metrics(core: &ConsensusCore, network: &TcpNetwork, metrics: &NodeMetrics) {
    let snapshot = core.snapshot().await;
    metrics.current_view.set(snapshot.view as i64);
    metrics.peers_online.set(network.online_count() as i64);
}

fn spawn_metrics_refresher(
    core: ConsensusCore,
    network: Arc<TcpNetwork>,
    metrics: Arc<NodeMetrics>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => refresh_metrics(&core, &network, &metrics).await,
            }
        }
    })
}
