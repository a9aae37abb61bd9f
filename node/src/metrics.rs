//! Prometheus metrics for a HotStuff node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]; [`NodeMetrics::encode`]
//! renders it in the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::NodeError;

/// Node-level metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Consensus messages accepted off the wire (pings excluded).
    pub messages_received: IntCounter,
    /// Messages the core refused.
    pub messages_rejected: IntCounter,
    /// Payloads finalized by this member.
    pub payloads_decided: IntCounter,
    /// Items submitted to the local batch queue.
    pub items_submitted: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub current_view: IntGauge,
    /// Members, other than this one, that answered the last probe.
    pub peers_online: IntGauge,
    /// Items waiting to be proposed.
    pub pending_items: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Items per decided batch.
    pub batch_items: Histogram,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new [`Registry`].
    pub fn new() -> Result<Self, NodeError> {
        let registry = Registry::new();

        let messages_received = register_int_counter_with_registry!(
            Opts::new(
                "hotstuff_messages_received_total",
                "Consensus messages received from other members"
            ),
            registry
        )?;

        let messages_rejected = register_int_counter_with_registry!(
            Opts::new(
                "hotstuff_messages_rejected_total",
                "Consensus messages rejected by the core"
            ),
            registry
        )?;

        let payloads_decided = register_int_counter_with_registry!(
            Opts::new(
                "hotstuff_payloads_decided_total",
                "Payloads finalized by this member"
            ),
            registry
        )?;

        let items_submitted = register_int_counter_with_registry!(
            Opts::new(
                "hotstuff_items_submitted_total",
                "Items submitted to the local batch queue"
            ),
            registry
        )?;

        let current_view = register_int_gauge_with_registry!(
            Opts::new("hotstuff_current_view", "Current consensus view"),
            registry
        )?;

        let peers_online = register_int_gauge_with_registry!(
            Opts::new("hotstuff_peers_online", "Members that answered the last probe"),
            registry
        )?;

        let pending_items = register_int_gauge_with_registry!(
            Opts::new("hotstuff_pending_items", "Items waiting to be proposed"),
            registry
        )?;

        let batch_items = register_histogram_with_registry!(
            HistogramOpts::new("hotstuff_batch_items", "Items per decided batch")
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 10)?),
            registry
        )?;

        Ok(Self {
            registry,
            messages_received,
            messages_rejected,
            payloads_decided,
            items_submitted,
            current_view,
            peers_online,
            pending_items,
            batch_items,
        })
    }

    /// Render every metric in the text exposition format.
    pub fn encode(&self) -> Result<String, NodeError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| NodeError::Metrics(prometheus::Error::Msg(e.to_string())))
    }
}
