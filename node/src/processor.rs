//! Demo application: orders opaque byte items in batches.
//!
//! A leader proposes the head of its local queue as a bincode-encoded
//! [`Batch`]. Items stay queued until a batch carrying them is decided, so
//! a round that dies in a view change does not lose them. Decided batches
//! go into a bounded FIFO of recent commits.

use crate::NodeMetrics;
use hotstuff_messages::{ConsensusEvent, ExternalProcessor, ProcessorError};
use hotstuff_types::{Hash, ViewNumber};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Customer data carried by one proposal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub items: Vec<Vec<u8>>,
}

impl Batch {
    pub fn encode(&self) -> Result<Vec<u8>, ProcessorError> {
        bincode::serialize(self).map_err(|e| ProcessorError::Build(e.to_string()))
    }

    /// Empty bytes decode as an empty batch: placeholder payloads carry none.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return Some(Self::default());
        }
        bincode::deserialize(bytes).ok()
    }
}

/// A decided batch as remembered by the processor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedBatch {
    pub view: ViewNumber,
    pub parent: Hash,
    pub batch: Batch,
}

/// Bounded FIFO of recent commits; the oldest entry is evicted first.
struct RecentlyCommitted {
    order: VecDeque<CommittedBatch>,
    capacity: usize,
}

impl RecentlyCommitted {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity.min(1_024)),
            capacity,
        }
    }

    fn push(&mut self, entry: CommittedBatch) {
        if self.capacity == 0 {
            return;
        }
        if self.order.len() >= self.capacity {
            self.order.pop_front();
        }
        self.order.push_back(entry);
    }
}

/// [`ExternalProcessor`] over a local queue of submitted items.
pub struct BatchProcessor {
    pending: Mutex<VecDeque<Vec<u8>>>,
    recent: Mutex<RecentlyCommitted>,
    max_batch_items: usize,
    metrics: Option<Arc<NodeMetrics>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl BatchProcessor {
    pub fn new(max_batch_items: usize, recent_capacity: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            recent: Mutex::new(RecentlyCommitted::new(recent_capacity)),
            max_batch_items,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<NodeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Queue an item for a future proposal led by this member.
    pub fn submit(&self, item: Vec<u8>) {
        let len = {
            let mut pending = lock(&self.pending);
            pending.push_back(item);
            pending.len()
        };
        if let Some(m) = &self.metrics {
            m.items_submitted.inc();
            m.pending_items.set(len as i64);
        }
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Recent commits, oldest first.
    pub fn recent(&self) -> Vec<CommittedBatch> {
        lock(&self.recent).order.iter().cloned().collect()
    }

    /// Drop the first queued copy of each decided item.
    fn retire(&self, batch: &Batch) -> usize {
        let mut pending = lock(&self.pending);
        for item in &batch.items {
            if let Some(pos) = pending.iter().position(|p| p == item) {
                pending.remove(pos);
            }
        }
        pending.len()
    }
}

impl ExternalProcessor for BatchProcessor {
    fn customer_data_to_consensus(&self) -> Result<Vec<u8>, ProcessorError> {
        let batch = Batch {
            items: lock(&self.pending)
                .iter()
                .take(self.max_batch_items)
                .cloned()
                .collect(),
        };
        batch.encode()
    }

    fn verify_customer_data(&self, data: &[u8]) -> bool {
        Batch::decode(data).is_some()
    }

    fn on_event(&self, event: ConsensusEvent) {
        match event {
            ConsensusEvent::Success { view, payload } => {
                let Some(batch) = Batch::decode(&payload.customer_data) else {
                    tracing::warn!(view, "decided payload is not a batch");
                    return;
                };
                let remaining = self.retire(&batch);
                tracing::info!(view, items = batch.items.len(), remaining, "batch committed");
                if let Some(m) = &self.metrics {
                    m.payloads_decided.inc();
                    m.batch_items.observe(batch.items.len() as f64);
                    m.pending_items.set(remaining as i64);
                }
                lock(&self.recent).push(CommittedBatch {
                    view,
                    parent: payload.parent,
                    batch,
                });
            }
        }
    }
}
