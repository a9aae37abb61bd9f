//! Nullable external processor: scripted payloads, recorded commits.

use crate::lock;
use hotstuff_messages::{ConsensusEvent, ConsensusPayload, ExternalProcessor, ProcessorError};
use hotstuff_types::ViewNumber;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// A test processor.
///
/// Proposals use queued customer data if any, otherwise a counter-derived
/// default (`b"batch-<n>"`) so consecutive proposals differ.
#[derive(Default)]
pub struct NullProcessor {
    queued: Mutex<VecDeque<Vec<u8>>>,
    produced: AtomicU64,
    reject: AtomicBool,
    events: Mutex<Vec<ConsensusEvent>>,
}

impl NullProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue customer data for the next proposal.
    pub fn enqueue(&self, data: Vec<u8>) {
        lock(&self.queued).push_back(data);
    }

    /// Make `verify_customer_data` reject everything.
    pub fn reject_all(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<ConsensusEvent> {
        lock(&self.events).clone()
    }

    /// Committed (view, payload) pairs, in delivery order.
    pub fn committed(&self) -> Vec<(ViewNumber, ConsensusPayload)> {
        lock(&self.events)
            .iter()
            .map(|e| match e {
                ConsensusEvent::Success { view, payload } => (*view, payload.clone()),
            })
            .collect()
    }

    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::SeqCst)
    }
}

impl ExternalProcessor for NullProcessor {
    fn customer_data_to_consensus(&self) -> Result<Vec<u8>, ProcessorError> {
        let n = self.produced.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.queued)
            .pop_front()
            .unwrap_or_else(|| format!("batch-{n}").into_bytes()))
    }

    fn verify_customer_data(&self, _data: &[u8]) -> bool {
        !self.reject.load(Ordering::SeqCst)
    }

    fn on_event(&self, event: ConsensusEvent) {
        lock(&self.events).push(event);
    }
}
