//! Hash-keyed proposal tree for the chained variant.

use crate::config::MAX_VIEW_GAP;
use crate::ConsensusError;
use hotstuff_crypto::{CryptoError, Hasher};
use hotstuff_messages::{ConsensusData, ConsensusPayload, QuorumCertificate};
use hotstuff_types::{Hash, Phase, ViewNumber};
use std::collections::HashMap;

/// The node every replica's tree starts from.
pub fn genesis_node(hasher: &dyn Hasher) -> Result<ConsensusData, CryptoError> {
    ConsensusData::new(
        0,
        Phase::Generic,
        ConsensusPayload::genesis(),
        QuorumCertificate::genesis(),
    )
    .sealed_id(hasher)
}

/// A no-op node filling a view gap. Depends only on `(view, parent_id)`.
pub fn dummy_node(
    view: ViewNumber,
    parent_id: Hash,
    hasher: &dyn Hasher,
) -> Result<ConsensusData, CryptoError> {
    ConsensusData::new(
        view,
        Phase::Generic,
        ConsensusPayload::genesis(),
        QuorumCertificate::genesis(),
    )
    .with_parent(parent_id)
    .sealed_id(hasher)
}

/// Nodes are immutable once inserted and only removed by [`prune_below`](Self::prune_below).
pub struct NodeTree {
    nodes: HashMap<Hash, ConsensusData>,
    genesis_id: Hash,
}

impl NodeTree {
    pub fn new(hasher: &dyn Hasher) -> Result<Self, CryptoError> {
        let genesis = genesis_node(hasher)?;
        let genesis_id = genesis.id;
        let mut nodes = HashMap::new();
        nodes.insert(genesis_id, genesis);
        Ok(Self { nodes, genesis_id })
    }

    pub fn genesis_id(&self) -> Hash {
        self.genesis_id
    }

    /// Insert `node` under its id. An existing entry is left untouched.
    pub fn insert(&mut self, node: ConsensusData) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id, node);
        true
    }

    pub fn get(&self, id: &Hash) -> Option<&ConsensusData> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &Hash) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every node with a view strictly below `view`.
    pub fn prune_below(&mut self, view: ViewNumber) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|_, n| n.view_number >= view);
        before - self.nodes.len()
    }

    /// Whether `ancestor` is reachable from `descendant` through parent links.
    pub fn extends(&self, descendant: Hash, ancestor: Hash) -> bool {
        let floor = match self.nodes.get(&ancestor) {
            Some(node) => node.view_number,
            None => return false,
        };
        let mut current = descendant;
        // Each step moves to a strictly older entry, so the walk is bounded.
        for _ in 0..=self.nodes.len() {
            if current == ancestor {
                return true;
            }
            match self.nodes.get(&current) {
                Some(node) if node.view_number >= floor && !node.parent_id.is_zero() => {
                    current = node.parent_id;
                }
                _ => return false,
            }
        }
        false
    }

    /// Dummy nodes for views `from.view + 1 .. to_view`, each chained to
    /// the one before and the first to `from`. Empty if `from` is unknown.
    /// Refuses gaps wider than [`MAX_VIEW_GAP`].
    ///
    /// Dummies are deterministic, so every replica derives the same chain.
    pub fn dummy_chain(
        &self,
        from: Hash,
        to_view: ViewNumber,
        hasher: &dyn Hasher,
    ) -> Result<Vec<ConsensusData>, ConsensusError> {
        let Some(start) = self.nodes.get(&from) else {
            return Ok(Vec::new());
        };
        let gap = to_view.saturating_sub(start.view_number);
        if gap > MAX_VIEW_GAP {
            return Err(ConsensusError::ViewOutOfRange(format!(
                "{gap} skipped views between {} and {to_view}",
                start.view_number
            )));
        }
        let mut chain = Vec::with_capacity(gap as usize);
        let mut tip = from;
        for view in start.view_number.saturating_add(1)..to_view {
            let dummy = dummy_node(view, tip, hasher)?;
            tip = dummy.id;
            chain.push(dummy);
        }
        Ok(chain)
    }

    /// Insert [`dummy_chain`](Self::dummy_chain) and return the id of its
    /// last node, or `from` if there is no gap. Repeating a backfill over
    /// the same gap inserts nothing new.
    pub fn backfill(
        &mut self,
        from: Hash,
        to_view: ViewNumber,
        hasher: &dyn Hasher,
    ) -> Result<Hash, ConsensusError> {
        let chain = self.dummy_chain(from, to_view, hasher)?;
        let tip = chain.last().map_or(from, |n| n.id);
        for dummy in chain {
            self.insert(dummy);
        }
        Ok(tip)
    }
}
