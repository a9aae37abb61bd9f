//! Consensus — HotStuff state machine replication for a fixed validator set.
//!
//! A [`ConsensusCore`] runs one replica. It tolerates `f` Byzantine members
//! out of `N >= 3f + 1`, rotates the leader every view and falls back to a
//! view change when the timer expires. Payloads are opaque: an
//! [`ExternalProcessor`](hotstuff_messages::ExternalProcessor) produces them
//! for proposals, validates them on receipt and receives them once decided.
//!
//! ## Module overview
//!
//! - [`replica`] — The engine: inbound validation, locking, timer and deferred tasks.
//! - [`variant`] — The strategy trait the two protocol variants implement.
//! - [`basic`] — Five-phase HotStuff (NewView, Prepare, PreCommit, Commit, Decide).
//! - [`chained`] — Pipelined HotStuff over a tree of Generic nodes.
//! - [`pacemaker`] — High-QC tracking and leader triggering for the chained variant.
//! - [`node_tree`] — Hash-keyed node storage, ancestry and skipped-view backfill.
//! - [`quorum`] — Thresholds, leader rotation and QC verification.
//! - [`state`] — Per-replica view, phase, message logs and QCs.
//! - [`timer`] — The view-change deadline.
//! - [`config`] — Configuration, validation and the capability bundle.
//! - [`error`] — Consensus error types.

pub mod basic;
pub mod chained;
pub mod config;
pub mod error;
pub mod node_tree;
pub mod pacemaker;
pub mod quorum;
pub mod replica;
pub mod state;
pub mod timer;
pub mod variant;

#[cfg(test)]
pub(crate) mod testing;

pub use basic::BasicHotStuff;
pub use chained::ChainedHotStuff;
pub use config::{
    Capabilities, ConsensusConfig, VariantKind, MAX_VIEW_GAP, MIN_MEMBERS, VIEW_WINDOW,
};
pub use error::ConsensusError;
pub use node_tree::NodeTree;
pub use pacemaker::RoundRobinPm;
pub use quorum::{has_enough_votes, leader_index, quorum_threshold, MemberSet};
pub use replica::{ConsensusCore, Deferred, Round};
pub use state::{next_view, CoreSnapshot, CoreState, CoreStatus, MessageLog};
pub use variant::{new_variant, ProtocolVariant};
