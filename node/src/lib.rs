//! HotStuff member node.
//!
//! Wires a [`ConsensusCore`](hotstuff_consensus::ConsensusCore) to the TCP
//! transport and a demo application:
//! - TOML configuration for keys, members and timings
//! - An inbound listener feeding the core, plus a liveness prober
//! - [`BatchProcessor`], which orders submitted byte items in batches
//! - Prometheus metrics, structured logging, signal-driven shutdown

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod processor;
pub mod shutdown;

pub use config::{MemberEntry, NodeConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::HotStuffNode;
pub use processor::{Batch, BatchProcessor, CommittedBatch};
pub use shutdown::ShutdownController;
