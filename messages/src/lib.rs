//! Consensus message shapes for HotStuff replica-to-replica communication.
//!
//! - [`payload`] — the application payload chained by parent hash.
//! - [`qc`] — quorum certificates and the votes they aggregate.
//! - [`data`] — proposal/vote bodies and their signed form.
//! - [`envelope`] — the tagged wire envelope every message travels in.
//! - [`codec`] — signing, building and parsing messages.
//! - [`processor`] — the application bridge consumed by the core.

pub mod codec;
pub mod data;
pub mod envelope;
pub mod error;
pub mod payload;
pub mod processor;
pub mod qc;

pub use codec::{build_message, parse_message, payload_hash, sign_data, verify_signed};
pub use data::{ConsensusData, SignedConsensusData};
pub use envelope::{ConsensusMessage, PROTOCOL_FAMILY, PROTOCOL_VERSION};
pub use error::{MessageError, ProcessorError};
pub use payload::ConsensusPayload;
pub use processor::{ConsensusEvent, ExternalProcessor};
pub use qc::{QcData, QuorumCertificate, Vote};
