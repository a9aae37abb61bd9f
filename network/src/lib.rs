//! Networking layer for HotStuff members.
//!
//! The consensus core only sees the [`Network`] trait. [`TcpNetwork`] is the
//! production implementation: one framed request/reply exchange per
//! connection, plus a background prober that keeps the [`PeerTable`] of
//! member liveness current.

pub mod error;
pub mod frame;
pub mod peers;
pub mod server;
pub mod tcp;
pub mod transport;

pub use error::NetworkError;
pub use frame::{read_frame, write_frame, MAX_FRAME_SIZE};
pub use peers::{PeerState, PeerTable};
pub use server::{spawn_listener, InboundHandler};
pub use tcp::TcpNetwork;
pub use transport::Network;
