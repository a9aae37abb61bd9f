//! Fundamental types for the HotStuff consensus engine.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: hashes, keys and signatures, view numbers, protocol phases,
//! message kinds, and the validator set membership record.

pub mod hash;
pub mod keys;
pub mod member;
pub mod view;

pub use hash::Hash;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use member::Member;
pub use view::{MessageType, Phase, ViewNumber};
