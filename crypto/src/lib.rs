//! Cryptographic capabilities consumed by the consensus core.
//!
//! - **Ed25519** for message seals and QC votes ([`Signer`], [`SignerGenerator`])
//! - **Blake2b-256** for payload, node and seal digests ([`Hasher`])
//! - **bincode** as the deterministic canonical encoder that feeds both
//!
//! The consensus crate only sees the traits; the concrete types here are
//! what a node wires in.

pub mod encode;
pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;

pub use encode::{canonical_bytes, digest};
pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi, Blake2bHasher, Hasher};
pub use keys::{generate_keypair, keypair_from_hex, keypair_from_seed, public_key_from_hex};
pub use sign::{
    sign_message, verify_signature, Ed25519Signer, Ed25519SignerGenerator, Signer,
    SignerGenerator,
};
