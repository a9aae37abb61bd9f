//! Canonical byte encoding for signing and hashing.
//!
//! bincode 1 with its default options (fixed-width little-endian integers,
//! u64 length prefixes, struct fields in declaration order) is bit-identical
//! across processes and platforms, which is the only property the consensus
//! core relies on.

use crate::{CryptoError, Hasher};
use hotstuff_types::Hash;
use serde::Serialize;

/// Encode `value` into its canonical byte form.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CryptoError> {
    bincode::serialize(value).map_err(|e| CryptoError::Encode(e.to_string()))
}

/// Hash the canonical encoding of `value`.
pub fn digest<T: Serialize + ?Sized>(hasher: &dyn Hasher, value: &T) -> Result<Hash, CryptoError> {
    Ok(hasher.sum(&canonical_bytes(value)?))
}
