//! Blake2b hashing for payloads, proposal nodes and message seals.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use hotstuff_types::Hash;

type Blake2b256 = Blake2b<U32>;

/// Digest capability used by the consensus core.
///
/// Every replica must use the same implementation: payload hashes are what
/// QC votes attest to, and chained node ids are hashes too.
pub trait Hasher: Send + Sync {
    fn sum(&self, data: &[u8]) -> Hash;
}

/// The default [`Hasher`]: Blake2b with a 256-bit output.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake2bHasher;

impl Hasher for Blake2bHasher {
    fn sum(&self, data: &[u8]) -> Hash {
        Hash::new(blake2b_256(data))
    }
}

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}
