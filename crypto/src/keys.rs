//! Validator identities: Ed25519 key pairs and their hex forms.
//!
//! A member's secret is stored as a hex-encoded 32-byte seed; its public
//! key is shared in the member list as 64 hex characters.

use crate::CryptoError;
use ed25519_dalek::{SigningKey, VerifyingKey};
use hotstuff_types::{KeyPair, PrivateKey, PublicKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

fn keypair_of(signing_key: &SigningKey) -> KeyPair {
    KeyPair {
        public: PublicKey(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

/// A fresh identity from the OS random source.
pub fn generate_keypair() -> KeyPair {
    keypair_of(&SigningKey::generate(&mut OsRng))
}

/// The identity a 32-byte seed stands for. Tests derive whole validator
/// sets from small integer seeds.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    keypair_of(&SigningKey::from_bytes(seed))
}

/// Decode a hex seed as written in node configuration.
pub fn keypair_from_hex(text: &str) -> Result<KeyPair, CryptoError> {
    let bytes = Zeroizing::new(
        hex::decode(text.trim()).map_err(|e| CryptoError::InvalidSeed(e.to_string()))?,
    );
    let seed: Zeroizing<[u8; 32]> = Zeroizing::new(
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidSeed(format!("expected 32 bytes, got {}", bytes.len())))?,
    );
    Ok(keypair_from_seed(&seed))
}

/// Decode a hex member key, rejecting bytes that are not a curve point.
pub fn public_key_from_hex(text: &str) -> Result<PublicKey, CryptoError> {
    let bytes = hex::decode(text.trim()).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    let raw: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey(format!("expected 32 bytes, got {}", bytes.len())))?;
    VerifyingKey::from_bytes(&raw).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    Ok(PublicKey(raw))
}
