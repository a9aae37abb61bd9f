//! Ed25519 message signing and verification.

use crate::CryptoError;
use ed25519_dalek::{Signer as _, SigningKey, Verifier, VerifyingKey};
use hotstuff_types::{Hash, KeyPair, PrivateKey, PublicKey, Signature};

/// A member's signing capability.
///
/// Signers built from a raw public key (see [`SignerGenerator`]) can only
/// verify; `sign` on them returns [`CryptoError::VerifyOnly`].
pub trait Signer: Send + Sync {
    fn public_key(&self) -> PublicKey;

    fn sign(&self, hash: &Hash) -> Result<Signature, CryptoError>;

    fn verify(&self, hash: &Hash, signature: &Signature) -> bool;
}

/// Builds verify-only signers for other members.
pub trait SignerGenerator: Send + Sync {
    fn from_raw_public_key(&self, key: &PublicKey) -> Result<Box<dyn Signer>, CryptoError>;
}

/// Ed25519 implementation of [`Signer`].
pub struct Ed25519Signer {
    public: PublicKey,
    private: Option<PrivateKey>,
}

impl Ed25519Signer {
    /// A signer able to both sign and verify.
    pub fn from_keypair(keypair: KeyPair) -> Self {
        Self {
            public: keypair.public,
            private: Some(keypair.private),
        }
    }

    /// A verify-only signer for a remote member.
    pub fn verify_only(public: PublicKey) -> Self {
        Self {
            public,
            private: None,
        }
    }
}

impl Signer for Ed25519Signer {
    fn public_key(&self) -> PublicKey {
        self.public
    }

    fn sign(&self, hash: &Hash) -> Result<Signature, CryptoError> {
        let private = self
            .private
            .as_ref()
            .ok_or_else(|| CryptoError::VerifyOnly(self.public.short()))?;
        Ok(sign_message(hash.as_bytes(), private))
    }

    fn verify(&self, hash: &Hash, signature: &Signature) -> bool {
        verify_signature(hash.as_bytes(), signature, &self.public)
    }
}

/// Ed25519 implementation of [`SignerGenerator`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519SignerGenerator;

impl SignerGenerator for Ed25519SignerGenerator {
    fn from_raw_public_key(&self, key: &PublicKey) -> Result<Box<dyn Signer>, CryptoError> {
        VerifyingKey::from_bytes(&key.0)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Box::new(Ed25519Signer::verify_only(*key)))
    }
}

/// Sign a message with a private key, returning the signature.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    let sig = signing_key.sign(message);
    Signature(sig.to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Returns `true` if the signature is valid, `false` otherwise.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}
