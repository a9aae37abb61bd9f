//! Signing, building and parsing consensus messages.

use crate::{ConsensusData, ConsensusMessage, ConsensusPayload, MessageError, SignedConsensusData};
use hotstuff_crypto::{canonical_bytes, digest, CryptoError, Hasher, Signer};
use hotstuff_types::{Hash, MessageType};

/// The digest members vote on.
pub fn payload_hash(hasher: &dyn Hasher, payload: &ConsensusPayload) -> Result<Hash, CryptoError> {
    digest(hasher, payload)
}

/// Attach `signer`'s vote and seal to `data`.
pub fn sign_data(
    data: ConsensusData,
    signer: &dyn Signer,
    hasher: &dyn Hasher,
) -> Result<SignedConsensusData, MessageError> {
    let vote_signature = signer.sign(&payload_hash(hasher, &data.payload)?)?;
    let seal = signer.sign(&data.seal_hash(hasher)?)?;
    Ok(SignedConsensusData {
        data,
        signer: signer.public_key(),
        vote_signature,
        seal,
    })
}

/// Sign `data` and wrap it in an envelope of type `msg_type`.
pub fn build_message(
    msg_type: MessageType,
    data: ConsensusData,
    signer: &dyn Signer,
    hasher: &dyn Hasher,
) -> Result<ConsensusMessage, MessageError> {
    let signed = sign_data(data, signer, hasher)?;
    let payload = canonical_bytes(&signed)?;
    Ok(ConsensusMessage::new(msg_type, payload))
}

/// Decode the signed body of an envelope. Does not check signatures.
pub fn parse_message(msg: &ConsensusMessage) -> Result<SignedConsensusData, MessageError> {
    bincode::deserialize(&msg.payload).map_err(|e| MessageError::Decode(e.to_string()))
}

/// Check both the seal and the vote signature against `verifier`.
pub fn verify_signed(signed: &SignedConsensusData, verifier: &dyn Signer, hasher: &dyn Hasher) -> bool {
    if verifier.public_key() != signed.signer {
        return false;
    }
    let Ok(seal_hash) = signed.data.seal_hash(hasher) else {
        return false;
    };
    let Ok(vote_hash) = payload_hash(hasher, &signed.data.payload) else {
        return false;
    };
    verifier.verify(&seal_hash, &signed.seal) && verifier.verify(&vote_hash, &signed.vote_signature)
}
