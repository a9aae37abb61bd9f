#![no_main]

use libfuzzer_sys::fuzz_target;

use hotstuff_crypto::{Blake2bHasher, Ed25519Signer};
use hotstuff_messages::{verify_signed, SignedConsensusData};
use hotstuff_types::PublicKey;

// Arbitrary signed data must verify to a plain bool, including against
// keys that are not valid curve points.
fuzz_target!(|data: &[u8]| {
    let Ok(signed) = bincode::deserialize::<SignedConsensusData>(data) else {
        return;
    };
    let hasher = Blake2bHasher;
    let _ = signed.data.compute_id(&hasher);
    let _ = signed.data.seal_hash(&hasher);

    let claimed = Ed25519Signer::verify_only(signed.signer);
    let _ = verify_signed(&signed, &claimed, &hasher);
    let bogus = Ed25519Signer::verify_only(PublicKey([0xFF; 32]));
    let _ = verify_signed(&signed, &bogus, &hasher);
});
