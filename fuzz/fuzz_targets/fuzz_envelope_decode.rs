#![no_main]

use libfuzzer_sys::fuzz_target;

use hotstuff_messages::{parse_message, ConsensusMessage};

// Decoding an inbound envelope and its payload must never panic,
// whatever the bytes claim to be.
fuzz_target!(|data: &[u8]| {
    let Ok(msg) = ConsensusMessage::from_bytes(data) else {
        return;
    };
    let _ = msg.check_protocol();
    if let Ok(signed) = parse_message(&msg) {
        let _ = signed.view();
        let _ = signed.phase().message_type();
        let _ = signed.justify().vote_count();
    }
});
