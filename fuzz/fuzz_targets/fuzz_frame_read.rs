#![no_main]

use libfuzzer_sys::fuzz_target;

use hotstuff_messages::ConsensusMessage;
use hotstuff_network::read_frame;

// The length prefix comes straight off the socket: oversized or truncated
// frames must fail cleanly.
fuzz_target!(|data: &[u8]| {
    let Ok(rt) = tokio::runtime::Builder::new_current_thread().build() else {
        return;
    };
    rt.block_on(async {
        let mut reader = data;
        if let Ok(body) = read_frame(&mut reader).await {
            let _ = ConsensusMessage::from_bytes(&body);
        }
    });
});
