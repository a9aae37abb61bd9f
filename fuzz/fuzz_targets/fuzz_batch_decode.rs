#![no_main]

use libfuzzer_sys::fuzz_target;

use hotstuff_node::Batch;

// Customer data from other members is checked with `Batch::decode`;
// it must reject garbage without panicking.
fuzz_target!(|data: &[u8]| {
    if let Some(batch) = Batch::decode(data) {
        let _ = batch.items.iter().map(Vec::len).sum::<usize>();
    }
});
