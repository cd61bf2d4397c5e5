#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the payload decoder.
    let _ = capsulenet::networking::codec::decode(data, 16 << 20);
});
