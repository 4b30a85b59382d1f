#![no_main]

use libfuzzer_sys::fuzz_target;
use voltage_modbus_ascii::frame::{decode_frame, encode_frame};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the decoder
    if let Ok((unit, pdu)) = decode_frame(data) {
        // Anything accepted re-encodes to the same frame, modulo hex case
        let reencoded = encode_frame(unit, pdu.as_slice());
        assert!(reencoded.eq_ignore_ascii_case(data));
    }
});
