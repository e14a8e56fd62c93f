#![no_main]

use libfuzzer_sys::fuzz_target;
use netbench_stack::bits::BitSequence;
use netbench_stack::frame::Frame;

/// Frame decoding must never panic, whether fed raw bytes or a wire bit
/// sequence, and anything it accepts must re-encode to the same bytes.
fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = Frame::decode(data) {
        assert_eq!(frame.encode().as_ref(), data);
    }

    let wire = BitSequence::from_bytes(data);
    let _ = Frame::from_wire(&wire);
});
