#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use netbench_stack::segment::Segment;

fuzz_target!(|data: &[u8]| {
    let mut buf = Bytes::copy_from_slice(data);
    if let Some(segment) = Segment::decode(&mut buf) {
        assert_eq!(segment.to_bytes().as_ref(), data);
    }
});
