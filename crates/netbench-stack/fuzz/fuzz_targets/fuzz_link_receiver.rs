#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use netbench_stack::bits::BitSequence;
use netbench_stack::frame::Frame;
use netbench_stack::link::{LinkArq, LinkConfig};
use netbench_stack::time::ManualClock;
use std::rc::Rc;

/// Drive a link with arbitrary frames. The first byte of each chunk picks
/// whether it is fed as a well-formed frame or as raw wire bits.
///
/// The link must never panic and its window must stay within bounds.
fuzz_target!(|data: &[u8]| {
    let clock = Rc::new(ManualClock::new());
    let mut link = match LinkArq::new(0, LinkConfig::default(), clock.clone()) {
        Ok(link) => link,
        Err(_) => return,
    };
    link.initialize();
    link.enqueue(Bytes::from_static(b"fuzz"));

    for chunk in data.chunks(6) {
        let wire = if chunk[0] & 1 == 0 && chunk.len() >= 5 {
            let seq = u16::from(chunk[1]);
            let ack = u16::from(chunk[2]);
            Frame::data(seq, ack, Bytes::copy_from_slice(&chunk[3..])).to_wire()
        } else {
            BitSequence::from_bytes(chunk)
        };
        let _ = link.on_receive(&wire);
        for _ in 0..8 {
            if link.poll_send().is_none() {
                break;
            }
        }
        assert!(link.outstanding() <= link.space().window());
        clock.advance(1);
    }
});
