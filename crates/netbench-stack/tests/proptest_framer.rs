//! Property-based tests for bit stuffing and the frame codec.

use bytes::Bytes;
use proptest::prelude::*;

use netbench_stack::bits::BitSequence;
use netbench_stack::frame::Frame;
use netbench_stack::framer::{delimit, strip, stuff, unstuff};
use netbench_stack::StackError;

fn bit_sequence() -> impl Strategy<Value = BitSequence> {
    prop_oneof![
        prop::collection::vec(any::<bool>(), 0..256),
        // Long runs of ones are where stuffing matters.
        prop::collection::vec(prop::bool::weighted(0.9), 0..256),
    ]
    .prop_map(BitSequence::from_iter)
}

proptest! {
    #[test]
    fn unstuff_inverts_stuff(bits in bit_sequence()) {
        prop_assert_eq!(unstuff(&stuff(&bits)), bits);
    }

    #[test]
    fn stuffed_output_has_no_six_ones(bits in bit_sequence()) {
        prop_assert!(stuff(&bits).longest_run_of_ones() < 6);
    }

    #[test]
    fn stuffing_only_grows(bits in bit_sequence()) {
        let stuffed = stuff(&bits);
        prop_assert!(stuffed.len() >= bits.len());
        prop_assert!(stuffed.len() <= bits.len() + bits.len() / 5);
    }

    #[test]
    fn delimited_bytes_survive(body in prop::collection::vec(any::<u8>(), 0..128)) {
        let wire = delimit(&body);
        let stripped = strip(&wire).unwrap();
        prop_assert_eq!(stripped.as_ref(), &body[..]);
    }

    #[test]
    fn frame_rejects_any_single_flipped_bit(
        seq in 0u16..8,
        ack in 0u16..8,
        payload in prop::collection::vec(any::<u8>(), 0..64),
        flip in any::<prop::sample::Index>(),
    ) {
        let encoded = Frame::data(seq, ack, Bytes::from(payload)).encode();
        let bit = flip.index(encoded.len() * 8);
        let mut corrupt = encoded.to_vec();
        corrupt[bit / 8] ^= 0x80 >> (bit % 8);
        prop_assert_eq!(Frame::decode(&corrupt), Err(StackError::IntegrityFailure));
    }

    #[test]
    fn frame_survives_the_wire(
        seq in 0u16..8,
        ack in 0u16..8,
        payload in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let frame = Frame::data(seq, ack, Bytes::from(payload));
        prop_assert_eq!(Frame::from_wire(&frame.to_wire()).unwrap(), frame);
    }
}
