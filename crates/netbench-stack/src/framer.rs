//! # Bit Stuffing
//!
//! Frames on the wire are delimited by the flag `01111110`. To keep the flag
//! from appearing inside a body, the sender inserts a `0` after every run of
//! five `1`s and the receiver removes it again.
//!
//! ```text
//! FLAG | stuff(body bits) | FLAG
//! ```

use bytes::Bytes;

use crate::bits::BitSequence;
use crate::error::{Result, StackError};

/// Consecutive ones after which a zero is inserted.
pub const STUFF_RUN: usize = 5;

/// Frame delimiter.
pub const FLAG: u8 = 0b0111_1110;

const FLAG_BITS: usize = 8;

/// Insert a `0` after every run of five consecutive `1`s.
pub fn stuff(bits: &BitSequence) -> BitSequence {
    let mut out = BitSequence::with_capacity(bits.len() + bits.len() / STUFF_RUN);
    let mut run = 0;
    for bit in bits.iter() {
        out.push(bit);
        if bit {
            run += 1;
            if run == STUFF_RUN {
                out.push(false);
                run = 0;
            }
        } else {
            run = 0;
        }
    }
    out
}

/// Drop the bit that follows every run of five consecutive `1`s.
pub fn unstuff(bits: &BitSequence) -> BitSequence {
    let mut out = BitSequence::with_capacity(bits.len());
    let mut run = 0;
    let mut skip = false;
    for bit in bits.iter() {
        if skip {
            skip = false;
            run = 0;
            continue;
        }
        out.push(bit);
        if bit {
            run += 1;
            if run == STUFF_RUN {
                skip = true;
            }
        } else {
            run = 0;
        }
    }
    out
}

fn flag_bits() -> BitSequence {
    BitSequence::from_bytes(&[FLAG])
}

/// Stuff `body` and wrap it in flags.
pub fn delimit(body: &[u8]) -> BitSequence {
    let stuffed = stuff(&BitSequence::from_bytes(body));
    let mut out = BitSequence::with_capacity(stuffed.len() + 2 * FLAG_BITS);
    out.push_byte(FLAG);
    out.extend(stuffed.iter());
    out.push_byte(FLAG);
    out
}

/// Reverse of [`delimit`]: check both flags, unstuff, repack into bytes.
pub fn strip(wire: &BitSequence) -> Result<Bytes> {
    if wire.len() < 2 * FLAG_BITS {
        return Err(StackError::IntegrityFailure);
    }
    let flag = flag_bits();
    let end = wire.len() - FLAG_BITS;
    if wire.slice(0, FLAG_BITS).as_ref() != Some(&flag)
        || wire.slice(end, wire.len()).as_ref() != Some(&flag)
    {
        return Err(StackError::IntegrityFailure);
    }

    let inner = wire
        .slice(FLAG_BITS, end)
        .ok_or(StackError::IntegrityFailure)?;
    let body = unstuff(&inner);
    body.to_bytes()
        .map(Bytes::from)
        .ok_or(StackError::IntegrityFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(s: &str) -> BitSequence {
        s.parse().unwrap()
    }

    #[test]
    fn stuffs_mixed_runs() {
        let input = bits("101101110111101111101111110");
        let expected = bits("10110111011110111110011111010");
        assert_eq!(stuff(&input), expected);
        assert_eq!(unstuff(&expected), input);
    }

    #[test]
    fn stuffs_exact_run_of_five() {
        assert_eq!(stuff(&bits("1111100000")), bits("11111000000"));
    }

    #[test]
    fn short_runs_are_unchanged() {
        let input = bits("11110111101");
        assert_eq!(stuff(&input), input);
    }

    #[test]
    fn twelve_ones() {
        let input = bits("111111111111");
        let stuffed = stuff(&input);
        assert_eq!(stuffed, bits("11111011111011"));
        assert_eq!(unstuff(&stuffed), input);
    }

    #[test]
    fn empty_input() {
        assert!(stuff(&BitSequence::new()).is_empty());
        assert!(unstuff(&BitSequence::new()).is_empty());
    }

    #[test]
    fn delimit_then_strip() {
        let body = [0xFF, 0x7E, 0x00, 0x3F];
        let wire = delimit(&body);
        assert_eq!(wire.slice(0, 8).unwrap().to_string(), "01111110");
        assert_eq!(strip(&wire).unwrap().as_ref(), &body);
    }

    #[test]
    fn flag_never_appears_inside_body() {
        let wire = delimit(&[0xFF; 16]);
        let body = wire.slice(8, wire.len() - 8).unwrap();
        assert!(body.longest_run_of_ones() < 6);
    }

    #[test]
    fn strip_rejects_bad_flags_and_ragged_bodies() {
        let mut wire = delimit(&[0xA5]);
        wire.flip(0);
        assert_eq!(strip(&wire), Err(StackError::IntegrityFailure));

        let mut ragged = flag_bits();
        ragged.extend(bits("101").iter());
        ragged.extend(flag_bits().iter());
        assert_eq!(strip(&ragged), Err(StackError::IntegrityFailure));

        assert_eq!(strip(&bits("0111")), Err(StackError::IntegrityFailure));
    }
}
