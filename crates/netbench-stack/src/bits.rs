//! Owned bit sequences.
//!
//! A [`BitSequence`] is what the framer operates on and what a link hands to
//! the physical layer. Bytes map to bits most-significant bit first.

use std::fmt;
use std::str::FromStr;

use crate::error::StackError;

/// Ordered, growable sequence of bits. Equality compares content and length.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitSequence {
    bits: Vec<bool>,
}

impl BitSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        BitSequence {
            bits: Vec::with_capacity(bits),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    #[inline]
    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<bool> {
        self.bits.get(index).copied()
    }

    /// Set the bit at `index`, growing the sequence with zeros if needed.
    pub fn set(&mut self, index: usize, bit: bool) {
        if index >= self.bits.len() {
            self.bits.resize(index + 1, false);
        }
        self.bits[index] = bit;
    }

    /// Invert the bit at `index`. Out-of-range indices are ignored.
    pub fn flip(&mut self, index: usize) {
        if let Some(bit) = self.bits.get_mut(index) {
            *bit = !*bit;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }

    /// Bits `start..end` as a new sequence, or `None` when the range is
    /// reversed or runs past the end.
    pub fn slice(&self, start: usize, end: usize) -> Option<BitSequence> {
        let bits = self.bits.get(start..end)?;
        Some(BitSequence {
            bits: bits.to_vec(),
        })
    }

    /// Append `byte`, most significant bit first.
    pub fn push_byte(&mut self, byte: u8) {
        for shift in (0..8).rev() {
            self.bits.push(byte >> shift & 1 == 1);
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut out = BitSequence::with_capacity(bytes.len() * 8);
        for &b in bytes {
            out.push_byte(b);
        }
        out
    }

    /// Pack into bytes. `None` unless the length is a multiple of eight.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        if self.bits.len() % 8 != 0 {
            return None;
        }
        Some(
            self.bits
                .chunks_exact(8)
                .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| acc << 1 | u8::from(bit)))
                .collect(),
        )
    }

    /// Length of the longest run of consecutive `1`s.
    pub fn longest_run_of_ones(&self) -> usize {
        let mut longest = 0;
        let mut run = 0;
        for &bit in &self.bits {
            if bit {
                run += 1;
                longest = longest.max(run);
            } else {
                run = 0;
            }
        }
        longest
    }
}

impl FromStr for BitSequence {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(StackError::InvalidBit(other)),
            })
            .collect()
    }
}

impl fmt::Display for BitSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.bits {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitSequence({self})")
    }
}

impl FromIterator<bool> for BitSequence {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        BitSequence {
            bits: iter.into_iter().collect(),
        }
    }
}

impl Extend<bool> for BitSequence {
    fn extend<I: IntoIterator<Item = bool>>(&mut self, iter: I) {
        self.bits.extend(iter);
    }
}

impl<'a> Extend<&'a bool> for BitSequence {
    fn extend<I: IntoIterator<Item = &'a bool>>(&mut self, iter: I) {
        self.bits.extend(iter.into_iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let bits: BitSequence = "0110".parse().unwrap();
        assert_eq!(bits.len(), 4);
        assert_eq!(bits.get(1), Some(true));
        assert_eq!(bits.get(4), None);
        assert_eq!(bits.to_string(), "0110");
    }

    #[test]
    fn parse_rejects_other_characters() {
        assert_eq!(
            "01x1".parse::<BitSequence>().unwrap_err(),
            StackError::InvalidBit('x')
        );
    }

    #[test]
    fn bytes_are_msb_first() {
        let bits = BitSequence::from_bytes(&[0b1000_0001, 0x7E]);
        assert_eq!(bits.to_string(), "1000000101111110");
        assert_eq!(bits.to_bytes().unwrap(), vec![0b1000_0001, 0x7E]);
    }

    #[test]
    fn to_bytes_requires_whole_octets() {
        let bits: BitSequence = "101".parse().unwrap();
        assert!(bits.to_bytes().is_none());
        assert_eq!(BitSequence::new().to_bytes(), Some(vec![]));
    }

    #[test]
    fn set_grows_with_zeros() {
        let mut bits = BitSequence::new();
        bits.set(3, true);
        assert_eq!(bits.to_string(), "0001");
        bits.flip(0);
        bits.flip(10);
        assert_eq!(bits.to_string(), "1001");
    }

    #[test]
    fn equality_includes_length() {
        let a: BitSequence = "010".parse().unwrap();
        let b: BitSequence = "0100".parse().unwrap();
        assert_ne!(a, b);
        assert_eq!(Some(a), b.slice(0, 3));
    }

    #[test]
    fn slice_out_of_range_is_none() {
        let bits: BitSequence = "0110".parse().unwrap();
        assert_eq!(bits.slice(1, 3).unwrap().to_string(), "11");
        assert_eq!(bits.slice(4, 4), Some(BitSequence::new()));
        assert_eq!(bits.slice(2, 5), None);
        assert_eq!(bits.slice(3, 1), None);
        assert_eq!(BitSequence::new().slice(0, 1), None);
    }

    #[test]
    fn longest_run() {
        let bits: BitSequence = "0111011110".parse().unwrap();
        assert_eq!(bits.longest_run_of_ones(), 4);
        assert_eq!(BitSequence::new().longest_run_of_ones(), 0);
    }
}
