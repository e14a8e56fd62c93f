//! # Transport Segment
//!
//! ```text
//! +-------+------------------+------------------+--------------+-----------+-----------+
//! | flags | start offset u64 | ack number u64   | window u32   | len u16   | payload … |
//! +-------+------------------+------------------+--------------+-----------+-----------+
//! ```
//!
//! Offsets count bytes of the application stream from zero. A SYN occupies
//! no stream space; a FIN sits at the offset just past the last byte and the
//! peer acknowledges it with `offset + 1`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// flags + start + ack + window + len.
pub const SEGMENT_HEADER_LEN: usize = 1 + 8 + 8 + 4 + 2;

// ─── Flags ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SegmentFlags(u8);

impl SegmentFlags {
    pub const NONE: SegmentFlags = SegmentFlags(0);
    pub const SYN: SegmentFlags = SegmentFlags(0b001);
    pub const ACK: SegmentFlags = SegmentFlags(0b010);
    pub const FIN: SegmentFlags = SegmentFlags(0b100);

    const KNOWN: u8 = 0b111;

    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::KNOWN != 0 {
            return None;
        }
        Some(SegmentFlags(bits))
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn contains(self, other: SegmentFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for SegmentFlags {
    type Output = SegmentFlags;

    fn bitor(self, rhs: SegmentFlags) -> SegmentFlags {
        SegmentFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for SegmentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::SYN) {
            names.push("SYN");
        }
        if self.contains(Self::ACK) {
            names.push("ACK");
        }
        if self.contains(Self::FIN) {
            names.push("FIN");
        }
        if names.is_empty() {
            f.write_str("-")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

// ─── Segment ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub flags: SegmentFlags,
    /// Stream offset of the first payload byte.
    pub start_offset: u64,
    /// Next stream offset the sender of this segment expects.
    pub ack_number: u64,
    /// Receive buffer space the sender of this segment advertises, in bytes.
    pub window: u32,
    pub payload: Bytes,
}

impl Segment {
    pub fn data(start_offset: u64, payload: Bytes) -> Self {
        Segment {
            flags: SegmentFlags::NONE,
            start_offset,
            ack_number: 0,
            window: 0,
            payload,
        }
    }

    pub fn control(flags: SegmentFlags, start_offset: u64, ack_number: u64, window: u32) -> Self {
        Segment {
            flags,
            start_offset,
            ack_number,
            window,
            payload: Bytes::new(),
        }
    }

    /// Offset one past the last payload byte.
    #[inline]
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.payload.len() as u64
    }

    #[inline]
    pub fn is_syn(&self) -> bool {
        self.flags.contains(SegmentFlags::SYN)
    }

    #[inline]
    pub fn is_fin(&self) -> bool {
        self.flags.contains(SegmentFlags::FIN)
    }

    #[inline]
    pub fn is_ack(&self) -> bool {
        self.flags.contains(SegmentFlags::ACK)
    }

    /// An acknowledgment that is neither part of the open nor the close.
    #[inline]
    pub fn is_pure_ack(&self) -> bool {
        self.is_ack() && !self.is_syn() && !self.is_fin()
    }

    pub fn encoded_len(&self) -> usize {
        SEGMENT_HEADER_LEN + self.payload.len()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        debug_assert!(self.payload.len() <= u16::MAX as usize);
        buf.put_u8(self.flags.bits());
        buf.put_u64(self.start_offset);
        buf.put_u64(self.ack_number);
        buf.put_u32(self.window);
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a segment. Returns `None` if the buffer is short, the flags
    /// are unknown or the length field disagrees with the remaining bytes.
    pub fn decode(buf: &mut impl Buf) -> Option<Self> {
        if buf.remaining() < SEGMENT_HEADER_LEN {
            return None;
        }
        let flags = SegmentFlags::from_bits(buf.get_u8())?;
        let start_offset = buf.get_u64();
        let ack_number = buf.get_u64();
        let window = buf.get_u32();
        let len = usize::from(buf.get_u16());
        if buf.remaining() != len {
            return None;
        }
        let payload = buf.copy_to_bytes(len);
        Some(Segment {
            flags,
            start_offset,
            ack_number,
            window,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine() {
        let flags = SegmentFlags::SYN | SegmentFlags::ACK;
        assert!(flags.contains(SegmentFlags::SYN));
        assert!(flags.contains(SegmentFlags::ACK));
        assert!(!flags.contains(SegmentFlags::FIN));
        assert_eq!(format!("{flags:?}"), "SYN|ACK");
        assert!(SegmentFlags::from_bits(0b1000).is_none());
    }

    #[test]
    fn header_layout() {
        let seg = Segment::data(0x0102, Bytes::from_static(b"abc"));
        let bytes = seg.to_bytes();
        assert_eq!(bytes.len(), SEGMENT_HEADER_LEN + 3);
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..9], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(&bytes[21..23], &[0, 3]);
        assert_eq!(Segment::decode(&mut bytes.clone()).unwrap(), seg);
    }

    #[test]
    fn control_segment_decodes() {
        let seg = Segment::control(SegmentFlags::FIN | SegmentFlags::ACK, 500, 501, 6400);
        let decoded = Segment::decode(&mut seg.to_bytes()).unwrap();
        assert!(decoded.is_fin());
        assert!(!decoded.is_pure_ack());
        assert_eq!(decoded.ack_number, 501);
        assert_eq!(decoded.window, 6400);
    }

    #[test]
    fn decode_rejects_bad_lengths() {
        let bytes = Segment::data(0, Bytes::from_static(b"abcd")).to_bytes();
        assert!(Segment::decode(&mut &bytes[..bytes.len() - 1]).is_none());
        assert!(Segment::decode(&mut &bytes[..10]).is_none());
        let mut extended = bytes.to_vec();
        extended.push(0);
        assert!(Segment::decode(&mut &extended[..]).is_none());
    }

    #[test]
    fn end_offset() {
        let seg = Segment::data(200, Bytes::from_static(&[0; 100]));
        assert_eq!(seg.end_offset(), 300);
    }
}
