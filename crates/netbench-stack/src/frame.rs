//! # Data-Link Frame
//!
//! ```text
//!  0       1               3               5               7
//! +-------+---------------+---------------+---------------+-----------+-----------+
//! | kind  |  sequence u16 |     ack u16   | length u16    | payload … | crc16     |
//! +-------+---------------+---------------+---------------+-----------+-----------+
//! ```
//!
//! All fields are big-endian. The trailing integrity code is CRC-16/CCITT
//! (polynomial `0x1021`, initial value `0xFFFF`) over header and payload.
//! On the wire the encoded bytes are stuffed and wrapped in flags by
//! [`crate::framer`].

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::bits::BitSequence;
use crate::error::{Result, StackError};
use crate::framer;

// ─── Constants ───────────────────────────────────────────────────────────────

/// kind + sequence + ack + length.
pub const HEADER_LEN: usize = 7;

/// CRC-16 trailer.
pub const TRAILER_LEN: usize = 2;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

const CRC_POLY: u16 = 0x1021;
const CRC_INIT: u16 = 0xFFFF;

/// CRC-16/CCITT over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC_INIT;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC_POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

// ─── Frame Kind ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Carries a payload and a sequence number.
    Data = 0,
    /// Pure acknowledgment; the sequence field is unused.
    Supervisory = 1,
}

impl FrameKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(FrameKind::Data),
            1 => Some(FrameKind::Supervisory),
            _ => None,
        }
    }
}

// ─── Frame ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub sequence: u16,
    /// Next sequence number the sender of this frame expects (its RN).
    pub ack: u16,
    pub payload: Bytes,
}

impl Frame {
    pub fn data(sequence: u16, ack: u16, payload: Bytes) -> Self {
        Frame {
            kind: FrameKind::Data,
            sequence,
            ack,
            payload,
        }
    }

    pub fn supervisory(ack: u16) -> Self {
        Frame {
            kind: FrameKind::Supervisory,
            sequence: 0,
            ack,
            payload: Bytes::new(),
        }
    }

    pub fn is_data(&self) -> bool {
        self.kind == FrameKind::Data
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len() + TRAILER_LEN
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        debug_assert!(self.payload.len() <= MAX_PAYLOAD_LEN);
        buf.put_u8(self.kind as u8);
        buf.put_u16(self.sequence);
        buf.put_u16(self.ack);
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
    }

    /// Integrity code for the current header and payload.
    pub fn integrity_code(&self) -> u16 {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        self.encode_body(&mut buf);
        crc16(&buf)
    }

    /// Header, payload and a freshly computed integrity code.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_body(&mut buf);
        let crc = crc16(&buf);
        buf.put_u16(crc);
        buf.freeze()
    }

    /// Parse and verify an encoded frame.
    ///
    /// Any shape error or checksum mismatch is an [`StackError::IntegrityFailure`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN + TRAILER_LEN {
            return Err(StackError::IntegrityFailure);
        }
        let (body, trailer) = data.split_at(data.len() - TRAILER_LEN);
        let expected = u16::from_be_bytes([trailer[0], trailer[1]]);
        if crc16(body) != expected {
            return Err(StackError::IntegrityFailure);
        }

        let mut buf = body;
        let kind = FrameKind::from_byte(buf.get_u8()).ok_or(StackError::IntegrityFailure)?;
        let sequence = buf.get_u16();
        let ack = buf.get_u16();
        let len = usize::from(buf.get_u16());
        if buf.remaining() != len {
            return Err(StackError::IntegrityFailure);
        }

        Ok(Frame {
            kind,
            sequence,
            ack,
            payload: Bytes::copy_from_slice(buf),
        })
    }

    /// Encode, stuff and delimit for the physical layer.
    pub fn to_wire(&self) -> BitSequence {
        framer::delimit(&self.encode())
    }

    pub fn from_wire(wire: &BitSequence) -> Result<Self> {
        let bytes = framer::strip(wire)?;
        Self::decode(&bytes)
    }
}
