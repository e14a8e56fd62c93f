//! Network-layer datagram: `source u32 | destination u32 | segment`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use netbench_stack::segment::Segment;

use crate::routing::NodeId;

pub const DATAGRAM_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub source: NodeId,
    pub destination: NodeId,
    pub segment: Segment,
}

impl Datagram {
    pub fn new(source: NodeId, destination: NodeId, segment: Segment) -> Self {
        Self {
            source,
            destination,
            segment,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(DATAGRAM_HEADER_LEN + self.segment.encoded_len());
        buf.put_u32(self.source);
        buf.put_u32(self.destination);
        self.segment.encode(&mut buf);
        buf.freeze()
    }

    pub fn decode(mut data: &[u8]) -> Option<Self> {
        if data.remaining() < DATAGRAM_HEADER_LEN {
            return None;
        }
        let source = data.get_u32();
        let destination = data.get_u32();
        let segment = Segment::decode(&mut data)?;
        Some(Self {
            source,
            destination,
            segment,
        })
    }
}
