//! # Transport Receiver
//!
//! Peer side of a [`crate::sender::TransportWindow`]. Answers SYN with
//! SYN+ACK, reassembles the byte stream in order, and acknowledges every
//! data segment cumulatively with the next offset it expects and the buffer
//! space it has left.
//!
//! Segments that arrive ahead of a gap are held (up to the buffer capacity)
//! and released as soon as the gap fills.

use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, VecDeque};

use crate::segment::{Segment, SegmentFlags};
use crate::stats::ReceiverStats;
use crate::time::ConnectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Listen,
    Established,
    Closed,
}

#[derive(Debug)]
pub struct TransportReceiver {
    connection: ConnectionId,
    state: ReceiverState,
    /// Bytes that may be held out of order.
    capacity: u64,
    next_expected: u64,
    held: BTreeMap<u64, Bytes>,
    held_bytes: u64,
    delivered: BytesMut,
    output: VecDeque<Segment>,
    stats: ReceiverStats,
}

impl TransportReceiver {
    pub fn new(connection: ConnectionId, capacity: u64) -> Self {
        TransportReceiver {
            connection,
            state: ReceiverState::Listen,
            capacity,
            next_expected: 0,
            held: BTreeMap::new(),
            held_bytes: 0,
            delivered: BytesMut::new(),
            output: VecDeque::new(),
            stats: ReceiverStats::new(),
        }
    }

    pub fn on_segment(&mut self, segment: &Segment) {
        if segment.is_syn() {
            if self.state == ReceiverState::Listen {
                self.state = ReceiverState::Established;
                tracing::debug!(conn = self.connection, "connection accepted");
            }
            self.reply(SegmentFlags::SYN | SegmentFlags::ACK, self.next_expected);
            return;
        }

        if self.state == ReceiverState::Listen {
            tracing::trace!(conn = self.connection, "segment before SYN ignored");
            return;
        }

        if segment.is_fin() {
            if segment.start_offset == self.next_expected {
                if self.state != ReceiverState::Closed {
                    self.state = ReceiverState::Closed;
                    tracing::debug!(
                        conn = self.connection,
                        bytes = self.next_expected,
                        "stream complete"
                    );
                }
                self.reply(SegmentFlags::FIN | SegmentFlags::ACK, segment.start_offset + 1);
            } else {
                self.reply(SegmentFlags::ACK, self.next_expected);
            }
            return;
        }

        if segment.payload.is_empty() {
            return;
        }
        self.stats.segments_received += 1;
        self.accept_data(segment);
        self.reply(SegmentFlags::ACK, self.next_expected);
    }

    fn accept_data(&mut self, segment: &Segment) {
        let start = segment.start_offset;
        let end = segment.end_offset();

        if end <= self.next_expected {
            self.stats.duplicates += 1;
            return;
        }
        if start >= self.next_expected + self.capacity {
            self.stats.beyond_window += 1;
            tracing::trace!(conn = self.connection, start, "segment beyond receive window");
            return;
        }
        if start > self.next_expected {
            self.hold(start, segment.payload.clone());
            return;
        }

        self.deliver(start, &segment.payload);
        while let Some((&held_start, _)) = self.held.first_key_value() {
            if held_start > self.next_expected {
                break;
            }
            if let Some(payload) = self.held.remove(&held_start) {
                self.held_bytes -= payload.len() as u64;
                self.deliver(held_start, &payload);
            }
        }
    }

    fn hold(&mut self, start: u64, payload: Bytes) {
        let len = payload.len() as u64;
        match self.held.get(&start) {
            Some(existing) if existing.len() as u64 >= len => return,
            Some(existing) => self.held_bytes -= existing.len() as u64,
            None => {}
        }
        if self.held_bytes + len > self.capacity {
            self.stats.beyond_window += 1;
            return;
        }
        self.held_bytes += len;
        self.held.insert(start, payload);
        self.stats.out_of_order += 1;
    }

    /// Append the part of `payload` (starting at `start`) not yet delivered.
    fn deliver(&mut self, start: u64, payload: &[u8]) {
        let end = start + payload.len() as u64;
        if end <= self.next_expected {
            return;
        }
        let skip = (self.next_expected - start) as usize;
        self.delivered.extend_from_slice(&payload[skip..]);
        self.stats.bytes_delivered += end - self.next_expected;
        self.next_expected = end;
    }

    fn reply(&mut self, flags: SegmentFlags, ack_number: u64) {
        let window = self.free_space().min(u64::from(u32::MAX)) as u32;
        self.output
            .push_back(Segment::control(flags, 0, ack_number, window));
        self.stats.acks_sent += 1;
    }

    /// Buffer space advertised to the sender.
    pub fn free_space(&self) -> u64 {
        self.capacity.saturating_sub(self.held_bytes)
    }

    /// Take every byte delivered so far.
    pub fn read(&mut self) -> Bytes {
        self.delivered.split().freeze()
    }

    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ReceiverState::Closed
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn drain_output(&mut self) -> impl Iterator<Item = Segment> + '_ {
        self.output.drain(..)
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}
