//! # Unacknowledged Segment Ring
//!
//! Fixed ring of segment-sized slots. A segment starting at offset `o` lives
//! in slot `(o / segment_size) mod slots`, together with the time it was last
//! put on the network. Slots are cleared once the peer acknowledges every
//! byte they hold.
//!
//! A slot that has been retransmitted is marked. An acknowledgment that
//! releases a marked slot cannot tell which copy it answers, so it yields
//! no RTT sample.
//!
//! A slot covers one aligned chunk of the stream. When a chunk goes out in
//! pieces (the application wrote less than a segment, then more), later
//! pieces are appended to the piece already in the slot.

use bytes::{Bytes, BytesMut};

use crate::error::{Result, StackError};
use crate::segment::Segment;
use crate::time::SimTime;

/// What an acknowledgment released from the ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Released {
    pub segments: usize,
    /// Send time of the released segment with the highest offset, or
    /// `None` when that segment was ever retransmitted.
    pub rtt_sample_from: Option<SimTime>,
}

#[derive(Debug)]
pub struct SegmentRing {
    slots: Vec<Option<Segment>>,
    sent_at: Vec<Option<SimTime>>,
    resent: Vec<bool>,
    segment_size: usize,
}

impl SegmentRing {
    pub fn new(slots: usize, segment_size: usize) -> Self {
        assert!(slots > 0 && segment_size > 0, "ring needs at least one non-empty slot");
        SegmentRing {
            slots: vec![None; slots],
            sent_at: vec![None; slots],
            resent: vec![false; slots],
            segment_size,
        }
    }

    #[inline]
    pub fn slot_index(&self, offset: u64) -> usize {
        ((offset / self.segment_size as u64) % self.slots.len() as u64) as usize
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Bytes the ring can hold unacknowledged.
    pub fn byte_capacity(&self) -> u64 {
        (self.slots.len() * self.segment_size) as u64
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Store a freshly sent segment and stamp it with `now`.
    ///
    /// Fails with [`StackError::BufferExhausted`] when the slot still holds
    /// an unacknowledged segment from a different chunk of the stream.
    pub fn save(&mut self, segment: Segment, now: SimTime) -> Result<()> {
        let slot = self.slot_index(segment.start_offset);
        let chunk = segment.start_offset / self.segment_size as u64;
        match self.slots[slot].take() {
            None => {
                self.slots[slot] = Some(segment);
                self.resent[slot] = false;
            }
            Some(existing)
                if existing.start_offset / self.segment_size as u64 == chunk
                    && existing.end_offset() == segment.start_offset =>
            {
                let mut joined = BytesMut::with_capacity(existing.payload.len() + segment.payload.len());
                joined.extend_from_slice(&existing.payload);
                joined.extend_from_slice(&segment.payload);
                self.slots[slot] = Some(Segment {
                    payload: joined.freeze(),
                    ..existing
                });
            }
            Some(existing) => {
                self.slots[slot] = Some(existing);
                return Err(StackError::BufferExhausted {
                    offset: segment.start_offset,
                    slot,
                });
            }
        }
        self.sent_at[slot] = Some(now);
        Ok(())
    }

    pub fn get(&self, slot: usize) -> Option<&Segment> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn sent_at(&self, slot: usize) -> Option<SimTime> {
        *self.sent_at.get(slot)?
    }

    /// The slot has been put on the network more than once.
    pub fn is_resent(&self, slot: usize) -> bool {
        self.resent.get(slot).copied().unwrap_or(false)
    }

    /// Refresh the send time of an occupied slot after a retransmission
    /// and mark it as resent.
    pub fn touch(&mut self, slot: usize, now: SimTime) {
        if self.slots[slot].is_some() {
            self.sent_at[slot] = Some(now);
            self.resent[slot] = true;
        }
    }

    /// The slot holding `offset`, if it is occupied by a segment covering it.
    pub fn find(&self, offset: u64) -> Option<usize> {
        let slot = self.slot_index(offset);
        let seg = self.slots[slot].as_ref()?;
        (seg.start_offset <= offset && offset < seg.end_offset()).then_some(slot)
    }

    /// Clear every slot whose bytes all lie below `ack`.
    pub fn release_acked(&mut self, ack: u64) -> Released {
        let mut released = Released::default();
        let mut newest_end = 0;
        for slot in 0..self.slots.len() {
            let end = match &self.slots[slot] {
                Some(seg) if seg.end_offset() <= ack => seg.end_offset(),
                _ => continue,
            };
            self.slots[slot] = None;
            let sent = self.sent_at[slot].take();
            let resent = std::mem::take(&mut self.resent[slot]);
            released.segments += 1;
            if end >= newest_end {
                newest_end = end;
                released.rtt_sample_from = if resent { None } else { sent };
            }
        }
        released
    }

    /// Occupied slots as `(slot, segment, sent_at)`.
    pub fn outstanding(&self) -> impl Iterator<Item = (usize, &Segment, SimTime)> + '_ {
        self.slots
            .iter()
            .zip(&self.sent_at)
            .enumerate()
            .filter_map(|(slot, (seg, at))| Some((slot, seg.as_ref()?, (*at)?)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Payload of the segment in `slot`, cloned cheaply for resending.
    pub fn payload(&self, slot: usize) -> Option<Bytes> {
        self.get(slot).map(|seg| seg.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: u64, len: usize) -> Segment {
        Segment::data(start, Bytes::from(vec![0xAB; len]))
    }

    fn t(ticks: u64) -> SimTime {
        SimTime::from_ticks(ticks)
    }

    #[test]
    fn slots_wrap_by_segment() {
        let ring = SegmentRing::new(4, 100);
        assert_eq!(ring.slot_index(0), 0);
        assert_eq!(ring.slot_index(199), 1);
        assert_eq!(ring.slot_index(400), 0);
        assert_eq!(ring.byte_capacity(), 400);
    }

    #[test]
    fn occupied_slot_is_exhausted() {
        let mut ring = SegmentRing::new(2, 100);
        ring.save(seg(0, 100), t(1)).unwrap();
        ring.save(seg(100, 100), t(1)).unwrap();
        assert_eq!(
            ring.save(seg(200, 100), t(2)),
            Err(StackError::BufferExhausted { offset: 200, slot: 0 })
        );
        // The original occupant is untouched.
        assert_eq!(ring.get(0).unwrap().start_offset, 0);
        assert_eq!(ring.sent_at(0), Some(t(1)));
    }

    #[test]
    fn partial_pieces_join() {
        let mut ring = SegmentRing::new(4, 100);
        ring.save(seg(0, 40), t(1)).unwrap();
        ring.save(seg(40, 60), t(5)).unwrap();
        let joined = ring.get(0).unwrap();
        assert_eq!(joined.start_offset, 0);
        assert_eq!(joined.end_offset(), 100);
        assert_eq!(ring.sent_at(0), Some(t(5)));
        assert_eq!(ring.find(70), Some(0));
        assert_eq!(ring.find(100), None);
    }

    #[test]
    fn release_clears_fully_acked_slots() {
        let mut ring = SegmentRing::new(4, 100);
        ring.save(seg(0, 100), t(1)).unwrap();
        ring.save(seg(100, 100), t(2)).unwrap();
        ring.save(seg(200, 100), t(3)).unwrap();

        let released = ring.release_acked(250);
        assert_eq!(released.segments, 2);
        assert_eq!(released.rtt_sample_from, Some(t(2)));
        assert_eq!(ring.len(), 1);

        let released = ring.release_acked(250);
        assert_eq!(released, Released::default());

        ring.release_acked(300);
        assert!(ring.is_empty());
    }

    #[test]
    fn touch_refreshes_only_occupied_slots() {
        let mut ring = SegmentRing::new(4, 100);
        ring.save(seg(0, 100), t(1)).unwrap();
        ring.touch(0, t(9));
        ring.touch(1, t(9));
        assert_eq!(ring.sent_at(0), Some(t(9)));
        assert_eq!(ring.sent_at(1), None);
        let outstanding: Vec<_> = ring.outstanding().map(|(slot, _, at)| (slot, at)).collect();
        assert_eq!(outstanding, vec![(0, t(9))]);
    }

    #[test]
    fn resent_slot_gives_no_rtt_sample() {
        let mut ring = SegmentRing::new(4, 100);
        ring.save(seg(0, 100), t(1)).unwrap();
        ring.save(seg(100, 100), t(2)).unwrap();
        ring.touch(1, t(20));
        assert!(ring.is_resent(1));
        assert!(!ring.is_resent(0));

        let released = ring.release_acked(200);
        assert_eq!(released.segments, 2);
        assert_eq!(released.rtt_sample_from, None);

        // A fresh occupant of the same slot samples again.
        ring.save(seg(500, 100), t(30)).unwrap();
        assert!(!ring.is_resent(1));
        assert_eq!(ring.release_acked(600).rtt_sample_from, Some(t(30)));
    }
}
