//! # Transport Send Window
//!
//! Pure logic, no I/O. A [`TransportWindow`] turns an application byte
//! stream into segments, keeps every unacknowledged segment in a
//! [`SegmentRing`], and decides what to (re)send whenever an event reaches it.
//!
//! ## Send cycle
//!
//! Each acknowledgment or tick runs, in order:
//!
//! 1. **RTT update / fast retransmit** (pure ACKs only): sample the RTT from
//!    the newest acknowledged slot unless it was retransmitted, grow the
//!    congestion window, and resend the oldest outstanding slot if it is
//!    older than twice the RTT.
//! 2. **Window-bounded send**: cut new segments while bytes remain inside
//!    `[send_window_start, send_window_start + cwnd)` and inside the ring.
//! 3. **Timeout retransmission**: resend every slot older than the RTT
//!    estimate, remember that a timeout happened, and double the estimate
//!    (up to [`MAX_RTT`]) until a clean sample replaces it.
//! 4. **Close**: once the whole stream is acknowledged, send FIN.
//!
//! ```text
//!  IDLE ──connect──▶ SYN_SENT ──SYN+ACK──▶ SENDING ──all acked──▶ CLOSE_WAIT ──FIN+ACK──▶ CLOSED
//! ```
//!
//! The window never sets timers of its own beyond a single pending
//! [`Wakeup::TransportTick`] one RTT ahead.

use bytes::{Buf, Bytes, BytesMut};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::congestion::SlowStart;
use crate::error::{Result, StackError};
use crate::ring::SegmentRing;
use crate::segment::{Segment, SegmentFlags};
use crate::stats::TransportStats;
use crate::time::{ConnectionId, Scheduler, SimTime, Ticks, Wakeup};

/// Ceiling for the backed-off RTT estimate, in ticks.
pub const MAX_RTT: Ticks = 60_000_000;

// ─── Configuration ──────────────────────────────────────────────────────────

/// Transport parameters. Sizes are in bytes, times in ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Largest payload carried by one segment.
    pub segment_size: usize,
    /// Number of slots in the unacknowledged-segment ring.
    pub buffer_slots: usize,
    /// RTT assumed until the first sample.
    pub initial_rtt: Ticks,
    /// Slow-start threshold.
    pub slow_start_threshold: u64,
    /// Congestion window at connection open.
    pub initial_window: u64,
    /// Receiver window assumed before the peer advertises one.
    pub receiver_window: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            segment_size: 100,
            buffer_slots: 64,
            initial_rtt: 10_000,
            slow_start_threshold: 800,
            initial_window: 100,
            receiver_window: 6400,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSendState {
    Idle,
    SynSent,
    Sending,
    CloseWait,
    Closed,
}

// ─── TransportWindow ────────────────────────────────────────────────────────

pub struct TransportWindow {
    connection: ConnectionId,
    config: TransportConfig,
    state: TransportSendState,
    /// Stream bytes from `send_window_start` to `stream_length`.
    pending: BytesMut,
    send_window_start: u64,
    /// Offset of the next byte never handed to the network.
    last_char_sent: u64,
    stream_length: u64,
    ring: SegmentRing,
    rtt_estimate: Ticks,
    congestion: SlowStart,
    timeout_occurred: bool,
    syn_sent_at: Option<SimTime>,
    fin_sent_at: Option<SimTime>,
    next_tick: Option<SimTime>,
    output: VecDeque<Segment>,
    scheduler: Rc<dyn Scheduler>,
    stats: TransportStats,
}

impl TransportWindow {
    pub fn new(
        connection: ConnectionId,
        config: TransportConfig,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        let segment_size = config.segment_size.max(1);
        let ring = SegmentRing::new(config.buffer_slots.max(1), segment_size);
        let receiver_window = config
            .receiver_window
            .clamp(segment_size as u64, ring.byte_capacity());
        let congestion = SlowStart::new(
            segment_size as u64,
            config.initial_window,
            config.slow_start_threshold,
            receiver_window,
        );

        TransportWindow {
            connection,
            rtt_estimate: config.initial_rtt.max(1),
            config: TransportConfig {
                segment_size,
                ..config
            },
            state: TransportSendState::Idle,
            pending: BytesMut::new(),
            send_window_start: 0,
            last_char_sent: 0,
            stream_length: 0,
            ring,
            congestion,
            timeout_occurred: false,
            syn_sent_at: None,
            fin_sent_at: None,
            next_tick: None,
            output: VecDeque::new(),
            scheduler,
            stats: TransportStats::new(),
        }
    }

    /// Open the connection by sending SYN.
    pub fn connect(&mut self) {
        if self.state != TransportSendState::Idle {
            return;
        }
        let now = self.scheduler.now();
        self.send_syn(now);
        self.state = TransportSendState::SynSent;
        tracing::debug!(conn = self.connection, "SYN sent");
        self.arm_tick(now);
    }

    /// Append application bytes to the stream.
    pub fn enqueue(&mut self, payload: Bytes) -> Result<()> {
        if matches!(
            self.state,
            TransportSendState::CloseWait | TransportSendState::Closed
        ) {
            return Err(StackError::StreamClosed);
        }
        if payload.is_empty() {
            return Ok(());
        }
        self.pending.extend_from_slice(&payload);
        self.stream_length += payload.len() as u64;

        let now = self.scheduler.now();
        let sent = if self.state == TransportSendState::Sending {
            self.send_new_segments(now)
        } else {
            Ok(())
        };
        self.arm_tick(now);
        sent
    }

    /// A segment from the peer reached this connection.
    pub fn on_segment_arrived(&mut self, segment: &Segment) -> Result<()> {
        let now = self.scheduler.now();
        let result = self.handle_segment(segment, now);
        self.arm_tick(now);
        result
    }

    fn handle_segment(&mut self, segment: &Segment, now: SimTime) -> Result<()> {
        match self.state {
            TransportSendState::SynSent if segment.is_syn() && segment.is_ack() => {
                let sent = self.syn_sent_at.take();
                if let Some(sent) = sent.filter(|_| self.stats.syn_sent == 1) {
                    self.sample_rtt(now, sent);
                }
                let window = self.clamp_receiver_window(segment.window);
                self.congestion.set_receiver_window(window);
                self.state = TransportSendState::Sending;
                tracing::debug!(
                    conn = self.connection,
                    receiver_window = window,
                    rtt = self.rtt_estimate,
                    "connection open"
                );
                self.send_cycle(now)?;
            }
            TransportSendState::CloseWait
                if segment.is_fin()
                    && segment.is_ack()
                    && segment.ack_number > self.stream_length =>
            {
                self.state = TransportSendState::Closed;
                self.next_tick = None;
                tracing::debug!(conn = self.connection, "connection closed");
            }
            TransportSendState::Sending | TransportSendState::CloseWait
                if segment.is_pure_ack() =>
            {
                self.process_ack(segment, now);
                self.send_cycle(now)?;
            }
            _ => {
                tracing::trace!(
                    conn = self.connection,
                    state = ?self.state,
                    flags = ?segment.flags,
                    "segment ignored"
                );
            }
        }
        Ok(())
    }

    /// A [`Wakeup::TransportTick`] fired. Stale ticks are ignored.
    pub fn on_tick(&mut self) -> Result<()> {
        let now = self.scheduler.now();
        match self.next_tick {
            Some(at) if now >= at => self.next_tick = None,
            _ => return Ok(()),
        }

        let result = match self.state {
            TransportSendState::SynSent => {
                if self.is_due(self.syn_sent_at, now) {
                    tracing::debug!(conn = self.connection, "resending SYN");
                    self.send_syn(now);
                }
                Ok(())
            }
            TransportSendState::Sending => self.send_cycle(now),
            TransportSendState::CloseWait => {
                if self.is_due(self.fin_sent_at, now) {
                    tracing::debug!(conn = self.connection, "resending FIN");
                    self.send_fin(now);
                }
                Ok(())
            }
            TransportSendState::Idle | TransportSendState::Closed => Ok(()),
        };
        self.arm_tick(now);
        result
    }

    pub fn is_connection_closed(&self) -> bool {
        self.state == TransportSendState::Closed
    }

    /// Drain segments ready for the network layer.
    pub fn drain_output(&mut self) -> impl Iterator<Item = Segment> + '_ {
        self.output.drain(..)
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn state(&self) -> TransportSendState {
        self.state
    }

    pub fn send_window_start(&self) -> u64 {
        self.send_window_start
    }

    pub fn last_char_sent(&self) -> u64 {
        self.last_char_sent
    }

    pub fn stream_length(&self) -> u64 {
        self.stream_length
    }

    pub fn rtt_estimate(&self) -> Ticks {
        self.rtt_estimate
    }

    pub fn congestion(&self) -> &SlowStart {
        &self.congestion
    }

    /// Bytes handed to the network but not yet acknowledged.
    pub fn in_flight(&self) -> u64 {
        self.last_char_sent - self.send_window_start
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    // ─── Send cycle ─────────────────────────────────────────────────────

    fn send_cycle(&mut self, now: SimTime) -> Result<()> {
        self.send_new_segments(now)?;
        self.retransmit_timed_out(now);
        self.maybe_close(now);
        Ok(())
    }

    /// Step 1: cumulative acknowledgment, RTT sample, congestion update and
    /// resend of a stale oldest slot.
    fn process_ack(&mut self, segment: &Segment, now: SimTime) {
        self.stats.acks_received += 1;
        let advertised = self.clamp_receiver_window(segment.window);
        let ack = segment.ack_number.min(self.last_char_sent);

        if ack > self.send_window_start {
            let released = self.ring.release_acked(ack);
            if let Some(sent) = released.rtt_sample_from {
                self.sample_rtt(now, sent);
            }
            let acked = ack - self.send_window_start;
            self.pending.advance(acked as usize);
            self.send_window_start = ack;
            self.stats.bytes_acked += acked;

            let timeout = std::mem::take(&mut self.timeout_occurred);
            self.congestion.on_ack(advertised, timeout);
            self.stats.peak_cwnd = self.stats.peak_cwnd.max(self.congestion.cwnd());
            tracing::trace!(
                conn = self.connection,
                ack,
                cwnd = self.congestion.cwnd(),
                rtt = self.rtt_estimate,
                "ack advanced window"
            );
        } else {
            self.congestion.set_receiver_window(advertised);
        }

        if self.send_window_start < self.last_char_sent {
            if let Some(slot) = self.ring.find(self.send_window_start) {
                let stale = self
                    .ring
                    .sent_at(slot)
                    .is_some_and(|sent| now.saturating_since(sent) > 2 * self.rtt_estimate);
                if stale {
                    tracing::debug!(
                        conn = self.connection,
                        offset = self.send_window_start,
                        "fast retransmit of oldest segment"
                    );
                    self.resend_slot(slot, now);
                    self.stats.fast_retransmits += 1;
                }
            }
        }
    }

    /// Step 2. The limit never reaches past the ring: the chunk holding
    /// `send_window_start` may still occupy its slot, so at most
    /// `byte_capacity` bytes from that chunk's start can be outstanding.
    fn send_new_segments(&mut self, now: SimTime) -> Result<()> {
        let segment_size = self.config.segment_size as u64;
        let ring_end =
            self.send_window_start / segment_size * segment_size + self.ring.byte_capacity();
        let limit = (self.send_window_start + self.congestion.cwnd())
            .min(self.stream_length)
            .min(ring_end);

        while self.last_char_sent < limit {
            let offset = self.last_char_sent;
            let chunk_room = segment_size - offset % segment_size;
            let len = chunk_room.min(limit - offset) as usize;
            let from = (offset - self.send_window_start) as usize;
            let segment = Segment::data(offset, Bytes::copy_from_slice(&self.pending[from..from + len]));

            if let Err(err) = self.ring.save(segment.clone(), now) {
                tracing::warn!(conn = self.connection, offset, %err, "send ring exhausted");
                return Err(err);
            }
            self.output.push_back(segment);
            self.last_char_sent += len as u64;
            self.stats.segments_sent += 1;
            self.stats.bytes_sent += len as u64;
            tracing::trace!(conn = self.connection, offset, len, "segment sent");
        }
        Ok(())
    }

    /// Step 3.
    fn retransmit_timed_out(&mut self, now: SimTime) {
        let rtt = self.rtt_estimate;
        let expired: Vec<usize> = self
            .ring
            .outstanding()
            .filter(|(_, _, sent)| now.saturating_since(*sent) > rtt)
            .map(|(slot, _, _)| slot)
            .collect();
        if expired.is_empty() {
            return;
        }
        for &slot in &expired {
            self.resend_slot(slot, now);
        }
        self.timeout_occurred = true;
        self.stats.timeout_retransmits += expired.len() as u64;
        self.rtt_estimate = rtt.saturating_mul(2).min(MAX_RTT.max(rtt));
        tracing::debug!(
            conn = self.connection,
            count = expired.len(),
            rtt,
            backed_off = self.rtt_estimate,
            "timeout retransmission"
        );
    }

    /// Step 4.
    fn maybe_close(&mut self, now: SimTime) {
        if self.state == TransportSendState::Sending
            && self.stream_length > 0
            && self.send_window_start >= self.stream_length
        {
            self.send_fin(now);
            self.state = TransportSendState::CloseWait;
            tracing::debug!(conn = self.connection, bytes = self.stream_length, "stream acknowledged, FIN sent");
        }
    }

    // ─── Helpers ────────────────────────────────────────────────────────

    fn resend_slot(&mut self, slot: usize, now: SimTime) {
        if let Some(segment) = self.ring.get(slot).cloned() {
            self.output.push_back(segment);
            self.ring.touch(slot, now);
            self.stats.segments_sent += 1;
        }
    }

    fn send_syn(&mut self, now: SimTime) {
        self.output
            .push_back(Segment::control(SegmentFlags::SYN, 0, 0, 0));
        self.syn_sent_at = Some(now);
        self.stats.syn_sent += 1;
    }

    fn send_fin(&mut self, now: SimTime) {
        self.output
            .push_back(Segment::control(SegmentFlags::FIN, self.stream_length, 0, 0));
        self.fin_sent_at = Some(now);
        self.stats.fin_sent += 1;
    }

    fn sample_rtt(&mut self, now: SimTime, sent: SimTime) {
        self.rtt_estimate = now.saturating_since(sent).max(1);
        self.stats.last_rtt = self.rtt_estimate;
    }

    fn is_due(&self, sent: Option<SimTime>, now: SimTime) -> bool {
        sent.is_some_and(|at| now.saturating_since(at) > self.rtt_estimate)
    }

    fn clamp_receiver_window(&self, advertised: u32) -> u64 {
        u64::from(advertised).clamp(self.config.segment_size as u64, self.ring.byte_capacity())
    }

    /// Keep one live tick, at most one RTT ahead. A tick superseded by an
    /// earlier one is recognised as stale when it fires.
    fn arm_tick(&mut self, now: SimTime) {
        if matches!(
            self.state,
            TransportSendState::Idle | TransportSendState::Closed
        ) {
            return;
        }
        let at = now + self.rtt_estimate;
        if self.next_tick.is_some_and(|pending| pending <= at) {
            return;
        }
        self.next_tick = Some(at);
        self.scheduler.schedule_at(
            at,
            Wakeup::TransportTick {
                connection: self.connection,
            },
        );
    }
}

impl std::fmt::Debug for TransportWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportWindow")
            .field("connection", &self.connection)
            .field("state", &self.state)
            .field("send_window_start", &self.send_window_start)
            .field("last_char_sent", &self.last_char_sent)
            .field("stream_length", &self.stream_length)
            .field("cwnd", &self.congestion.cwnd())
            .field("rtt", &self.rtt_estimate)
            .finish()
    }
}
