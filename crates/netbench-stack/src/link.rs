//! # Go-Back-N Link ARQ
//!
//! One [`LinkArq`] runs at each end of a point-to-point link. It decides which
//! frame goes on the line next and processes frames arriving from the peer.
//!
//! ## Send side
//!
//! ```text
//!            window open, payload queued
//!          ┌──────────────────────────────┐
//!          ▼                              │
//!     ┌─────────┐  window full   ┌─────────┴┐
//!     │ SENDING │───────────────▶│ WAITING  │  resend SNmin when due
//!     └────┬────┘◀───────────────└────┬─────┘
//!          │      ack opens window    │
//!          └──────────┬───────────────┘
//!                     ▼ ack owed, nothing else to send
//!               ┌───────────┐
//!               │ SEND_SUPV │  one pure ack, then back
//!               └───────────┘
//! ```
//!
//! The harness owns the line. Whenever the line goes idle it calls
//! [`LinkArq::poll_send`]; `None` means the link has nothing to say and has
//! gone inactive. Resending the oldest frame is gated by
//! [`LinkConfig::retransmit_timeout`]: when the frame is not yet old enough a
//! [`Wakeup::LinkTimeout`] is requested and the line idles.
//!
//! ## Receive side
//!
//! Acknowledgments are cumulative: an ack number in `(SNmin, SNmax]` retires
//! every frame before it. Only the frame numbered `RN` is delivered; anything
//! else inside the window is dropped and the sender goes back to it.

use std::collections::VecDeque;
use std::rc::Rc;

use bytes::Bytes;

use crate::bits::BitSequence;
use crate::error::{Result, StackError};
use crate::frame::Frame;
use crate::seq::{SeqNum, SeqSpace, DEFAULT_MODULUS, DEFAULT_WINDOW};
use crate::stats::LinkStats;
use crate::time::{InterfaceId, Scheduler, SimTime, Ticks, Wakeup};

// ─── Configuration ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Sequence-number modulus `M`.
    pub modulus: u16,
    /// Send window `W`, `1 ≤ W < M`.
    pub window: u16,
    /// Minimum age of the oldest frame before it is resent. Zero resends
    /// at line rate.
    pub retransmit_timeout: Ticks,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            modulus: DEFAULT_MODULUS,
            window: DEFAULT_WINDOW,
            retransmit_timeout: 0,
        }
    }
}

// ─── State ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Sending,
    Waiting,
    SendSupv,
}

/// Snapshot of the window variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkWindowState {
    pub sn_min: SeqNum,
    pub sn_max: SeqNum,
    pub rn: SeqNum,
    pub send_state: SendState,
    pub active: bool,
}

impl LinkWindowState {
    fn reset() -> Self {
        LinkWindowState {
            sn_min: SeqNum::default(),
            sn_max: SeqNum::default(),
            rn: SeqNum::default(),
            send_state: SendState::Waiting,
            active: false,
        }
    }
}

/// A frame ready for the physical layer.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub frame: Frame,
    pub wire: BitSequence,
    pub retransmission: bool,
}

impl OutboundFrame {
    fn new(frame: Frame, retransmission: bool) -> Self {
        let wire = frame.to_wire();
        OutboundFrame {
            frame,
            wire,
            retransmission,
        }
    }
}

/// Result of processing one incoming frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveOutcome {
    /// Payload for the layer above, when the frame was the next expected one.
    pub delivered: Option<Bytes>,
    /// Outstanding frames released by the piggybacked acknowledgment.
    pub retired: u16,
    /// The link was idle and now has something to send.
    pub wake_transmitter: bool,
}

// ─── LinkArq ────────────────────────────────────────────────────────────────

pub struct LinkArq {
    interface: InterfaceId,
    config: LinkConfig,
    space: SeqSpace,
    window: LinkWindowState,
    /// State to return to after a supervisory frame.
    resume_state: SendState,
    queue: VecDeque<Bytes>,
    buffer: Vec<Option<Bytes>>,
    sent_at: Vec<Option<SimTime>>,
    ack_owed: bool,
    timer_deadline: Option<SimTime>,
    scheduler: Rc<dyn Scheduler>,
    stats: LinkStats,
}

impl LinkArq {
    pub fn new(
        interface: InterfaceId,
        config: LinkConfig,
        scheduler: Rc<dyn Scheduler>,
    ) -> Result<Self> {
        let space = SeqSpace::new(config.modulus, config.window)?;
        let slots = usize::from(config.modulus);
        Ok(LinkArq {
            interface,
            config,
            space,
            window: LinkWindowState::reset(),
            resume_state: SendState::Sending,
            queue: VecDeque::new(),
            buffer: vec![None; slots],
            sent_at: vec![None; slots],
            ack_owed: false,
            timer_deadline: None,
            scheduler,
            stats: LinkStats::new(),
        })
    }

    /// Enter the post-handshake state: all counters zero, sending.
    ///
    /// Queued payloads survive; anything in flight is forgotten.
    pub fn initialize(&mut self) {
        self.window = LinkWindowState {
            send_state: SendState::Sending,
            active: true,
            ..LinkWindowState::reset()
        };
        self.resume_state = SendState::Sending;
        self.buffer.iter_mut().for_each(|slot| *slot = None);
        self.sent_at.iter_mut().for_each(|slot| *slot = None);
        self.ack_owed = false;
        self.timer_deadline = None;
        tracing::debug!(link = self.interface, "link initialized");
    }

    /// Queue a payload for transmission. Returns `true` when an idle link
    /// was woken and the caller should poll it.
    pub fn enqueue(&mut self, payload: Bytes) -> bool {
        self.queue.push_back(payload);
        let now = self.scheduler.now();
        self.wake_if_needed(now)
    }

    /// The line is free: return the next frame to transmit, if any.
    pub fn poll_send(&mut self) -> Option<OutboundFrame> {
        let now = self.scheduler.now();
        if !self.window.active && !self.wake_if_needed(now) {
            return None;
        }
        match self.window.send_state {
            SendState::SendSupv => Some(self.send_supervisory()),
            SendState::Sending => self.poll_sending(now),
            SendState::Waiting => self.poll_waiting(now),
        }
    }

    /// A [`Wakeup::LinkTimeout`] fired. Returns `true` when the caller
    /// should poll the link. Stale wakeups are ignored.
    pub fn on_timeout(&mut self) -> bool {
        let now = self.scheduler.now();
        match self.timer_deadline {
            Some(deadline) if now >= deadline => {
                self.timer_deadline = None;
                tracing::trace!(link = self.interface, %now, "retransmit timer fired");
                self.wake_if_needed(now)
            }
            _ => false,
        }
    }

    /// Process a frame taken off the wire.
    pub fn on_receive(&mut self, wire: &BitSequence) -> Result<ReceiveOutcome> {
        let frame = match Frame::from_wire(wire) {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.integrity_failures += 1;
                tracing::trace!(link = self.interface, bits = wire.len(), "frame failed integrity check");
                return Err(err);
            }
        };
        self.stats.frames_received += 1;
        let now = self.scheduler.now();

        let mut outcome = ReceiveOutcome {
            retired: self.process_ack(self.space.seq(frame.ack)),
            ..ReceiveOutcome::default()
        };

        if frame.is_data() {
            self.ack_owed = true;
            let sn = self.space.seq(frame.sequence);
            let rn = self.window.rn;
            if !self.space.accept_frame(sn, rn) {
                self.stats.out_of_window += 1;
                self.wake_if_needed(now);
                tracing::trace!(link = self.interface, %sn, %rn, "frame outside receive window");
                return Err(StackError::OutOfWindowFrame {
                    sequence: frame.sequence,
                    expected: rn.value(),
                });
            }
            if sn == rn {
                self.window.rn = self.space.increment(rn);
                self.stats.frames_delivered += 1;
                tracing::trace!(link = self.interface, %sn, "frame delivered");
                outcome.delivered = Some(frame.payload);
            } else {
                self.stats.out_of_order += 1;
                tracing::trace!(link = self.interface, %sn, %rn, "out-of-order frame dropped");
            }
        }

        outcome.wake_transmitter = self.wake_if_needed(now);
        Ok(outcome)
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn interface(&self) -> InterfaceId {
        self.interface
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn space(&self) -> SeqSpace {
        self.space
    }

    pub fn window_state(&self) -> LinkWindowState {
        self.window
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Frames sent but not yet acknowledged.
    pub fn outstanding(&self) -> u16 {
        self.space.distance(self.window.sn_min, self.window.sn_max)
    }

    /// Nothing queued and nothing awaiting acknowledgment.
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.outstanding() == 0 && !self.ack_owed
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    // ─── Internals ──────────────────────────────────────────────────────

    fn poll_sending(&mut self, now: SimTime) -> Option<OutboundFrame> {
        let LinkWindowState { sn_min, sn_max, .. } = self.window;
        if self.space.within_strict_range(sn_min, sn_max) {
            if let Some(payload) = self.queue.pop_front() {
                let out = self.send_new(payload, now);
                if self.space.is_full(self.window.sn_min, self.window.sn_max) {
                    self.window.send_state = SendState::Waiting;
                    tracing::debug!(link = self.interface, "window full, waiting");
                }
                return Some(out);
            }
        }
        if self.space.frames_outstanding(sn_min, sn_max) {
            if let Some(out) = self.resend_oldest(now) {
                return Some(out);
            }
        }
        self.acknowledge_or_idle()
    }

    fn poll_waiting(&mut self, now: SimTime) -> Option<OutboundFrame> {
        if !self.space.is_full(self.window.sn_min, self.window.sn_max) {
            self.window.send_state = SendState::Sending;
            return self.poll_sending(now);
        }
        if let Some(out) = self.resend_oldest(now) {
            return Some(out);
        }
        self.acknowledge_or_idle()
    }

    fn send_new(&mut self, payload: Bytes, now: SimTime) -> OutboundFrame {
        let sn = self.window.sn_max;
        let frame = Frame::data(sn.value(), self.window.rn.value(), payload.clone());
        self.buffer[sn.index()] = Some(payload);
        self.sent_at[sn.index()] = Some(now);
        self.window.sn_max = self.space.increment(sn);
        self.ack_owed = false;
        self.stats.frames_sent += 1;
        tracing::trace!(link = self.interface, %sn, rn = %self.window.rn, "sending frame");
        OutboundFrame::new(frame, false)
    }

    /// Resend the SNmin frame if it is old enough, otherwise arm the timer.
    fn resend_oldest(&mut self, now: SimTime) -> Option<OutboundFrame> {
        let sn = self.window.sn_min;
        let slot = sn.index();
        let due = self.sent_at[slot]? + self.config.retransmit_timeout;
        if now < due {
            self.arm_timer(due);
            return None;
        }
        let payload = self.buffer[slot].clone()?;
        self.sent_at[slot] = Some(now);
        self.ack_owed = false;
        self.stats.retransmissions += 1;
        tracing::debug!(link = self.interface, %sn, "retransmitting oldest frame");
        Some(OutboundFrame::new(
            Frame::data(sn.value(), self.window.rn.value(), payload),
            true,
        ))
    }

    fn acknowledge_or_idle(&mut self) -> Option<OutboundFrame> {
        if self.ack_owed {
            self.resume_state = self.window.send_state;
            self.window.send_state = SendState::SendSupv;
            return Some(self.send_supervisory());
        }
        self.window.active = false;
        self.window.send_state = SendState::Waiting;
        tracing::trace!(link = self.interface, "link idle");
        None
    }

    fn send_supervisory(&mut self) -> OutboundFrame {
        self.ack_owed = false;
        self.window.send_state = self.resume_state;
        self.stats.supervisory_sent += 1;
        tracing::trace!(link = self.interface, rn = %self.window.rn, "sending supervisory frame");
        OutboundFrame::new(Frame::supervisory(self.window.rn.value()), false)
    }

    /// Cumulative acknowledgment. Returns the number of frames retired.
    fn process_ack(&mut self, ack: SeqNum) -> u16 {
        let LinkWindowState { sn_min, sn_max, .. } = self.window;
        if !self.space.acknowledges(sn_min, ack, sn_max) {
            return 0;
        }
        let retired = self.space.distance(sn_min, ack);
        let mut sn = sn_min;
        while sn != ack {
            self.buffer[sn.index()] = None;
            self.sent_at[sn.index()] = None;
            sn = self.space.increment(sn);
        }
        self.window.sn_min = ack;
        if self.window.active && self.window.send_state == SendState::Waiting {
            self.window.send_state = SendState::Sending;
        }
        self.stats.frames_acked += u64::from(retired);
        tracing::trace!(link = self.interface, %ack, retired, "frames acknowledged");
        retired
    }

    fn oldest_due(&self) -> Option<SimTime> {
        let LinkWindowState { sn_min, sn_max, .. } = self.window;
        if !self.space.frames_outstanding(sn_min, sn_max) {
            return None;
        }
        self.sent_at[sn_min.index()].map(|at| at + self.config.retransmit_timeout)
    }

    /// Reactivate an idle link that has work. Arms the retransmit timer when
    /// the only pending work is a resend that is not yet due.
    fn wake_if_needed(&mut self, now: SimTime) -> bool {
        if self.window.active {
            return false;
        }
        let LinkWindowState { sn_min, sn_max, .. } = self.window;
        let can_send_new =
            !self.queue.is_empty() && self.space.within_strict_range(sn_min, sn_max);
        let resend_due = self.oldest_due().is_some_and(|due| now >= due);
        if !(self.ack_owed || can_send_new || resend_due) {
            if let Some(due) = self.oldest_due() {
                self.arm_timer(due);
            }
            return false;
        }

        let base = if self.space.is_full(sn_min, sn_max) {
            SendState::Waiting
        } else {
            SendState::Sending
        };
        self.window.active = true;
        // A full window stays WAITING; poll_waiting sends the owed ack.
        if base == SendState::Sending && self.ack_owed && !can_send_new && !resend_due {
            self.resume_state = base;
            self.window.send_state = SendState::SendSupv;
        } else {
            self.window.send_state = base;
        }
        tracing::debug!(link = self.interface, state = ?self.window.send_state, "link woken");
        true
    }

    fn arm_timer(&mut self, due: SimTime) {
        if self.timer_deadline.is_some_and(|pending| pending <= due) {
            return;
        }
        self.timer_deadline = Some(due);
        self.scheduler.schedule_at(
            due,
            Wakeup::LinkTimeout {
                interface: self.interface,
            },
        );
        tracing::trace!(link = self.interface, %due, "retransmit timer armed");
    }
}

impl std::fmt::Debug for LinkArq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkArq")
            .field("interface", &self.interface)
            .field("window", &self.window)
            .field("queued", &self.queue.len())
            .field("ack_owed", &self.ack_owed)
            .finish()
    }
}
