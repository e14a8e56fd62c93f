//! # Simulated Time
//!
//! The core never reads a wall clock. Components receive an
//! `Rc<dyn Scheduler>` at construction and use it to ask for the current
//! simulated time and to request a future [`Wakeup`].
//!
//! One tick is the smallest unit the driving engine distinguishes; the
//! harness treats it as one microsecond.

use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Duration measured in ticks.
pub type Ticks = u64;

/// Identifier of a link interface (one end of a point-to-point link).
pub type InterfaceId = u32;

/// Identifier of a transport connection.
pub type ConnectionId = u32;

// ─── SimTime ────────────────────────────────────────────────────────────────

/// A point in simulated time.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    #[inline]
    pub fn from_ticks(ticks: u64) -> Self {
        SimTime(ticks)
    }

    #[inline]
    pub fn ticks(self) -> u64 {
        self.0
    }

    /// Ticks elapsed since `earlier`, zero if `earlier` is in the future.
    #[inline]
    pub fn saturating_since(self, earlier: SimTime) -> Ticks {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Ticks> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Ticks) -> SimTime {
        SimTime(self.0.saturating_add(rhs))
    }
}

impl AddAssign<Ticks> for SimTime {
    fn add_assign(&mut self, rhs: Ticks) {
        self.0 = self.0.saturating_add(rhs);
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Capabilities ───────────────────────────────────────────────────────────

/// Timer requests a component can make of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wakeup {
    /// Go-Back-N retransmission timer for one link interface.
    LinkTimeout { interface: InterfaceId },
    /// Periodic transport tick (timeout retransmission, SYN/FIN resend).
    TransportTick { connection: ConnectionId },
}

/// Read-only access to the current simulated time.
pub trait Clock {
    fn now(&self) -> SimTime;
}

/// Clock plus the ability to request a future wakeup.
///
/// Wakeups cannot be cancelled. Receivers compare timestamps when a wakeup
/// fires and ignore stale ones.
pub trait Scheduler: Clock {
    fn schedule_at(&self, at: SimTime, wakeup: Wakeup);
}

// ─── ManualClock ────────────────────────────────────────────────────────────

/// Hand-driven scheduler for tests and single-step tools.
///
/// Time only moves when [`ManualClock::advance`] or [`ManualClock::set`] is
/// called. Requested wakeups are recorded and can be inspected or drained.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<SimTime>,
    scheduled: RefCell<Vec<(SimTime, Wakeup)>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ticks: Ticks) {
        self.now.set(self.now.get() + ticks);
    }

    pub fn set(&self, at: SimTime) {
        debug_assert!(at >= self.now.get(), "simulated time must not go backwards");
        self.now.set(at);
    }

    /// Remove and return every recorded wakeup, earliest first.
    pub fn take_scheduled(&self) -> Vec<(SimTime, Wakeup)> {
        let mut out = std::mem::take(&mut *self.scheduled.borrow_mut());
        out.sort_by_key(|(at, _)| *at);
        out
    }

    pub fn pending(&self) -> usize {
        self.scheduled.borrow().len()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SimTime {
        self.now.get()
    }
}

impl Scheduler for ManualClock {
    fn schedule_at(&self, at: SimTime, wakeup: Wakeup) {
        self.scheduled.borrow_mut().push((at, wakeup));
    }
}
