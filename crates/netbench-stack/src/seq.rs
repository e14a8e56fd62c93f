//! # Sequence Numbers
//!
//! Link-layer sequence numbers live in `0..M`. Every operation reduces modulo
//! `M` and every window test measures the forward distance between two
//! numbers, so wraparound needs no special casing.
//!
//! ```text
//!  M = 8, W = 4, rn = 6
//!  ┌───┬───┬───┬───┬───┬───┬───┬───┐
//!  │ 0 │ 1 │ 2 │ 3 │ 4 │ 5 │ 6 │ 7 │
//!  └───┴───┴───┴───┴───┴───┴───┴───┘
//!    ✓   ✓                   ✓   ✓     accepted: 6, 7, 0, 1
//! ```

use std::fmt;

use crate::error::{Result, StackError};

/// Default sequence-number modulus.
pub const DEFAULT_MODULUS: u16 = 8;

/// Default Go-Back-N window size.
pub const DEFAULT_WINDOW: u16 = 4;

/// A sequence number already reduced into its space.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SeqNum(u16);

impl SeqNum {
    #[inline]
    pub fn value(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Debug for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Modulus and window of one link's sequence space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    modulus: u16,
    window: u16,
}

impl SeqSpace {
    /// Validate `1 ≤ window < modulus`.
    pub fn new(modulus: u16, window: u16) -> Result<Self> {
        if window == 0 || window >= modulus {
            return Err(StackError::InvalidWindow { window, modulus });
        }
        Ok(SeqSpace { modulus, window })
    }

    #[inline]
    pub fn modulus(&self) -> u16 {
        self.modulus
    }

    #[inline]
    pub fn window(&self) -> u16 {
        self.window
    }

    /// Reduce an arbitrary value into the space.
    #[inline]
    pub fn seq(&self, raw: u16) -> SeqNum {
        SeqNum(raw % self.modulus)
    }

    #[inline]
    pub fn increment(&self, n: SeqNum) -> SeqNum {
        self.add(n, 1)
    }

    #[inline]
    pub fn add(&self, n: SeqNum, delta: u16) -> SeqNum {
        let m = u32::from(self.modulus);
        SeqNum(((u32::from(n.0) + u32::from(delta)) % m) as u16)
    }

    /// Forward distance from `from` to `to`, i.e. `(to − from) mod M`.
    #[inline]
    pub fn distance(&self, from: SeqNum, to: SeqNum) -> u16 {
        let m = u32::from(self.modulus);
        ((u32::from(to.0) + m - u32::from(from.0)) % m) as u16
    }

    /// Another frame may be sent without exceeding the window.
    #[inline]
    pub fn within_strict_range(&self, min: SeqNum, max: SeqNum) -> bool {
        self.distance(min, max) < self.window
    }

    #[inline]
    pub fn within_inclusive_range(&self, min: SeqNum, max: SeqNum) -> bool {
        self.distance(min, max) <= self.window
    }

    #[inline]
    pub fn is_full(&self, min: SeqNum, max: SeqNum) -> bool {
        self.distance(min, max) >= self.window
    }

    #[inline]
    pub fn frames_outstanding(&self, min: SeqNum, max: SeqNum) -> bool {
        min != max
    }

    /// Receiver-side window test: `(sn − rn) mod M < W`.
    #[inline]
    pub fn accept_frame(&self, sn: SeqNum, rn: SeqNum) -> bool {
        self.distance(rn, sn) < self.window
    }

    /// `ack` lies in `(sn_min, sn_max]`, i.e. it retires at least one
    /// outstanding frame.
    #[inline]
    pub fn acknowledges(&self, sn_min: SeqNum, ack: SeqNum, sn_max: SeqNum) -> bool {
        let advance = self.distance(sn_min, ack);
        advance >= 1 && advance <= self.distance(sn_min, sn_max)
    }
}

impl Default for SeqSpace {
    fn default() -> Self {
        SeqSpace {
            modulus: DEFAULT_MODULUS,
            window: DEFAULT_WINDOW,
        }
    }
}
