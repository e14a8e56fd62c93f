//! # Binary Exponential Backoff
//!
//! Contention-slot generator for interfaces on a shared medium.
//!
//! | attempt `n` | max slots         |
//! |-------------|-------------------|
//! | 1 ..= 10    | `2^n − 1`         |
//! | 11 ..= 16   | `2^10 − 1 = 1023` |
//! | > 16        | `Collision` error |
//!
//! Each interface owns a pseudo-random source seeded from its identifier, so
//! the same interface produces the same slot sequence on every run.

use rand::rngs::StdRng;
use rand::{RngExt as _, SeedableRng};

use crate::error::{Result, StackError};
use crate::time::InterfaceId;

/// Attempts allowed before contention is abandoned.
pub const MAX_BACKOFF_ATTEMPTS: u32 = 16;

/// Attempts over which the slot range keeps doubling.
pub const MAX_DOUBLINGS: u32 = 10;

/// Deterministic per-interface seed.
pub fn interface_seed(interface: InterfaceId) -> u64 {
    100 * u64::from(interface) + 1
}

/// Backoff state for one contention interface.
#[derive(Debug)]
pub struct Backoff {
    interface: InterfaceId,
    attempt_count: u32,
    max_slots: u32,
    rng: StdRng,
}

impl Backoff {
    pub fn new(interface: InterfaceId) -> Self {
        Backoff {
            interface,
            attempt_count: 0,
            max_slots: 0,
            rng: StdRng::seed_from_u64(interface_seed(interface)),
        }
    }

    /// Register one more failed attempt and draw the number of slots to wait.
    ///
    /// Returns [`StackError::Collision`] once [`MAX_BACKOFF_ATTEMPTS`] have
    /// been used; the counter is then left untouched until [`Backoff::reset`].
    pub fn attempt(&mut self) -> Result<u32> {
        if self.attempt_count >= MAX_BACKOFF_ATTEMPTS {
            tracing::debug!(
                interface = self.interface,
                attempts = self.attempt_count,
                "backoff exhausted"
            );
            return Err(StackError::Collision {
                attempts: self.attempt_count,
            });
        }

        self.attempt_count += 1;
        self.max_slots = (1u32 << self.attempt_count.min(MAX_DOUBLINGS)) - 1;

        let draw: f64 = self.rng.random();
        let slots = (draw * f64::from(self.max_slots)).round() as u32;
        tracing::trace!(
            interface = self.interface,
            attempt = self.attempt_count,
            max_slots = self.max_slots,
            slots,
            "backoff drawn"
        );
        Ok(slots.min(self.max_slots))
    }

    /// Clear the attempt counter after a successful transmission.
    pub fn reset(&mut self) {
        self.attempt_count = 0;
        self.max_slots = 0;
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn max_slots(&self) -> u32 {
        self.max_slots
    }

    pub fn interface(&self) -> InterfaceId {
        self.interface
    }
}
