//! # Point-to-Point Channel
//!
//! One direction of a physical link. Computes how long a frame occupies the
//! line and what arrives at the far end: the frame may be dropped outright,
//! and each surviving bit is flipped independently with probability
//! `bit_error_rate`. Impairments come from a seeded RNG, so a given seed
//! always produces the same sequence of losses.

use rand::rngs::StdRng;
use rand::{RngExt as _, SeedableRng};
use serde::Serialize;

use netbench_stack::bits::BitSequence;
use netbench_stack::time::Ticks;

/// Ticks per second (one tick is one microsecond).
pub const TICKS_PER_SECOND: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelConfig {
    /// Line rate in bits per second.
    pub data_rate_bps: u64,
    /// Time for the first bit to reach the far end.
    pub propagation_delay: Ticks,
    /// Per-bit flip probability.
    pub bit_error_rate: f64,
    /// Probability that a whole frame is lost.
    pub drop_rate: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            data_rate_bps: 1_000_000,
            propagation_delay: 1_000,
            bit_error_rate: 0.0,
            drop_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub frames_carried: u64,
    pub bits_carried: u64,
    pub frames_dropped: u64,
    /// Frames that arrived with at least one flipped bit.
    pub frames_corrupted: u64,
    pub bits_flipped: u64,
}

#[derive(Debug)]
pub struct Channel {
    config: ChannelConfig,
    rng: StdRng,
    stats: ChannelStats,
}

impl Channel {
    pub fn new(config: ChannelConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            stats: ChannelStats::default(),
        }
    }

    /// Time to clock `bits` onto the line, at least one tick.
    pub fn transmission_time(&self, bits: usize) -> Ticks {
        let rate = self.config.data_rate_bps.max(1);
        (bits as u64 * TICKS_PER_SECOND).div_ceil(rate).max(1)
    }

    pub fn propagation_delay(&self) -> Ticks {
        self.config.propagation_delay
    }

    /// Pass a frame through the channel. `None` means it was lost.
    pub fn carry(&mut self, mut wire: BitSequence) -> Option<BitSequence> {
        self.stats.frames_carried += 1;
        self.stats.bits_carried += wire.len() as u64;

        if self.config.drop_rate > 0.0 && self.rng.random::<f64>() < self.config.drop_rate {
            self.stats.frames_dropped += 1;
            tracing::trace!(bits = wire.len(), "frame dropped by channel");
            return None;
        }

        if self.config.bit_error_rate > 0.0 {
            let mut flipped = 0u64;
            for i in 0..wire.len() {
                if self.rng.random::<f64>() < self.config.bit_error_rate {
                    wire.flip(i);
                    flipped += 1;
                }
            }
            if flipped > 0 {
                self.stats.frames_corrupted += 1;
                self.stats.bits_flipped += flipped;
                tracing::trace!(flipped, "frame corrupted by channel");
            }
        }
        Some(wire)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }
}
