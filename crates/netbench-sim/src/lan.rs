//! # Contention LAN
//!
//! A slotted shared medium. Every station with a frame ready contends at the
//! start of a slot:
//!
//! - one contender: it owns the medium for `frame_slots` slots and resets
//!   its backoff;
//! - several contenders: collision, and each asks its [`Backoff`] how many
//!   slots to wait before trying again;
//! - a station whose backoff reports [`StackError::Collision`] drops the
//!   frame and starts over with the next one.
//!
//! Stations sense the carrier, so nobody contends while the medium is busy.

use serde::Serialize;

use netbench_stack::backoff::Backoff;
use netbench_stack::time::InterfaceId;
use netbench_stack::StackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanConfig {
    pub stations: u32,
    pub frames_per_station: u32,
    /// Slots a successful transmission occupies.
    pub frame_slots: u64,
    /// Give up after this many slots.
    pub max_slots: u64,
}

impl Default for LanConfig {
    fn default() -> Self {
        Self {
            stations: 8,
            frames_per_station: 16,
            frame_slots: 4,
            max_slots: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LanStats {
    pub stations: u32,
    pub frames_offered: u64,
    pub frames_delivered: u64,
    /// Frames abandoned after too many consecutive collisions.
    pub frames_dropped: u64,
    pub collisions: u64,
    pub slots_elapsed: u64,
    pub busy_slots: u64,
    /// Highest backoff attempt count any station reached.
    pub max_attempts: u32,
    pub utilization: f64,
}

#[derive(Debug)]
struct Station {
    backoff: Backoff,
    pending: u32,
    ready_at: u64,
}

#[derive(Debug)]
pub struct ContentionLan {
    config: LanConfig,
    stations: Vec<Station>,
    slot: u64,
    stats: LanStats,
}

impl ContentionLan {
    /// Stations get interface ids `1..=stations`, which also seeds their
    /// backoff generators.
    pub fn new(config: LanConfig) -> Self {
        let stations = (1..=config.stations)
            .map(|id: InterfaceId| Station {
                backoff: Backoff::new(id),
                pending: config.frames_per_station,
                ready_at: 0,
            })
            .collect();
        Self {
            config,
            stations,
            slot: 0,
            stats: LanStats {
                stations: config.stations,
                frames_offered: u64::from(config.stations) * u64::from(config.frames_per_station),
                ..LanStats::default()
            },
        }
    }

    /// Run until every frame is delivered or dropped, or `max_slots` pass.
    pub fn run(mut self) -> LanStats {
        while self.slot < self.config.max_slots && self.step() {}
        self.stats.slots_elapsed = self.slot;
        if self.slot > 0 {
            self.stats.utilization = self.stats.busy_slots as f64 / self.slot as f64;
        }
        tracing::debug!(
            delivered = self.stats.frames_delivered,
            dropped = self.stats.frames_dropped,
            collisions = self.stats.collisions,
            slots = self.slot,
            "contention run finished"
        );
        self.stats
    }

    /// Resolve one contention slot. Returns `false` once nothing is pending.
    fn step(&mut self) -> bool {
        let slot = self.slot;
        let contenders: Vec<usize> = self
            .stations
            .iter()
            .enumerate()
            .filter(|(_, s)| s.pending > 0 && s.ready_at <= slot)
            .map(|(i, _)| i)
            .collect();

        match contenders.as_slice() {
            [] => match self.stations.iter().filter(|s| s.pending > 0).map(|s| s.ready_at).min() {
                Some(next) => self.slot = next,
                None => return false,
            },
            &[winner] => {
                let station = &mut self.stations[winner];
                station.pending -= 1;
                station.backoff.reset();
                let busy = self.config.frame_slots.max(1);
                station.ready_at = slot + busy;
                self.stats.frames_delivered += 1;
                self.stats.busy_slots += busy;
                self.slot = slot + busy;
                tracing::trace!(station = winner + 1, slot, "frame transmitted");
            }
            contenders => {
                self.stats.collisions += 1;
                tracing::trace!(slot, contenders = contenders.len(), "collision");
                for &i in contenders {
                    self.back_off(i, slot);
                }
                self.slot = slot + 1;
            }
        }
        true
    }

    fn back_off(&mut self, index: usize, slot: u64) {
        let station = &mut self.stations[index];
        match station.backoff.attempt() {
            Ok(wait) => {
                station.ready_at = slot + 1 + u64::from(wait);
                self.stats.max_attempts = self.stats.max_attempts.max(station.backoff.attempt_count());
            }
            Err(StackError::Collision { attempts }) => {
                tracing::warn!(
                    station = station.backoff.interface(),
                    attempts,
                    "too many collisions, frame dropped"
                );
                station.pending -= 1;
                station.backoff.reset();
                station.ready_at = slot + 1;
                self.stats.frames_dropped += 1;
            }
            Err(err) => {
                tracing::warn!(station = station.backoff.interface(), %err, "backoff failed");
                station.ready_at = slot + 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_station_never_collides() {
        let stats = ContentionLan::new(LanConfig {
            stations: 1,
            frames_per_station: 10,
            frame_slots: 3,
            ..LanConfig::default()
        })
        .run();
        assert_eq!(stats.frames_delivered, 10);
        assert_eq!(stats.collisions, 0);
        assert_eq!(stats.slots_elapsed, 30);
        assert!((stats.utilization - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn every_frame_is_delivered_or_dropped() {
        let stats = ContentionLan::new(LanConfig::default()).run();
        assert_eq!(stats.frames_offered, 128);
        assert_eq!(stats.frames_delivered + stats.frames_dropped, stats.frames_offered);
        assert!(stats.collisions > 0);
        assert!(stats.max_attempts >= 1);
        assert!(stats.utilization > 0.0 && stats.utilization <= 1.0);
    }

    #[test]
    fn runs_are_deterministic() {
        let config = LanConfig {
            stations: 12,
            frames_per_station: 8,
            ..LanConfig::default()
        };
        assert_eq!(ContentionLan::new(config).run(), ContentionLan::new(config).run());
    }

    #[test]
    fn slot_budget_stops_the_run() {
        let stats = ContentionLan::new(LanConfig {
            max_slots: 10,
            ..LanConfig::default()
        })
        .run();
        assert!(stats.slots_elapsed >= 10);
        assert!(stats.frames_delivered + stats.frames_dropped < stats.frames_offered);
    }
}
