//! # Scenario Runner
//!
//! Builds a [`Network`] from a [`ScenarioConfig`], runs the transfer to
//! completion (or until the time budget runs out), optionally runs the
//! contention LAN, and collects everything into a serializable
//! [`ScenarioReport`].

use serde::Serialize;

use netbench_stack::stats::{ReceiverStats, TransportStats};
use netbench_stack::time::SimTime;

use crate::config::ScenarioConfig;
use crate::error::SimError;
use crate::lan::{ContentionLan, LanStats};
use crate::network::{InterfaceReport, Network, NetworkStats};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub seed: u64,
    /// The connection closed within the time budget.
    pub completed: bool,
    /// Delivered bytes equal the written stream.
    pub byte_exact: bool,
    pub bytes_requested: u64,
    pub bytes_delivered: u64,
    /// Simulated time at the end of the run, in ticks.
    pub sim_time: u64,
    pub events: u64,
    /// Simulated-time goodput in bits per second.
    pub goodput_bps: f64,
    pub transport: TransportStats,
    pub receiver: ReceiverStats,
    pub network: NetworkStats,
    pub interfaces: Vec<InterfaceReport>,
    pub lan: Option<LanStats>,
    /// Host time spent, excluded from determinism checks.
    pub wall_clock_us: u64,
}

impl ScenarioReport {
    /// Copy with host-dependent fields cleared.
    pub fn without_wall_clock(&self) -> Self {
        Self {
            wall_clock_us: 0,
            ..self.clone()
        }
    }
}

pub fn run(config: &ScenarioConfig) -> Result<ScenarioReport, SimError> {
    let started = quanta::Instant::now();
    tracing::info!(
        name = %config.name,
        seed = config.seed,
        links = config.links.len(),
        bytes = config.connection.stream_bytes,
        "scenario starting"
    );

    let mut network = Network::new(config)?;
    network.start()?;
    let completed = network.run(SimTime::from_ticks(config.max_time))?;

    let delivered = network.receiver_mut().read();
    let byte_exact = delivered == *network.stream();
    let sim_time = network.now().ticks();
    let goodput_bps = if sim_time == 0 {
        0.0
    } else {
        delivered.len() as f64 * 8.0 * 1e6 / sim_time as f64
    };

    if !completed {
        tracing::warn!(
            name = %config.name,
            delivered = delivered.len(),
            sim_time,
            "connection did not close within the time budget"
        );
    }

    let lan = config.lan.map(|lan| ContentionLan::new(lan).run());

    let report = ScenarioReport {
        name: config.name.clone(),
        seed: config.seed,
        completed,
        byte_exact,
        bytes_requested: config.connection.stream_bytes,
        bytes_delivered: delivered.len() as u64,
        sim_time,
        events: network.events_dispatched(),
        goodput_bps,
        transport: network.sender().stats().clone(),
        receiver: network.receiver().stats().clone(),
        network: network.stats().clone(),
        interfaces: network.interface_reports(),
        lan,
        wall_clock_us: started.elapsed().as_micros() as u64,
    };
    tracing::info!(
        name = %report.name,
        completed,
        byte_exact,
        sim_time,
        wall_clock_us = report.wall_clock_us,
        "scenario finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scenario_completes() {
        let report = run(&ScenarioConfig::default()).unwrap();
        assert!(report.completed);
        assert!(report.byte_exact);
        assert_eq!(report.bytes_delivered, 10_000);
        assert!(report.goodput_bps > 0.0);
        assert!(report.lan.is_none());
        assert_eq!(report.interfaces.len(), 2);
    }

    #[test]
    fn short_transfer_keeps_a_physical_rtt() {
        let mut config = ScenarioConfig::default();
        config.connection.stream_bytes = 2_000;
        let report = run(&config).unwrap();
        assert!(report.completed, "{report:?}");
        assert!(report.byte_exact);

        // Samples come only from segments sent once, so the estimate never
        // drops below the two-way propagation delay.
        let propagation = config.links[0].channel.propagation_delay;
        assert!(report.transport.last_rtt >= 2 * propagation);
        assert!(report.transport.timeout_retransmits < report.transport.segments_sent);
    }

    #[test]
    fn report_serializes_to_json() {
        let report = run(&ScenarioConfig::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["completed"], true);
        assert_eq!(json["interfaces"][0]["interface"], 1);
        assert!(json["transport"]["segments_sent"].as_u64().unwrap() >= 100);
    }
}
