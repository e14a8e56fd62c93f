//! # Scenario tests
//!
//! Whole-stack runs through the harness: multi-hop lossy delivery,
//! reproducibility from a seed, the contention LAN, and configuration
//! failures surfacing before anything runs.

use netbench_sim::config::ScenarioConfig;
use netbench_sim::{run, SimError};

const THREE_HOP: &str = include_str!("../scenarios/three_hop_lossy.toml");
const LAN: &str = include_str!("../scenarios/lan_contention.toml");

fn three_hop() -> ScenarioConfig {
    ScenarioConfig::from_toml_str(THREE_HOP).unwrap()
}

#[test]
fn multi_hop_lossy_transfer_is_byte_exact_and_closes() {
    let report = run(&three_hop()).unwrap();
    assert!(report.completed, "connection did not close: {report:?}");
    assert!(report.byte_exact);
    assert_eq!(report.bytes_delivered, 20_000);
    assert_eq!(report.receiver.bytes_delivered, 20_000);

    // Both directions of the middle hops carried relayed traffic.
    assert!(report.network.datagrams_forwarded > 0);
    assert_eq!(report.network.unroutable, 0);
    assert_eq!(report.network.malformed, 0);

    // The channels really were hostile, and the link layer repaired them.
    let dropped: u64 = report.interfaces.iter().map(|i| i.channel.frames_dropped).sum();
    let retransmitted: u64 = report.interfaces.iter().map(|i| i.link.retransmissions).sum();
    assert!(dropped > 0);
    assert!(retransmitted > 0);
    assert_eq!(report.interfaces.len(), 6);
}

#[test]
fn corrupted_frames_never_reach_the_network_layer() {
    let mut config = three_hop();
    for link in &mut config.links {
        link.channel.bit_error_rate = 0.0002;
        link.channel.drop_rate = 0.0;
    }
    let report = run(&config).unwrap();
    assert!(report.completed);
    assert!(report.byte_exact);
    let corrupted: u64 = report.interfaces.iter().map(|i| i.channel.frames_corrupted).sum();
    let rejected: u64 = report.interfaces.iter().map(|i| i.link.integrity_failures).sum();
    // Frames still in flight when the connection closes are never received.
    assert!(rejected > 0);
    assert!(rejected <= corrupted);
    assert_eq!(report.network.malformed, 0);
}

#[test]
fn same_seed_same_report() {
    let first = run(&three_hop()).unwrap();
    let second = run(&three_hop()).unwrap();
    assert_eq!(first.without_wall_clock(), second.without_wall_clock());
}

#[test]
fn different_seed_changes_the_run() {
    let first = run(&three_hop()).unwrap();
    let mut config = three_hop();
    config.seed += 1;
    let second = run(&config).unwrap();
    assert!(second.byte_exact);
    assert_ne!(first.interfaces, second.interfaces);
}

#[test]
fn lan_scenario_reports_contention() {
    let config = ScenarioConfig::from_toml_str(LAN).unwrap();
    let report = run(&config).unwrap();
    assert!(report.completed && report.byte_exact);

    let lan = report.lan.expect("lan section configured");
    assert_eq!(lan.stations, 16);
    assert_eq!(lan.frames_offered, 16 * 32);
    assert_eq!(lan.frames_delivered + lan.frames_dropped, lan.frames_offered);
    assert!(lan.collisions > 0);
}

#[test]
fn clean_network_loses_nothing() {
    let mut config = three_hop();
    for link in &mut config.links {
        link.channel.bit_error_rate = 0.0;
        link.channel.drop_rate = 0.0;
    }
    let report = run(&config).unwrap();
    assert!(report.completed && report.byte_exact);
    assert!(report
        .interfaces
        .iter()
        .all(|i| i.link.integrity_failures == 0 && i.channel.frames_dropped == 0));
    assert_eq!(report.receiver.beyond_window, 0);
}

#[test]
fn unreachable_destination_is_a_route_error() {
    let toml = r#"
        [[links]]
        a = 1
        b = 2
        [[links]]
        a = 2
        b = 3
        [connection]
        source = 1
        destination = 3
    "#;
    let config = ScenarioConfig::from_toml_str(toml).unwrap();
    assert!(matches!(run(&config), Err(SimError::Route(_))));
}

#[test]
fn exhausted_time_budget_reports_incomplete() {
    let mut config = three_hop();
    config.max_time = 5_000;
    let report = run(&config).unwrap();
    assert!(!report.completed);
    assert!(!report.byte_exact);
    assert!(report.sim_time <= 5_000);
}
