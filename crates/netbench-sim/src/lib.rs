//! Discrete-event harness for `netbench-stack`.
//!
//! Supplies the collaborators the protocol core only sees through traits:
//! an event queue that owns simulated time, lossy point-to-point channels,
//! a slotted contention LAN, a static next-hop table, and the network layer
//! that ties them to one transport connection. Scenarios are loaded from
//! TOML and produce a JSON-serializable report.

pub mod channel;
pub mod config;
pub mod datagram;
pub mod engine;
pub mod error;
pub mod lan;
pub mod network;
pub mod routing;
pub mod scenario;

pub use config::ScenarioConfig;
pub use error::SimError;
pub use scenario::{run, ScenarioReport};
