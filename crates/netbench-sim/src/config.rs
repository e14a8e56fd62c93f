//! # Scenario Configuration
//!
//! Scenarios are TOML files parsed into `*Input` structs whose fields are
//! all optional, then resolved against component defaults and validated.
//!
//! ```toml
//! version = 1
//! seed = 7
//! max_time = 20_000_000
//!
//! [link_defaults]
//! data_rate_bps = 2_000_000
//! retransmit_timeout = 4_000
//!
//! [[links]]
//! a = 1
//! b = 2
//! drop_rate = 0.02
//!
//! [[routes]]
//! node = 1
//! destination = 3
//! via = 2
//!
//! [connection]
//! source = 1
//! destination = 3
//! stream_bytes = 20_000
//! ```
//!
//! Routes name the neighbor to forward through; directly linked nodes need
//! no entry.

use serde::Deserialize;
use std::collections::BTreeSet;

use netbench_stack::frame::MAX_PAYLOAD_LEN;
use netbench_stack::link::LinkConfig;
use netbench_stack::segment::SEGMENT_HEADER_LEN;
use netbench_stack::sender::TransportConfig;
use netbench_stack::seq::SeqSpace;
use netbench_stack::time::Ticks;

use crate::channel::ChannelConfig;
use crate::datagram::DATAGRAM_HEADER_LEN;
use crate::lan::LanConfig;
use crate::routing::NodeId;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid scenario TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config version {0}")]
    Version(u32),
    #[error("scenario has no links")]
    NoLinks,
    #[error("link {index}: {reason}")]
    Link { index: usize, reason: String },
    #[error("route {index}: {reason}")]
    Route { index: usize, reason: String },
    #[error("connection: {0}")]
    Connection(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("lan: {0}")]
    Lan(String),
}

// ─── Input (TOML) ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScenarioConfigInput {
    pub version: u32,
    pub name: Option<String>,
    pub seed: Option<u64>,
    pub max_time: Option<u64>,
    pub link_defaults: LinkInput,
    pub links: Vec<LinkInput>,
    pub routes: Vec<RouteInput>,
    pub connection: ConnectionInput,
    pub transport: TransportInput,
    pub lan: Option<LanInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinkInput {
    pub a: Option<NodeId>,
    pub b: Option<NodeId>,
    pub data_rate_bps: Option<u64>,
    pub propagation_delay: Option<u64>,
    pub bit_error_rate: Option<f64>,
    pub drop_rate: Option<f64>,
    pub modulus: Option<u16>,
    pub window: Option<u16>,
    pub retransmit_timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteInput {
    pub node: NodeId,
    pub destination: NodeId,
    pub via: NodeId,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionInput {
    pub source: Option<NodeId>,
    pub destination: Option<NodeId>,
    pub stream_bytes: Option<u64>,
    pub write_size: Option<usize>,
    pub receiver_buffer: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransportInput {
    pub segment_size: Option<usize>,
    pub buffer_slots: Option<usize>,
    pub initial_rtt: Option<u64>,
    pub slow_start_threshold: Option<u64>,
    pub initial_window: Option<u64>,
    pub receiver_window: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LanInput {
    pub stations: Option<u32>,
    pub frames_per_station: Option<u32>,
    pub frame_slots: Option<u64>,
    pub max_slots: Option<u64>,
}

// ─── Resolved ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    pub a: NodeId,
    pub b: NodeId,
    pub channel: ChannelConfig,
    pub arq: LinkConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    pub node: NodeId,
    pub destination: NodeId,
    pub via: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSpec {
    pub source: NodeId,
    pub destination: NodeId,
    pub stream_bytes: u64,
    /// Bytes handed to the transport per application write.
    pub write_size: usize,
    pub receiver_buffer: u64,
    pub transport: TransportConfig,
}

impl Default for ConnectionSpec {
    fn default() -> Self {
        Self {
            source: 1,
            destination: 2,
            stream_bytes: 10_000,
            write_size: 1_000,
            receiver_buffer: 6_400,
            transport: TransportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub version: u32,
    pub name: String,
    pub seed: u64,
    /// Simulated time budget in ticks.
    pub max_time: Ticks,
    pub links: Vec<LinkSpec>,
    pub routes: Vec<RouteSpec>,
    pub connection: ConnectionSpec,
    pub lan: Option<LanConfig>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            name: "default".into(),
            seed: 1,
            max_time: 60_000_000,
            links: vec![LinkSpec {
                a: 1,
                b: 2,
                channel: ChannelConfig::default(),
                arq: LinkConfig::default(),
            }],
            routes: Vec::new(),
            connection: ConnectionSpec::default(),
            lan: None,
        }
    }
}

impl ScenarioConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(ScenarioConfig::default());
        }
        let parsed: ScenarioConfigInput = toml::from_str(input)?;
        parsed.resolve()
    }

    /// Every node named by a link.
    pub fn nodes(&self) -> BTreeSet<NodeId> {
        self.links.iter().flat_map(|l| [l.a, l.b]).collect()
    }

    pub fn are_neighbors(&self, x: NodeId, y: NodeId) -> bool {
        self.links
            .iter()
            .any(|l| (l.a == x && l.b == y) || (l.a == y && l.b == x))
    }
}

// ─── Resolution ─────────────────────────────────────────────────────────────

impl ScenarioConfigInput {
    pub fn resolve(self) -> Result<ScenarioConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::Version(version));
        }
        let defaults = ScenarioConfig::default();

        if self.links.is_empty() {
            return Err(ConfigError::NoLinks);
        }
        let mut links = Vec::with_capacity(self.links.len());
        for (index, input) in self.links.iter().enumerate() {
            let link = resolve_link(input, &self.link_defaults)
                .map_err(|reason| ConfigError::Link { index, reason })?;
            if links.iter().any(|l: &LinkSpec| {
                (l.a == link.a && l.b == link.b) || (l.a == link.b && l.b == link.a)
            }) {
                return Err(ConfigError::Link {
                    index,
                    reason: format!("nodes {} and {} are already linked", link.a, link.b),
                });
            }
            links.push(link);
        }

        let mut config = ScenarioConfig {
            version,
            name: self.name.unwrap_or(defaults.name),
            seed: self.seed.unwrap_or(defaults.seed),
            max_time: self.max_time.unwrap_or(defaults.max_time),
            links,
            routes: Vec::new(),
            connection: defaults.connection,
            lan: None,
        };
        let nodes = config.nodes();

        for (index, route) in self.routes.into_iter().enumerate() {
            let reason = if !nodes.contains(&route.node) {
                Some(format!("unknown node {}", route.node))
            } else if !nodes.contains(&route.destination) {
                Some(format!("unknown destination {}", route.destination))
            } else if !config.are_neighbors(route.node, route.via) {
                Some(format!("node {} has no link to {}", route.node, route.via))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ConfigError::Route { index, reason });
            }
            config.routes.push(RouteSpec {
                node: route.node,
                destination: route.destination,
                via: route.via,
            });
        }

        let transport = resolve_transport(&self.transport).map_err(ConfigError::Transport)?;
        config.connection = resolve_connection(&self.connection, &nodes, transport)
            .map_err(ConfigError::Connection)?;
        config.lan = self.lan.as_ref().map(resolve_lan).transpose().map_err(ConfigError::Lan)?;
        Ok(config)
    }
}

fn resolve_link(input: &LinkInput, defaults: &LinkInput) -> Result<LinkSpec, String> {
    let channel_defaults = ChannelConfig::default();
    let arq_defaults = LinkConfig::default();

    let a = input.a.ok_or("missing endpoint `a`")?;
    let b = input.b.ok_or("missing endpoint `b`")?;
    if a == b {
        return Err(format!("node {a} cannot link to itself"));
    }

    let channel = ChannelConfig {
        data_rate_bps: input
            .data_rate_bps
            .or(defaults.data_rate_bps)
            .unwrap_or(channel_defaults.data_rate_bps),
        propagation_delay: input
            .propagation_delay
            .or(defaults.propagation_delay)
            .unwrap_or(channel_defaults.propagation_delay),
        bit_error_rate: input
            .bit_error_rate
            .or(defaults.bit_error_rate)
            .unwrap_or(channel_defaults.bit_error_rate),
        drop_rate: input
            .drop_rate
            .or(defaults.drop_rate)
            .unwrap_or(channel_defaults.drop_rate),
    };
    if channel.data_rate_bps == 0 {
        return Err("data_rate_bps must be positive".into());
    }
    for (name, p) in [
        ("bit_error_rate", channel.bit_error_rate),
        ("drop_rate", channel.drop_rate),
    ] {
        if !(0.0..1.0).contains(&p) {
            return Err(format!("{name} must be in [0, 1), got {p}"));
        }
    }

    let arq = LinkConfig {
        modulus: input.modulus.or(defaults.modulus).unwrap_or(arq_defaults.modulus),
        window: input.window.or(defaults.window).unwrap_or(arq_defaults.window),
        retransmit_timeout: input
            .retransmit_timeout
            .or(defaults.retransmit_timeout)
            .unwrap_or(arq_defaults.retransmit_timeout),
    };
    SeqSpace::new(arq.modulus, arq.window).map_err(|e| e.to_string())?;

    Ok(LinkSpec { a, b, channel, arq })
}

fn resolve_transport(input: &TransportInput) -> Result<TransportConfig, String> {
    let d = TransportConfig::default();
    let config = TransportConfig {
        segment_size: input.segment_size.unwrap_or(d.segment_size),
        buffer_slots: input.buffer_slots.unwrap_or(d.buffer_slots),
        initial_rtt: input.initial_rtt.unwrap_or(d.initial_rtt),
        slow_start_threshold: input.slow_start_threshold.unwrap_or(d.slow_start_threshold),
        initial_window: input.initial_window.unwrap_or(d.initial_window),
        receiver_window: input.receiver_window.unwrap_or(d.receiver_window),
    };
    let max_segment = MAX_PAYLOAD_LEN - DATAGRAM_HEADER_LEN - SEGMENT_HEADER_LEN;
    if config.segment_size == 0 || config.segment_size > max_segment {
        return Err(format!("segment_size must be in 1..={max_segment}"));
    }
    if config.buffer_slots == 0 {
        return Err("buffer_slots must be positive".into());
    }
    if config.initial_rtt == 0 {
        return Err("initial_rtt must be positive".into());
    }
    Ok(config)
}

fn resolve_connection(
    input: &ConnectionInput,
    nodes: &BTreeSet<NodeId>,
    transport: TransportConfig,
) -> Result<ConnectionSpec, String> {
    let d = ConnectionSpec::default();
    let first = nodes.first().copied().unwrap_or(d.source);
    let last = nodes.last().copied().unwrap_or(d.destination);
    let spec = ConnectionSpec {
        source: input.source.unwrap_or(first),
        destination: input.destination.unwrap_or(last),
        stream_bytes: input.stream_bytes.unwrap_or(d.stream_bytes),
        write_size: input.write_size.unwrap_or(d.write_size),
        receiver_buffer: input.receiver_buffer.unwrap_or(d.receiver_buffer),
        transport,
    };
    for node in [spec.source, spec.destination] {
        if !nodes.contains(&node) {
            return Err(format!("unknown node {node}"));
        }
    }
    if spec.source == spec.destination {
        return Err("source and destination must differ".into());
    }
    if spec.stream_bytes == 0 {
        return Err("stream_bytes must be positive".into());
    }
    if spec.write_size == 0 {
        return Err("write_size must be positive".into());
    }
    if spec.receiver_buffer == 0 {
        return Err("receiver_buffer must be positive".into());
    }
    Ok(spec)
}

fn resolve_lan(input: &LanInput) -> Result<LanConfig, String> {
    let d = LanConfig::default();
    let config = LanConfig {
        stations: input.stations.unwrap_or(d.stations),
        frames_per_station: input.frames_per_station.unwrap_or(d.frames_per_station),
        frame_slots: input.frame_slots.unwrap_or(d.frame_slots),
        max_slots: input.max_slots.unwrap_or(d.max_slots),
    };
    if config.stations == 0 {
        return Err("stations must be positive".into());
    }
    Ok(config)
}
