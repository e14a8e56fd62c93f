//! # Network
//!
//! Wires a scenario together: nodes joined by full-duplex links, one
//! [`LinkArq`] and one outgoing [`Channel`] per interface, a static routing
//! table, and a single transport connection between two hosts.
//!
//! Segments leaving either transport end are wrapped in a [`Datagram`] and
//! forwarded hop by hop. Each hop hands the datagram to the next interface's
//! link queue; the link layer makes each hop reliable.
//!
//! Interface ids are assigned per link in declaration order: link `k`
//! gets `2k + 1` on its `a` side and `2k + 2` on its `b` side.

use bytes::Bytes;
use serde::Serialize;
use std::rc::Rc;

use netbench_stack::bits::BitSequence;
use netbench_stack::link::LinkArq;
use netbench_stack::receiver::TransportReceiver;
use netbench_stack::sender::TransportWindow;
use netbench_stack::stats::LinkStats;
use netbench_stack::time::{Clock, ConnectionId, InterfaceId, Scheduler, SimTime, Wakeup};
use netbench_stack::{Result, StackError};

use crate::channel::{Channel, ChannelStats};
use crate::config::ScenarioConfig;
use crate::datagram::Datagram;
use crate::engine::{Event, EventQueue};
use crate::error::SimError;
use crate::routing::{NextHop, NodeId, StaticRoutes};

/// Connection id of the scenario's single transport connection.
pub const CONNECTION: ConnectionId = 1;

/// Deterministic byte pattern used as the application stream.
pub fn stream_pattern(len: u64) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn channel_seed(seed: u64, interface: InterfaceId) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ u64::from(interface)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    /// Datagrams originated by the transport ends.
    pub datagrams_sent: u64,
    /// Datagrams relayed by an intermediate node.
    pub datagrams_forwarded: u64,
    /// Datagrams that reached their destination node.
    pub datagrams_delivered: u64,
    pub malformed: u64,
    pub unroutable: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceReport {
    pub interface: InterfaceId,
    pub node: NodeId,
    pub peer: NodeId,
    pub link: LinkStats,
    pub channel: ChannelStats,
}

#[derive(Debug)]
struct Interface {
    id: InterfaceId,
    node: NodeId,
    peer_node: NodeId,
    peer_interface: InterfaceId,
    arq: LinkArq,
    channel: Channel,
    /// A frame is being clocked onto the line.
    busy: bool,
}

pub struct Network {
    queue: Rc<EventQueue>,
    interfaces: Vec<Interface>,
    routes: StaticRoutes,
    source: NodeId,
    destination: NodeId,
    stream: Bytes,
    write_size: usize,
    sender: TransportWindow,
    receiver: TransportReceiver,
    stats: NetworkStats,
}

impl Network {
    pub fn new(config: &ScenarioConfig) -> std::result::Result<Self, SimError> {
        let queue = Rc::new(EventQueue::new());
        let scheduler: Rc<dyn Scheduler> = queue.clone();

        let mut interfaces = Vec::with_capacity(config.links.len() * 2);
        let mut routes = StaticRoutes::new();
        for (k, link) in config.links.iter().enumerate() {
            let a_id = (2 * k + 1) as InterfaceId;
            let b_id = a_id + 1;
            for (id, node, peer_node, peer_interface) in
                [(a_id, link.a, link.b, b_id), (b_id, link.b, link.a, a_id)]
            {
                routes.attach(id, node, peer_node);
                interfaces.push(Interface {
                    id,
                    node,
                    peer_node,
                    peer_interface,
                    arq: LinkArq::new(id, link.arq, scheduler.clone())?,
                    channel: Channel::new(link.channel, channel_seed(config.seed, id)),
                    busy: false,
                });
            }
        }

        for route in &config.routes {
            let via = interfaces
                .iter()
                .find(|i| i.node == route.node && i.peer_node == route.via)
                .map(|i| i.id);
            if let Some(interface) = via {
                routes.insert(route.node, route.destination, interface);
            }
        }
        routes.add_neighbor_routes();

        let conn = &config.connection;
        routes.validate(&[
            (conn.source, conn.destination),
            (conn.destination, conn.source),
        ])?;

        Ok(Network {
            sender: TransportWindow::new(CONNECTION, conn.transport.clone(), scheduler),
            receiver: TransportReceiver::new(CONNECTION, conn.receiver_buffer),
            queue,
            interfaces,
            routes,
            source: conn.source,
            destination: conn.destination,
            stream: Bytes::from(stream_pattern(conn.stream_bytes)),
            write_size: conn.write_size,
            stats: NetworkStats::default(),
        })
    }

    /// Bring every link up, open the connection and write the stream.
    pub fn start(&mut self) -> Result<()> {
        for iface in &mut self.interfaces {
            iface.arq.initialize();
        }
        self.sender.connect();
        let mut offset = 0;
        while offset < self.stream.len() {
            let end = (offset + self.write_size).min(self.stream.len());
            self.sender.enqueue(self.stream.slice(offset..end))?;
            offset = end;
        }
        tracing::debug!(
            source = self.source,
            destination = self.destination,
            bytes = self.stream.len(),
            "transfer started"
        );
        self.flush_transport();
        Ok(())
    }

    /// Process events until the connection closes, the queue empties or the
    /// next event lies beyond `until`. Returns whether the connection closed.
    pub fn run(&mut self, until: SimTime) -> Result<bool> {
        while !self.sender.is_connection_closed() {
            match self.queue.peek_time() {
                Some(at) if at <= until => {
                    self.step()?;
                }
                _ => break,
            }
        }
        Ok(self.sender.is_connection_closed())
    }

    /// Process one event. Returns `false` when the queue is empty.
    pub fn step(&mut self) -> Result<bool> {
        let Some((_, event)) = self.queue.pop() else {
            return Ok(false);
        };
        self.dispatch(event)?;
        Ok(true)
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    pub fn events_dispatched(&self) -> u64 {
        self.queue.dispatched()
    }

    pub fn sender(&self) -> &TransportWindow {
        &self.sender
    }

    pub fn receiver(&self) -> &TransportReceiver {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut TransportReceiver {
        &mut self.receiver
    }

    /// The bytes the application wrote.
    pub fn stream(&self) -> &Bytes {
        &self.stream
    }

    pub fn routes(&self) -> &StaticRoutes {
        &self.routes
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn interface_reports(&self) -> Vec<InterfaceReport> {
        self.interfaces
            .iter()
            .map(|i| InterfaceReport {
                interface: i.id,
                node: i.node,
                peer: i.peer_node,
                link: i.arq.stats().clone(),
                channel: i.channel.stats().clone(),
            })
            .collect()
    }

    // ─── Event handling ─────────────────────────────────────────────────

    fn dispatch(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Wakeup(Wakeup::LinkTimeout { interface }) => {
                let fired = self
                    .interface_mut(interface)
                    .is_some_and(|iface| iface.arq.on_timeout());
                if fired {
                    self.kick(interface);
                }
            }
            Event::Wakeup(Wakeup::TransportTick { connection }) => {
                if connection == self.sender.connection() {
                    self.sender.on_tick()?;
                    self.flush_transport();
                }
            }
            Event::TransmitComplete { interface } => {
                if let Some(iface) = self.interface_mut(interface) {
                    iface.busy = false;
                }
                self.kick(interface);
            }
            Event::Arrival { interface, wire } => self.on_arrival(interface, &wire)?,
        }
        Ok(())
    }

    fn on_arrival(&mut self, interface: InterfaceId, wire: &BitSequence) -> Result<()> {
        let Some(iface) = self.interface_mut(interface) else {
            return Ok(());
        };
        let node = iface.node;
        match iface.arq.on_receive(wire) {
            Ok(outcome) => {
                if let Some(payload) = outcome.delivered {
                    self.on_datagram(node, payload)?;
                }
            }
            Err(err @ (StackError::IntegrityFailure | StackError::OutOfWindowFrame { .. })) => {
                tracing::trace!(link = interface, %err, "frame discarded");
            }
            Err(err) => return Err(err),
        }
        // The link may owe an acknowledgment even when the frame was refused.
        self.kick(interface);
        Ok(())
    }

    fn on_datagram(&mut self, node: NodeId, payload: Bytes) -> Result<()> {
        let Some(datagram) = Datagram::decode(&payload) else {
            self.stats.malformed += 1;
            tracing::warn!(node, bytes = payload.len(), "malformed datagram dropped");
            return Ok(());
        };

        if datagram.destination != node {
            self.stats.datagrams_forwarded += 1;
            tracing::trace!(node, destination = datagram.destination, "forwarding datagram");
            self.forward(node, datagram.destination, payload);
            return Ok(());
        }

        self.stats.datagrams_delivered += 1;
        if node == self.destination {
            self.receiver.on_segment(&datagram.segment);
        } else if node == self.source {
            self.sender.on_segment_arrived(&datagram.segment)?;
        }
        self.flush_transport();
        Ok(())
    }

    /// Send everything both transport ends have produced.
    fn flush_transport(&mut self) {
        let (source, destination) = (self.source, self.destination);
        let outbound: Vec<_> = self.sender.drain_output().collect();
        let replies: Vec<_> = self.receiver.drain_output().collect();

        for segment in outbound {
            self.stats.datagrams_sent += 1;
            let bytes = Datagram::new(source, destination, segment).encode();
            self.forward(source, destination, bytes);
        }
        for segment in replies {
            self.stats.datagrams_sent += 1;
            let bytes = Datagram::new(destination, source, segment).encode();
            self.forward(destination, source, bytes);
        }
    }

    fn forward(&mut self, node: NodeId, destination: NodeId, datagram: Bytes) {
        let Some(interface) = self.routes.next_hop(node, destination) else {
            self.stats.unroutable += 1;
            tracing::warn!(node, destination, "no route, datagram dropped");
            return;
        };
        if let Some(iface) = self.interface_mut(interface) {
            iface.arq.enqueue(datagram);
        }
        self.kick(interface);
    }

    /// Start the next transmission on `interface` if its line is free.
    fn kick(&mut self, interface: InterfaceId) {
        let now = self.queue.now();
        let Some(iface) = self
            .interfaces
            .get_mut((interface as usize).wrapping_sub(1))
        else {
            return;
        };
        if iface.busy {
            return;
        }
        let Some(out) = iface.arq.poll_send() else {
            return;
        };

        iface.busy = true;
        let transmit = iface.channel.transmission_time(out.wire.len());
        let arrive = transmit + iface.channel.propagation_delay();
        let peer = iface.peer_interface;
        tracing::trace!(
            link = interface,
            sn = out.frame.sequence,
            ack = out.frame.ack,
            data = out.frame.is_data(),
            retransmission = out.retransmission,
            "frame on the line"
        );
        let delivered = iface.channel.carry(out.wire);

        self.queue.push(now + transmit, Event::TransmitComplete { interface });
        if let Some(wire) = delivered {
            self.queue.push(
                now + arrive,
                Event::Arrival {
                    interface: peer,
                    wire,
                },
            );
        }
    }

    fn interface_mut(&mut self, interface: InterfaceId) -> Option<&mut Interface> {
        self.interfaces.get_mut((interface as usize).wrapping_sub(1))
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("now", &self.queue.now())
            .field("interfaces", &self.interfaces.len())
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("sender", &self.sender)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkSpec;
    use crate::channel::ChannelConfig;
    use netbench_stack::link::LinkConfig;

    fn two_nodes() -> ScenarioConfig {
        ScenarioConfig {
            connection: crate::config::ConnectionSpec {
                stream_bytes: 2_000,
                ..Default::default()
            },
            ..ScenarioConfig::default()
        }
    }

    #[test]
    fn interfaces_are_numbered_per_link() {
        let net = Network::new(&two_nodes()).unwrap();
        let reports = net.interface_reports();
        assert_eq!(reports.len(), 2);
        assert_eq!((reports[0].interface, reports[0].node, reports[0].peer), (1, 1, 2));
        assert_eq!((reports[1].interface, reports[1].node, reports[1].peer), (2, 2, 1));
        assert_eq!(net.routes().next_hop(1, 2), Some(1));
        assert_eq!(net.routes().next_hop(2, 1), Some(2));
    }

    #[test]
    fn direct_link_transfer_completes() {
        let mut net = Network::new(&two_nodes()).unwrap();
        net.start().unwrap();
        assert!(net.run(SimTime::from_ticks(60_000_000)).unwrap());
        let expected = net.stream().clone();
        assert_eq!(net.receiver_mut().read(), expected);
        assert_eq!(net.stats().datagrams_forwarded, 0);
        assert_eq!(net.stats().unroutable, 0);
    }

    #[test]
    fn missing_route_fails_validation() {
        let mut config = two_nodes();
        config.links.push(LinkSpec {
            a: 3,
            b: 4,
            channel: ChannelConfig::default(),
            arq: LinkConfig::default(),
        });
        config.connection.destination = 4;
        assert!(matches!(Network::new(&config), Err(SimError::Route(_))));
    }

    #[test]
    fn time_budget_stops_the_run() {
        let mut net = Network::new(&two_nodes()).unwrap();
        net.start().unwrap();
        assert!(!net.run(SimTime::from_ticks(500)).unwrap());
        assert!(net.now() <= SimTime::from_ticks(500));
    }
}
