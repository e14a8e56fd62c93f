//! # Static Routing
//!
//! Next-hop lookup for the network layer. Routes are loaded, not computed:
//! each entry says which interface a node uses to reach a destination.
//! [`StaticRoutes::validate`] walks every entry hop by hop and rejects
//! tables that loop, dead-end or point at another node's interface.

use std::collections::{BTreeMap, BTreeSet};

use netbench_stack::time::InterfaceId;

pub type NodeId = u32;

/// Which interface a node forwards through to reach `destination`.
pub trait NextHop {
    fn next_hop(&self, node: NodeId, destination: NodeId) -> Option<InterfaceId>;
}

/// Where an interface sits: its owning node and the node at the far end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub node: NodeId,
    pub peer: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("interface {interface} is not attached to any node")]
    UnknownInterface { interface: InterfaceId },
    #[error("route at node {node} uses interface {interface}, which belongs to node {owner}")]
    ForeignInterface {
        node: NodeId,
        interface: InterfaceId,
        owner: NodeId,
    },
    #[error("no route from node {node} to node {destination}")]
    NoRoute { node: NodeId, destination: NodeId },
    #[error("routing loop from node {origin} to node {destination} through node {node}")]
    Loop {
        origin: NodeId,
        destination: NodeId,
        node: NodeId,
    },
}

#[derive(Debug, Clone, Default)]
pub struct StaticRoutes {
    table: BTreeMap<(NodeId, NodeId), InterfaceId>,
    attachments: BTreeMap<InterfaceId, Attachment>,
}

impl StaticRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `interface` belongs to `node` and leads to `peer`.
    pub fn attach(&mut self, interface: InterfaceId, node: NodeId, peer: NodeId) {
        self.attachments.insert(interface, Attachment { node, peer });
    }

    pub fn insert(&mut self, node: NodeId, destination: NodeId, interface: InterfaceId) {
        self.table.insert((node, destination), interface);
    }

    /// Add a route over every direct attachment that has no explicit entry.
    pub fn add_neighbor_routes(&mut self) {
        let direct: Vec<_> = self
            .attachments
            .iter()
            .map(|(&interface, a)| (a.node, a.peer, interface))
            .collect();
        for (node, peer, interface) in direct {
            self.table.entry((node, peer)).or_insert(interface);
        }
    }

    pub fn attachment(&self, interface: InterfaceId) -> Option<Attachment> {
        self.attachments.get(&interface).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Check every entry, then require a route for each `(from, to)` pair in
    /// `required`.
    pub fn validate(&self, required: &[(NodeId, NodeId)]) -> Result<(), RouteError> {
        for &(node, destination) in self.table.keys() {
            self.trace(node, destination)?;
        }
        for &(from, to) in required {
            self.trace(from, to)?;
        }
        Ok(())
    }

    /// Follow next hops from `origin` until `destination`, returning the path.
    pub fn trace(&self, origin: NodeId, destination: NodeId) -> Result<Vec<NodeId>, RouteError> {
        let mut path = vec![origin];
        let mut visited = BTreeSet::from([origin]);
        let mut node = origin;
        while node != destination {
            let interface = self.next_hop(node, destination).ok_or(RouteError::NoRoute {
                node,
                destination,
            })?;
            let attachment = self
                .attachment(interface)
                .ok_or(RouteError::UnknownInterface { interface })?;
            if attachment.node != node {
                return Err(RouteError::ForeignInterface {
                    node,
                    interface,
                    owner: attachment.node,
                });
            }
            node = attachment.peer;
            if !visited.insert(node) {
                return Err(RouteError::Loop {
                    origin,
                    destination,
                    node,
                });
            }
            path.push(node);
        }
        Ok(path)
    }
}

impl NextHop for StaticRoutes {
    fn next_hop(&self, node: NodeId, destination: NodeId) -> Option<InterfaceId> {
        self.table.get(&(node, destination)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 ─(1,2)─ 2 ─(3,4)─ 3
    fn line() -> StaticRoutes {
        let mut routes = StaticRoutes::new();
        routes.attach(1, 1, 2);
        routes.attach(2, 2, 1);
        routes.attach(3, 2, 3);
        routes.attach(4, 3, 2);
        routes
    }

    #[test]
    fn neighbor_routes_fill_gaps() {
        let mut routes = line();
        routes.add_neighbor_routes();
        assert_eq!(routes.len(), 4);
        assert_eq!(routes.next_hop(2, 3), Some(3));
        assert_eq!(routes.next_hop(1, 3), None);
    }

    #[test]
    fn multi_hop_path_is_traced() {
        let mut routes = line();
        routes.insert(1, 3, 1);
        routes.insert(3, 1, 4);
        routes.add_neighbor_routes();
        assert_eq!(routes.trace(1, 3), Ok(vec![1, 2, 3]));
        assert_eq!(routes.trace(3, 1), Ok(vec![3, 2, 1]));
        assert!(routes.validate(&[(1, 3), (3, 1)]).is_ok());
    }

    #[test]
    fn missing_route_is_reported() {
        let mut routes = line();
        routes.add_neighbor_routes();
        assert_eq!(
            routes.validate(&[(1, 3)]),
            Err(RouteError::NoRoute {
                node: 1,
                destination: 3
            })
        );
    }

    #[test]
    fn loop_is_rejected() {
        let mut routes = line();
        routes.insert(1, 3, 1);
        // Node 2 bounces traffic for 3 back to 1.
        routes.insert(2, 3, 2);
        assert_eq!(
            routes.validate(&[]),
            Err(RouteError::Loop {
                origin: 1,
                destination: 3,
                node: 1
            })
        );
    }

    #[test]
    fn foreign_and_unknown_interfaces_are_rejected() {
        let mut routes = line();
        routes.insert(1, 3, 3);
        assert!(matches!(
            routes.validate(&[]),
            Err(RouteError::ForeignInterface { node: 1, interface: 3, owner: 2 })
        ));

        let mut routes = line();
        routes.insert(1, 3, 99);
        assert_eq!(
            routes.validate(&[]),
            Err(RouteError::UnknownInterface { interface: 99 })
        );
    }
}
