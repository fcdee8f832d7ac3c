use std::collections::HashSet;
use std::fmt;

use georpc_common::{GeoRpcError, Result, Server};

/// A backend node and its role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub addr: String,
    pub is_leader: bool,
}

impl NodeAddress {
    pub fn new(addr: impl Into<String>, is_leader: bool) -> Self {
        Self {
            addr: addr.into(),
            is_leader,
        }
    }

    pub fn leader(addr: impl Into<String>) -> Self {
        Self::new(addr, true)
    }

    pub fn follower(addr: impl Into<String>) -> Self {
        Self::new(addr, false)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = if self.is_leader { "leader" } else { "follower" };
        write!(f, "{} ({})", self.addr, role)
    }
}

impl From<&Server> for NodeAddress {
    fn from(server: &Server) -> Self {
        NodeAddress::new(server.rpc_addr.clone(), server.is_leader)
    }
}

/// The known set of backend nodes at one point in time.
///
/// Nodes are kept sorted by address, so two topologies holding the same
/// nodes compare equal regardless of discovery order. Construction does not
/// check the role rules; call [`validate`](Self::validate) before trusting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTopology {
    nodes: Vec<NodeAddress>,
}

impl ResolvedTopology {
    pub fn new(mut nodes: Vec<NodeAddress>) -> Self {
        nodes.sort_by(|a, b| a.addr.cmp(&b.addr).then(b.is_leader.cmp(&a.is_leader)));
        Self { nodes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_servers(servers: &[Server]) -> Self {
        Self::new(servers.iter().map(NodeAddress::from).collect())
    }

    /// Checks that addresses are unique and that a non-empty topology has
    /// exactly one leader.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.addr.as_str()) {
                return Err(GeoRpcError::TopologyInconsistent(format!(
                    "duplicate address {}",
                    node.addr
                )));
            }
        }

        if self.nodes.is_empty() {
            return Ok(());
        }

        match self.nodes.iter().filter(|n| n.is_leader).count() {
            1 => Ok(()),
            0 => Err(GeoRpcError::TopologyInconsistent(format!(
                "no leader among {} nodes",
                self.nodes.len()
            ))),
            n => Err(GeoRpcError::TopologyInconsistent(format!(
                "{} leaders among {} nodes",
                n,
                self.nodes.len()
            ))),
        }
    }

    pub fn leader(&self) -> Option<&NodeAddress> {
        self.nodes.iter().find(|n| n.is_leader)
    }

    pub fn followers(&self) -> impl Iterator<Item = &NodeAddress> {
        self.nodes.iter().filter(|n| !n.is_leader)
    }

    pub fn nodes(&self) -> &[NodeAddress] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_topology() {
        let topology = ResolvedTopology::new(vec![
            NodeAddress::follower("10.0.0.3:62051"),
            NodeAddress::leader("10.0.0.1:62051"),
            NodeAddress::follower("10.0.0.2:62051"),
        ]);
        assert!(topology.validate().is_ok());
        assert_eq!(topology.len(), 3);
        assert_eq!(topology.leader().unwrap().addr, "10.0.0.1:62051");
        let followers: Vec<_> = topology.followers().map(|n| n.addr.as_str()).collect();
        assert_eq!(followers, vec!["10.0.0.2:62051", "10.0.0.3:62051"]);
    }

    #[test]
    fn test_empty_topology_is_valid() {
        let topology = ResolvedTopology::empty();
        assert!(topology.validate().is_ok());
        assert!(topology.is_empty());
        assert!(topology.leader().is_none());
    }

    #[test]
    fn test_no_leader_rejected() {
        let topology = ResolvedTopology::new(vec![
            NodeAddress::follower("a:1"),
            NodeAddress::follower("b:1"),
        ]);
        let err = topology.validate().unwrap_err();
        assert!(matches!(err, GeoRpcError::TopologyInconsistent(ref m) if m.contains("no leader")));
    }

    #[test]
    fn test_two_leaders_rejected() {
        let topology = ResolvedTopology::new(vec![
            NodeAddress::leader("a:1"),
            NodeAddress::leader("b:1"),
            NodeAddress::follower("c:1"),
        ]);
        let err = topology.validate().unwrap_err();
        assert!(matches!(err, GeoRpcError::TopologyInconsistent(ref m) if m.contains("2 leaders")));
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let topology = ResolvedTopology::new(vec![
            NodeAddress::leader("a:1"),
            NodeAddress::follower("a:1"),
        ]);
        assert!(matches!(
            topology.validate(),
            Err(GeoRpcError::TopologyInconsistent(_))
        ));
    }

    #[test]
    fn test_equality_ignores_discovery_order() {
        let first = ResolvedTopology::new(vec![
            NodeAddress::leader("a:1"),
            NodeAddress::follower("b:1"),
        ]);
        let second = ResolvedTopology::new(vec![
            NodeAddress::follower("b:1"),
            NodeAddress::leader("a:1"),
        ]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_role_change_is_a_different_topology() {
        let before = ResolvedTopology::new(vec![
            NodeAddress::leader("a:1"),
            NodeAddress::follower("b:1"),
        ]);
        let after = ResolvedTopology::new(vec![
            NodeAddress::follower("a:1"),
            NodeAddress::leader("b:1"),
        ]);
        assert_ne!(before, after);
    }

    #[test]
    fn test_from_servers() {
        let servers = vec![
            Server::new("geo-1", "127.0.0.1:61059", true),
            Server::new("geo-2", "127.0.0.1:61061", false),
        ];
        let topology = ResolvedTopology::from_servers(&servers);
        assert_eq!(topology.leader(), Some(&NodeAddress::leader("127.0.0.1:61059")));
        assert_eq!(topology.followers().count(), 1);
    }
}
