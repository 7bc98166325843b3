//! Radio topology and per-link properties

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use treecollect_protocol::NodeAddr;

/// Properties of a bidirectional radio link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    /// Signal strength reported to the receiver, in dBm
    pub rssi: i16,
    /// Probability in `[0, 1]` that a frame is lost
    pub loss_rate: f64,
    /// Propagation plus airtime delay
    pub delay_ms: u64,
    pub active: bool,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            rssi: -70,
            loss_rate: 0.0,
            delay_ms: 5,
            active: true,
        }
    }
}

impl Link {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = rssi;
        self
    }

    pub fn with_loss_rate(mut self, rate: f64) -> Self {
        self.loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Shape of a generated topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyKind {
    /// Each node hears only its predecessor and successor
    Chain,
    /// First node hears everyone, everyone else hears only the first node
    Star,
    /// Row-major grid with 4-neighbourhood
    Grid,
    /// Every node hears every other node
    Full,
}

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TopologyKind::Chain => "chain",
            TopologyKind::Star => "star",
            TopologyKind::Grid => "grid",
            TopologyKind::Full => "full",
        };
        f.write_str(name)
    }
}

impl FromStr for TopologyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chain" => Ok(TopologyKind::Chain),
            "star" => Ok(TopologyKind::Star),
            "grid" => Ok(TopologyKind::Grid),
            "full" => Ok(TopologyKind::Full),
            other => Err(format!(
                "unknown topology '{}' (expected chain, star, grid or full)",
                other
            )),
        }
    }
}

/// Connectivity between simulated nodes
///
/// Links are symmetric and keyed by the ordered address pair, so iteration
/// order (and therefore the simulation) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    links: BTreeMap<(NodeAddr, NodeAddr), Link>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a topology of the given shape over `nodes`
    ///
    /// `grid_width` is only used by [`TopologyKind::Grid`]; it defaults to the
    /// smallest square that fits all nodes.
    pub fn generate(kind: TopologyKind, nodes: &[NodeAddr], grid_width: Option<usize>, link: &Link) -> Self {
        match kind {
            TopologyKind::Chain => Self::chain(nodes, link),
            TopologyKind::Star => Self::star(nodes, link),
            TopologyKind::Grid => {
                let width = grid_width.unwrap_or_else(|| square_width(nodes.len()));
                Self::grid(nodes, width, link)
            }
            TopologyKind::Full => Self::fully_connected(nodes, link),
        }
    }

    pub fn chain(nodes: &[NodeAddr], link: &Link) -> Self {
        let mut topo = Self::new();
        for pair in nodes.windows(2) {
            topo.add_link(pair[0], pair[1], link.clone());
        }
        topo
    }

    pub fn star(nodes: &[NodeAddr], link: &Link) -> Self {
        let mut topo = Self::new();
        let Some((&hub, spokes)) = nodes.split_first() else {
            return topo;
        };
        for &spoke in spokes {
            topo.add_link(hub, spoke, link.clone());
        }
        topo
    }

    pub fn grid(nodes: &[NodeAddr], width: usize, link: &Link) -> Self {
        let mut topo = Self::new();
        let width = width.max(1);
        for (i, &node) in nodes.iter().enumerate() {
            // right neighbour, unless at the end of a row
            if (i + 1) % width != 0 {
                if let Some(&right) = nodes.get(i + 1) {
                    topo.add_link(node, right, link.clone());
                }
            }
            if let Some(&below) = nodes.get(i + width) {
                topo.add_link(node, below, link.clone());
            }
        }
        topo
    }

    pub fn fully_connected(nodes: &[NodeAddr], link: &Link) -> Self {
        let mut topo = Self::new();
        for (i, &a) in nodes.iter().enumerate() {
            for &b in nodes.iter().skip(i + 1) {
                topo.add_link(a, b, link.clone());
            }
        }
        topo
    }

    /// Add or replace the link between `a` and `b`
    pub fn add_link(&mut self, a: NodeAddr, b: NodeAddr, link: Link) {
        self.links.insert(Self::key(a, b), link);
    }

    pub fn remove_link(&mut self, a: NodeAddr, b: NodeAddr) -> Option<Link> {
        self.links.remove(&Self::key(a, b))
    }

    pub fn get_link(&self, a: NodeAddr, b: NodeAddr) -> Option<&Link> {
        self.links.get(&Self::key(a, b))
    }

    pub fn get_link_mut(&mut self, a: NodeAddr, b: NodeAddr) -> Option<&mut Link> {
        self.links.get_mut(&Self::key(a, b))
    }

    /// Whether a frame from `a` can currently reach `b`
    pub fn is_connected(&self, a: NodeAddr, b: NodeAddr) -> bool {
        self.get_link(a, b).is_some_and(|link| link.active)
    }

    /// Nodes `node` currently reaches, in address order
    pub fn neighbors(&self, node: NodeAddr) -> Vec<NodeAddr> {
        let mut result: Vec<NodeAddr> = self
            .links
            .iter()
            .filter(|(_, link)| link.active)
            .filter_map(|(&(a, b), _)| {
                if a == node {
                    Some(b)
                } else if b == node {
                    Some(a)
                } else {
                    None
                }
            })
            .collect();
        result.sort();
        result
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Hop distance from `from` to every node reachable over active links
    pub fn hop_distances(&self, from: NodeAddr) -> BTreeMap<NodeAddr, usize> {
        let mut distances = BTreeMap::new();
        distances.insert(from, 0);
        let mut frontier = vec![from];

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for node in frontier {
                let depth = distances[&node] + 1;
                for neighbor in self.neighbors(node) {
                    if !distances.contains_key(&neighbor) {
                        distances.insert(neighbor, depth);
                        next.push(neighbor);
                    }
                }
            }
            frontier = next;
        }

        distances
    }

    fn key(a: NodeAddr, b: NodeAddr) -> (NodeAddr, NodeAddr) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

fn square_width(n: usize) -> usize {
    let mut width = 1;
    while width * width < n {
        width += 1;
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: u8) -> Vec<NodeAddr> {
        (1..=n).map(NodeAddr::from_id).collect()
    }

    #[test]
    fn test_chain() {
        let nodes = addrs(4);
        let topo = Topology::chain(&nodes, &Link::default());

        assert_eq!(topo.link_count(), 3);
        assert!(topo.is_connected(nodes[0], nodes[1]));
        assert!(topo.is_connected(nodes[1], nodes[0]));
        assert!(!topo.is_connected(nodes[0], nodes[2]));
        assert_eq!(topo.neighbors(nodes[1]), vec![nodes[0], nodes[2]]);
    }

    #[test]
    fn test_star() {
        let nodes = addrs(5);
        let topo = Topology::star(&nodes, &Link::default());

        assert_eq!(topo.neighbors(nodes[0]).len(), 4);
        for spoke in &nodes[1..] {
            assert_eq!(topo.neighbors(*spoke), vec![nodes[0]]);
        }
    }

    #[test]
    fn test_grid() {
        // 1 2 3
        // 4 5 6
        let nodes = addrs(6);
        let topo = Topology::grid(&nodes, 3, &Link::default());

        assert_eq!(topo.link_count(), 7);
        assert_eq!(topo.neighbors(nodes[4]), vec![nodes[1], nodes[3], nodes[5]]);
        assert!(!topo.is_connected(nodes[2], nodes[3]));
    }

    #[test]
    fn test_fully_connected() {
        let nodes = addrs(4);
        let topo = Topology::fully_connected(&nodes, &Link::default());
        assert_eq!(topo.link_count(), 6);
    }

    #[test]
    fn test_disabled_link_hides_neighbor() {
        let nodes = addrs(3);
        let mut topo = Topology::chain(&nodes, &Link::default());
        topo.get_link_mut(nodes[1], nodes[0]).unwrap().active = false;

        assert!(!topo.is_connected(nodes[0], nodes[1]));
        assert_eq!(topo.neighbors(nodes[1]), vec![nodes[2]]);
    }

    #[test]
    fn test_hop_distances() {
        let nodes = addrs(9);
        let topo = Topology::generate(TopologyKind::Grid, &nodes, None, &Link::default());
        let distances = topo.hop_distances(nodes[0]);

        assert_eq!(distances[&nodes[0]], 0);
        assert_eq!(distances[&nodes[4]], 2);
        assert_eq!(distances[&nodes[8]], 4);
    }

    #[test]
    fn test_topology_kind_parse() {
        assert_eq!("chain".parse::<TopologyKind>(), Ok(TopologyKind::Chain));
        assert_eq!("GRID".parse::<TopologyKind>(), Ok(TopologyKind::Grid));
        assert!("ring".parse::<TopologyKind>().is_err());
        assert_eq!(TopologyKind::Full.to_string(), "full");
    }

    #[test]
    fn test_loss_rate_clamped() {
        assert_eq!(Link::new().with_loss_rate(1.5).loss_rate, 1.0);
        assert_eq!(Link::new().with_loss_rate(-0.5).loss_rate, 0.0);
    }
}
