//! Simulation results and delivery statistics

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use treecollect_protocol::NodeAddr;
use treecollect_routing::{ConnectionStats, Role, RouteEntry};

/// Per-source application traffic as seen by the sink
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceStats {
    /// Application seqns handed to the collect connection
    pub sent: BTreeSet<u16>,
    /// Seqns that reached the sink
    pub received: BTreeSet<u16>,
    /// Send attempts refused with no route
    pub no_route: u64,
    /// Receptions of a seqn the sink already had
    pub duplicates: u64,
    /// Sum of hop counts over received packets
    pub total_hops: u64,
}

impl SourceStats {
    pub fn tx(&self) -> usize {
        self.sent.len()
    }

    pub fn rx(&self) -> usize {
        self.received.len()
    }

    /// Packet delivery ratio in percent
    pub fn pdr(&self) -> f64 {
        if self.sent.is_empty() {
            return 0.0;
        }
        100.0 * self.rx() as f64 / self.tx() as f64
    }

    /// Packet loss ratio in percent
    pub fn plr(&self) -> f64 {
        100.0 - self.pdr()
    }

    pub fn mean_hops(&self) -> Option<f64> {
        (!self.received.is_empty()).then(|| self.total_hops as f64 / self.rx() as f64)
    }
}

/// Delivery statistics over every data source in the network
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryStats {
    sources: BTreeMap<NodeAddr, SourceStats>,
    /// Nodes expected to produce traffic
    expected: BTreeSet<NodeAddr>,
}

impl DeliveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `node` runs the application and should show up as a sender
    pub fn expect_source(&mut self, node: NodeAddr) {
        self.expected.insert(node);
    }

    pub fn record_sent(&mut self, source: NodeAddr, seqn: u16) {
        self.sources.entry(source).or_default().sent.insert(seqn);
    }

    pub fn record_no_route(&mut self, source: NodeAddr) {
        self.sources.entry(source).or_default().no_route += 1;
    }

    pub fn record_received(&mut self, source: NodeAddr, seqn: u16, hops: u8) {
        let stats = self.sources.entry(source).or_default();
        if stats.received.insert(seqn) {
            stats.total_hops += u64::from(hops);
        } else {
            stats.duplicates += 1;
        }
    }

    pub fn source(&self, node: &NodeAddr) -> Option<&SourceStats> {
        self.sources.get(node)
    }

    pub fn sources(&self) -> impl Iterator<Item = (&NodeAddr, &SourceStats)> {
        self.sources.iter()
    }

    /// Expected sources that never managed to send anything
    pub fn silent_nodes(&self) -> Vec<NodeAddr> {
        self.expected
            .iter()
            .filter(|node| self.sources.get(node).map_or(true, |s| s.sent.is_empty()))
            .copied()
            .collect()
    }

    pub fn total_sent(&self) -> usize {
        self.sources.values().map(SourceStats::tx).sum()
    }

    pub fn total_received(&self) -> usize {
        self.sources.values().map(SourceStats::rx).sum()
    }

    pub fn overall_pdr(&self) -> f64 {
        let sent = self.total_sent();
        if sent == 0 {
            return 0.0;
        }
        100.0 * self.total_received() as f64 / sent as f64
    }

    pub fn overall_plr(&self) -> f64 {
        100.0 - self.overall_pdr()
    }
}

impl fmt::Display for DeliveryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let silent = self.silent_nodes();
        if !silent.is_empty() {
            writeln!(f, "----- WARNING -----")?;
            for node in silent {
                writeln!(f, "Warning: node {} did not send any data.", node)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "----- Node Statistics -----")?;
        for (node, stats) in self.sources.iter().filter(|(_, s)| !s.sent.is_empty()) {
            writeln!(
                f,
                "Node {}: TX Packets = {}, RX Packets = {}, PDR = {:.2}%, PLR = {:.2}%",
                node,
                stats.tx(),
                stats.rx(),
                stats.pdr(),
                stats.plr()
            )?;
        }

        writeln!(f)?;
        writeln!(f, "----- Overall Statistics -----")?;
        writeln!(f, "Total Number of Packets Sent: {}", self.total_sent())?;
        writeln!(f, "Total Number of Packets Received: {}", self.total_received())?;
        writeln!(f, "Overall PDR = {:.2}%", self.overall_pdr())?;
        write!(f, "Overall PLR = {:.2}%", self.overall_plr())
    }
}

/// Frame-level counters of the simulated radio
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RadioStats {
    pub broadcasts: u64,
    pub unicasts: u64,
    /// Copies scheduled for delivery to a receiver
    pub frames_delivered: u64,
    /// Copies dropped by link loss
    pub frames_lost: u64,
    /// Unicasts addressed to a node with no active link to the sender
    pub frames_unreachable: u64,
}

/// Routing view of one node at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub addr: NodeAddr,
    pub role: Role,
    pub parent: Option<NodeAddr>,
    pub metric: u16,
    pub stats: ConnectionStats,
}

/// Outcome of [`Simulator::run_until`](crate::Simulator::run_until)
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    #[serde(with = "duration_ms")]
    pub end_time: Duration,
    pub events_processed: u64,
    pub sink: NodeAddr,
    pub nodes: Vec<NodeSnapshot>,
    /// The sink's routing table, in slot order
    pub sink_table: Vec<RouteEntry>,
    pub radio: RadioStats,
    pub delivery: DeliveryStats,
}

impl SimulationResult {
    pub fn node(&self, addr: &NodeAddr) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| &n.addr == addr)
    }

    /// Every router has a parent
    pub fn converged(&self) -> bool {
        self.nodes
            .iter()
            .filter(|n| n.role == Role::Router)
            .all(|n| n.parent.is_some())
    }

    /// The sink's table names exactly the parent each router really uses
    pub fn reconstructed_tree_matches(&self) -> bool {
        self.nodes
            .iter()
            .filter(|n| n.role == Role::Router)
            .all(|n| {
                let recorded = self
                    .sink_table
                    .iter()
                    .find(|e| e.source == n.addr)
                    .map(|e| e.parent);
                n.parent.is_some() && recorded == n.parent
            })
    }

    /// Sum of every node's connection counters
    pub fn total_stats(&self) -> ConnectionStats {
        self.nodes.iter().fold(ConnectionStats::default(), |mut acc, n| {
            let s = &n.stats;
            acc.beacons_sent += s.beacons_sent;
            acc.beacons_received += s.beacons_received;
            acc.beacons_accepted += s.beacons_accepted;
            acc.reports_sent += s.reports_sent;
            acc.reports_relayed += s.reports_relayed;
            acc.reports_recorded += s.reports_recorded;
            acc.data_originated += s.data_originated;
            acc.data_forwarded += s.data_forwarded;
            acc.data_delivered += s.data_delivered;
            acc.malformed_dropped += s.malformed_dropped;
            acc.no_route_dropped += s.no_route_dropped;
            acc.table_full_dropped += s.table_full_dropped;
            acc.stale_dropped += s.stale_dropped;
            acc.hop_limit_dropped += s.hop_limit_dropped;
            acc.unexpected_channel_dropped += s.unexpected_channel_dropped;
            acc.transport_errors += s.transport_errors;
            acc
        })
    }
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Simulated {:.1}s, {} events",
            self.end_time.as_secs_f64(),
            self.events_processed
        )?;
        writeln!(f)?;
        writeln!(f, "----- Routing Tree -----")?;
        for node in &self.nodes {
            let parent = node
                .parent
                .map_or_else(|| "-".to_string(), |p| p.to_string());
            writeln!(
                f,
                "{} {} parent {} metric {}",
                node.addr, node.role, parent, node.metric
            )?;
        }
        writeln!(
            f,
            "converged: {}, sink table: {} entries, matches tree: {}",
            self.converged(),
            self.sink_table.len(),
            self.reconstructed_tree_matches()
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "Radio: {} broadcasts, {} unicasts, {} delivered, {} lost, {} unreachable",
            self.radio.broadcasts,
            self.radio.unicasts,
            self.radio.frames_delivered,
            self.radio.frames_lost,
            self.radio.frames_unreachable
        )?;
        writeln!(f)?;
        write!(f, "{}", self.delivery)
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
