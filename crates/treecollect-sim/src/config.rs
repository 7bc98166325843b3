use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use treecollect_protocol::message::MAX_PAYLOAD_SIZE;
use treecollect_protocol::NodeAddr;
use treecollect_routing::CollectConfig;

use crate::event::ScenarioAction;
use crate::topology::{Link, TopologyKind};

/// Largest network the simulator will build
pub const MAX_NODES: usize = 1024;

/// Smallest payload able to carry the application seqn
pub const MIN_PAYLOAD_SIZE: usize = 2;

/// A complete simulation scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Number of nodes, addressed `01:00`, `02:00`, ...
    pub nodes: usize,
    /// Address of the sink; must be one of the nodes
    pub sink: NodeAddr,
    pub topology: TopologyKind,
    /// Row length for grid topologies
    pub grid_width: Option<usize>,
    /// Properties given to every generated link
    pub link: Link,
    /// Links added or replaced after generation
    pub links: Vec<LinkOverride>,
    pub duration_secs: u64,
    /// Seed for link loss, traffic offsets and (unless set) node jitter
    pub seed: u64,
    pub traffic: TrafficConfig,
    pub events: Vec<TimedAction>,
    /// Protocol configuration shared by every node
    pub collect: CollectConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            nodes: 8,
            sink: NodeAddr::from_id(1),
            topology: TopologyKind::Chain,
            grid_width: None,
            link: Link::default(),
            links: Vec::new(),
            duration_secs: 600,
            seed: 1,
            traffic: TrafficConfig::default(),
            events: Vec::new(),
            collect: CollectConfig::default(),
        }
    }
}

/// Periodic application traffic from every router to the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Time before the first reading, giving the tree a chance to form
    pub start_secs: u64,
    pub payload_size: usize,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            start_secs: 30,
            payload_size: 8,
        }
    }
}

impl TrafficConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn start(&self) -> Duration {
        Duration::from_secs(self.start_secs)
    }
}

/// Explicit link between two nodes, replacing any generated one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkOverride {
    pub a: NodeAddr,
    pub b: NodeAddr,
    #[serde(flatten)]
    pub link: Link,
}

/// A scenario action and when it happens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedAction {
    pub at_secs: u64,
    pub action: ScenarioAction,
}

impl ScenarioConfig {
    /// Load a scenario from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;

        let config: ScenarioConfig =
            serde_yaml::from_str(&contents).context("Failed to parse scenario file")?;

        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize scenario")
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Addresses of every node, sink included
    pub fn node_addrs(&self) -> Vec<NodeAddr> {
        (1..=self.nodes).map(node_addr).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.nodes < 2 || self.nodes > MAX_NODES {
            anyhow::bail!("nodes must be between 2 and {}, got {}", MAX_NODES, self.nodes);
        }

        let addrs = self.node_addrs();
        if !addrs.contains(&self.sink) {
            anyhow::bail!("sink {} is not one of the {} nodes", self.sink, self.nodes);
        }

        for link in &self.links {
            if !addrs.contains(&link.a) || !addrs.contains(&link.b) {
                anyhow::bail!("link {} - {} names an unknown node", link.a, link.b);
            }
        }

        if self.traffic.enabled {
            if self.traffic.interval_secs == 0 {
                anyhow::bail!("traffic.interval_secs must be positive");
            }
            if self.traffic.payload_size < MIN_PAYLOAD_SIZE {
                anyhow::bail!(
                    "traffic.payload_size must be at least {} bytes",
                    MIN_PAYLOAD_SIZE
                );
            }
            if self.traffic.payload_size > MAX_PAYLOAD_SIZE {
                anyhow::bail!(
                    "traffic.payload_size must be at most {} bytes",
                    MAX_PAYLOAD_SIZE
                );
            }
        }

        self.collect
            .validate()
            .context("Invalid collect configuration")?;

        Ok(())
    }
}

/// Address of the `index`-th node (1-based), low byte first like Rime's `1.0`
pub fn node_addr(index: usize) -> NodeAddr {
    let [lo, hi, ..] = (index as u64).to_le_bytes();
    NodeAddr::from_bytes([lo, hi])
}
