//! Per-node routing state shared by the three engines

use serde::{Deserialize, Serialize};
use std::fmt;

use treecollect_protocol::{NodeAddr, METRIC_UNREACHABLE};

/// Role of a node, fixed when the connection is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Root of the collection tree
    Sink,
    /// Any other node
    Router,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sink => write!(f, "sink"),
            Role::Router => write!(f, "router"),
        }
    }
}

/// Parent, metric and sequence counters of one node
///
/// A sink is its own parent at metric 0 for its whole life. A router starts
/// detached at [`METRIC_UNREACHABLE`] and only ever moves to a strictly lower
/// metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingState {
    addr: NodeAddr,
    role: Role,
    parent: Option<NodeAddr>,
    metric: u16,
    beacon_seqn: u16,
    report_seqn: u16,
}

impl RoutingState {
    pub fn new(addr: NodeAddr, role: Role) -> Self {
        let (parent, metric) = match role {
            Role::Sink => (Some(addr), 0),
            Role::Router => (None, METRIC_UNREACHABLE),
        };

        RoutingState {
            addr,
            role,
            parent,
            metric,
            beacon_seqn: 0,
            report_seqn: 0,
        }
    }

    pub fn addr(&self) -> NodeAddr {
        self.addr
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_sink(&self) -> bool {
        self.role == Role::Sink
    }

    pub fn parent(&self) -> Option<NodeAddr> {
        self.parent
    }

    pub fn metric(&self) -> u16 {
        self.metric
    }

    pub fn beacon_seqn(&self) -> u16 {
        self.beacon_seqn
    }

    pub fn report_seqn(&self) -> u16 {
        self.report_seqn
    }

    /// Whether the node has a path to the sink
    pub fn is_connected(&self) -> bool {
        self.parent.is_some()
    }

    /// Switch to `parent` at `metric`, re-advertising beacon epoch `seqn`
    pub(crate) fn adopt(&mut self, parent: NodeAddr, metric: u16, seqn: u16) -> Option<NodeAddr> {
        debug_assert!(!self.is_sink(), "the sink never changes parent");
        debug_assert!(metric < self.metric, "metric must strictly improve");

        self.metric = metric;
        self.beacon_seqn = seqn;
        self.parent.replace(parent)
    }

    /// Follow the parent into a newer beacon epoch
    pub(crate) fn refresh_beacon_seqn(&mut self, seqn: u16) {
        debug_assert!(!self.is_sink(), "the sink owns its epoch");
        self.beacon_seqn = seqn;
    }

    /// Start a new beacon epoch (sink only)
    pub(crate) fn advance_beacon_seqn(&mut self) {
        self.beacon_seqn = self.beacon_seqn.wrapping_add(1);
    }

    /// Take the seqn for the next originated report
    pub(crate) fn next_report_seqn(&mut self) -> u16 {
        let seqn = self.report_seqn;
        self.report_seqn = self.report_seqn.wrapping_add(1);
        seqn
    }
}
