//! Collect connection
//!
//! Owns one node's [`RoutingState`] together with the three engines that act
//! on it, and is the single object a host talks to: it dispatches inbound
//! frames by channel, routes timer expiries to their engine, and counts what
//! happened in [`ConnectionStats`].

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, warn};

use treecollect_protocol::{Channels, NodeAddr};

use crate::beacon::{BeaconOutcome, TreeFormation};
use crate::config::CollectConfig;
use crate::env::{Environment, FrameHandler, Incoming, TimerKind};
use crate::error::{Result, RoutingError};
use crate::forward::{DataForwarding, DataOutcome};
use crate::report::{ReportOutcome, TopologyReports};
use crate::routing_table::RoutingTable;
use crate::state::{Role, RoutingState};

/// Connection statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    pub beacons_sent: u64,
    pub beacons_received: u64,
    pub beacons_accepted: u64,
    pub reports_sent: u64,
    pub reports_relayed: u64,
    pub reports_recorded: u64,
    pub data_originated: u64,
    pub data_forwarded: u64,
    pub data_delivered: u64,
    pub malformed_dropped: u64,
    pub no_route_dropped: u64,
    pub table_full_dropped: u64,
    pub stale_dropped: u64,
    pub hop_limit_dropped: u64,
    pub unexpected_channel_dropped: u64,
    pub transport_errors: u64,
}

/// One node's endpoint of the collection protocol
#[derive(Debug)]
pub struct CollectConnection {
    state: RoutingState,
    channels: Channels,
    tree: TreeFormation,
    /// Absent when topology reports are disabled
    reports: Option<TopologyReports>,
    forwarding: DataForwarding,
    rng: StdRng,
    stats: ConnectionStats,
}

impl CollectConnection {
    /// Open a connection for the node at `addr`
    ///
    /// A sink starts beaconing right away. A failed first beacon is only
    /// logged; the periodic timer is already armed and retries.
    pub fn open<E: Environment>(
        env: &mut E,
        addr: NodeAddr,
        role: Role,
        config: &CollectConfig,
    ) -> Result<Self> {
        config.validate()?;
        if addr.is_null() {
            return Err(RoutingError::InvalidConfig(
                "node address must not be null".to_string(),
            ));
        }

        let state = RoutingState::new(addr, role);
        let reports = config
            .topology_reports
            .then(|| TopologyReports::new(config, &state));

        // Mix the address in so nodes sharing a seed still draw distinct jitter
        let rng = match config.seed {
            Some(seed) => {
                StdRng::seed_from_u64(seed ^ u64::from(u16::from_be_bytes(*addr.as_bytes())))
            }
            None => StdRng::from_entropy(),
        };

        let mut connection = CollectConnection {
            state,
            channels: Channels::from_base(config.base_channel),
            tree: TreeFormation::new(config),
            reports,
            forwarding: DataForwarding::new(config),
            rng,
            stats: ConnectionStats::default(),
        };

        debug!("opened {} connection for {}", role, addr);

        let sink = connection.state.is_sink();
        match connection.tree.initialize(&connection.state, env) {
            Ok(()) if sink => connection.stats.beacons_sent += 1,
            Ok(()) => {}
            Err(e) => {
                connection.record_drop(e, "initial beacon", addr);
            }
        }

        Ok(connection)
    }

    /// Originate `payload` towards the sink
    ///
    /// Returns [`RoutingError::NoRoute`] immediately, without transmitting,
    /// while the node is not part of the tree.
    pub fn send<E: Environment>(&mut self, env: &mut E, payload: &[u8]) -> Result<()> {
        match self.forwarding.send(&self.state, env, payload) {
            Ok(()) => {
                self.stats.data_originated += 1;
                if self.state.is_sink() {
                    self.stats.data_delivered += 1;
                }
                Ok(())
            }
            Err(e) => Err(self.record_drop(e, "outgoing data", self.state.addr())),
        }
    }

    pub fn state(&self) -> &RoutingState {
        &self.state
    }

    pub fn addr(&self) -> NodeAddr {
        self.state.addr()
    }

    pub fn role(&self) -> Role {
        self.state.role()
    }

    pub fn parent(&self) -> Option<NodeAddr> {
        self.state.parent()
    }

    pub fn metric(&self) -> u16 {
        self.state.metric()
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// The sink's view of the tree; `None` on routers or with reports disabled
    pub fn routing_table(&self) -> Option<&RoutingTable> {
        self.reports.as_ref().and_then(|r| r.routing_table())
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn clear_stats(&mut self) {
        self.stats = ConnectionStats::default();
    }

    /// Report a parent change right away. Failures are counted and left to
    /// the periodic report.
    fn report_parent_change<E: Environment>(&mut self, env: &mut E) {
        let Some(reports) = self.reports.as_mut() else {
            return;
        };

        match reports.on_parent_changed(&mut self.state, env) {
            Ok(Some(_)) => self.stats.reports_sent += 1,
            Ok(None) => {}
            Err(e) => {
                let addr = self.state.addr();
                self.record_drop(e, "triggered report", addr);
            }
        }
    }

    /// Count a dropped frame or failed send and log it
    fn record_drop(&mut self, err: RoutingError, what: &str, peer: NodeAddr) -> RoutingError {
        match &err {
            RoutingError::Malformed(_) => self.stats.malformed_dropped += 1,
            RoutingError::NoRoute => self.stats.no_route_dropped += 1,
            RoutingError::RoutingTableFull { .. } => self.stats.table_full_dropped += 1,
            RoutingError::StaleBeacon { .. } => self.stats.stale_dropped += 1,
            RoutingError::HopLimitExceeded => self.stats.hop_limit_dropped += 1,
            RoutingError::UnexpectedChannel(_) => self.stats.unexpected_channel_dropped += 1,
            RoutingError::Transport(_) => self.stats.transport_errors += 1,
            RoutingError::InvalidConfig(_) => {}
        }

        warn!("dropping {} ({}): {}", what, peer, err);
        err
    }
}

impl FrameHandler for CollectConnection {
    fn on_broadcast<E: Environment>(&mut self, env: &mut E, incoming: Incoming<'_>) -> Result<()> {
        if incoming.channel != self.channels.beacon {
            return Err(self.record_drop(
                RoutingError::UnexpectedChannel(incoming.channel),
                "broadcast",
                incoming.sender,
            ));
        }

        self.stats.beacons_received += 1;
        let outcome = self.tree.on_advertisement(
            &mut self.state,
            env,
            &mut self.rng,
            incoming.sender,
            incoming.frame,
            incoming.link_quality,
        );

        match outcome {
            Ok(BeaconOutcome::Adopted { .. }) => {
                self.stats.beacons_accepted += 1;
                self.report_parent_change(env);
                Ok(())
            }
            Ok(BeaconOutcome::Refreshed { .. } | BeaconOutcome::Ignored(_)) => Ok(()),
            Err(e) => Err(self.record_drop(e, "beacon", incoming.sender)),
        }
    }

    fn on_unicast<E: Environment>(&mut self, env: &mut E, incoming: Incoming<'_>) -> Result<()> {
        let Incoming {
            channel,
            sender,
            frame,
            ..
        } = incoming;

        if channel == self.channels.data {
            return match self.forwarding.on_data(&self.state, env, sender, frame) {
                Ok(DataOutcome::Delivered { .. }) => {
                    self.stats.data_delivered += 1;
                    Ok(())
                }
                Ok(DataOutcome::Forwarded { .. }) => {
                    self.stats.data_forwarded += 1;
                    Ok(())
                }
                Err(e) => Err(self.record_drop(e, "data", sender)),
            };
        }

        if channel == self.channels.report {
            if let Some(reports) = self.reports.as_mut() {
                return match reports.on_report(&self.state, env, sender, frame) {
                    Ok(ReportOutcome::Recorded { .. }) => {
                        self.stats.reports_recorded += 1;
                        Ok(())
                    }
                    Ok(ReportOutcome::Relayed { .. }) => {
                        self.stats.reports_relayed += 1;
                        Ok(())
                    }
                    Err(e) => Err(self.record_drop(e, "report", sender)),
                };
            }
        }

        Err(self.record_drop(RoutingError::UnexpectedChannel(channel), "unicast", sender))
    }

    fn on_timer<E: Environment>(&mut self, env: &mut E, timer: TimerKind) -> Result<()> {
        let addr = self.state.addr();

        match timer {
            TimerKind::Beacon => match self.tree.on_timer(&mut self.state, env) {
                Ok(()) => {
                    self.stats.beacons_sent += 1;
                    Ok(())
                }
                Err(e) => Err(self.record_drop(e, "beacon", addr)),
            },
            TimerKind::Report => {
                let Some(reports) = self.reports.as_mut() else {
                    return Ok(());
                };

                match reports.on_timer(&mut self.state, env) {
                    Ok(Some(_)) => {
                        self.stats.reports_sent += 1;
                        Ok(())
                    }
                    Ok(None) => Ok(()),
                    Err(e) => Err(self.record_drop(e, "report", addr)),
                }
            }
        }
    }
}
