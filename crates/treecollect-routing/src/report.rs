//! Topology reports
//!
//! Every router periodically tells the sink which parent it uses, and does so
//! immediately whenever it changes parent. Intermediate routers relay reports
//! untouched; only the sink opens them, merging each into its
//! [`RoutingTable`].

use std::time::Duration;
use tracing::{debug, info};

use treecollect_protocol::{Channels, NodeAddr, Report};

use crate::config::CollectConfig;
use crate::env::{Environment, TimerKind};
use crate::error::{Result, RoutingError};
use crate::routing_table::{RoutingTable, Upsert};
use crate::state::RoutingState;

/// Effect of a received report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Merged into the sink's table
    Recorded { report: Report, upsert: Upsert },
    /// Passed on towards the sink
    Relayed { to: NodeAddr },
}

/// Topology-report engine
#[derive(Debug, Clone)]
pub struct TopologyReports {
    channel: u16,
    interval: Duration,
    /// Present on the sink only
    table: Option<RoutingTable>,
    timer_armed: bool,
}

impl TopologyReports {
    pub fn new(config: &CollectConfig, state: &RoutingState) -> Self {
        let table = state
            .is_sink()
            .then(|| RoutingTable::new(config.routing_table_capacity));

        TopologyReports {
            channel: Channels::from_base(config.base_channel).report,
            interval: config.report_interval(),
            table,
            timer_armed: false,
        }
    }

    pub fn channel(&self) -> u16 {
        self.channel
    }

    pub fn routing_table(&self) -> Option<&RoutingTable> {
        self.table.as_ref()
    }

    /// Called after every accepted parent change: report now and make sure
    /// the periodic timer is running
    pub fn on_parent_changed<E: Environment>(
        &mut self,
        state: &mut RoutingState,
        env: &mut E,
    ) -> Result<Option<Report>> {
        if !self.timer_armed && !state.is_sink() {
            env.set_timer(TimerKind::Report, self.interval);
            self.timer_armed = true;
        }

        self.send_report(state, env)
    }

    /// Unicast `(seqn, self, parent)` to the parent
    ///
    /// Does nothing on a detached router or on the sink, whose parent is
    /// itself.
    pub fn send_report<E: Environment>(
        &self,
        state: &mut RoutingState,
        env: &mut E,
    ) -> Result<Option<Report>> {
        if state.is_sink() {
            return Ok(None);
        }

        let Some(parent) = state.parent() else {
            return Ok(None);
        };

        let report = Report::new(state.next_report_seqn(), state.addr(), parent);
        debug!(
            "sending report: seqn {} source {} parent {}",
            report.seqn, report.source, report.parent
        );
        env.unicast(self.channel, parent, &report.to_bytes())?;

        Ok(Some(report))
    }

    /// Report timer expiry: report, then re-arm for the next period
    pub fn on_timer<E: Environment>(
        &mut self,
        state: &mut RoutingState,
        env: &mut E,
    ) -> Result<Option<Report>> {
        let sent = self.send_report(state, env);
        env.set_timer(TimerKind::Report, self.interval);
        sent
    }

    /// Process a report unicast to this node
    pub fn on_report<E: Environment>(
        &mut self,
        state: &RoutingState,
        env: &mut E,
        from: NodeAddr,
        frame: &[u8],
    ) -> Result<ReportOutcome> {
        let report = Report::from_bytes(frame)?;
        debug!(
            "recv report from {}: seqn {} source {} parent {}",
            from, report.seqn, report.source, report.parent
        );

        if let Some(table) = self.table.as_mut() {
            let upsert = table.upsert(report.source, report.parent, report.seqn)?;

            if let Upsert::Updated { previous_parent } = upsert {
                if previous_parent != report.parent {
                    info!(
                        "topology: {} moved from {} to {}",
                        report.source, previous_parent, report.parent
                    );
                }
            } else {
                info!("topology: {} joined under {}", report.source, report.parent);
            }

            return Ok(ReportOutcome::Recorded { report, upsert });
        }

        let parent = state.parent().ok_or(RoutingError::NoRoute)?;
        env.unicast(self.channel, parent, frame)?;

        Ok(ReportOutcome::Relayed { to: parent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Role;
    use crate::test_support::RecordingEnv;

    fn addr(id: u8) -> NodeAddr {
        NodeAddr::from_id(id)
    }

    fn joined_router(id: u8, parent: u8, metric: u16) -> RoutingState {
        let mut state = RoutingState::new(addr(id), Role::Router);
        state.adopt(addr(parent), metric, 0);
        state
    }

    #[test]
    fn test_detached_router_sends_nothing() {
        let config = CollectConfig::default();
        let mut state = RoutingState::new(addr(3), Role::Router);
        let engine = TopologyReports::new(&config, &state);
        let mut env = RecordingEnv::new();

        assert_eq!(engine.send_report(&mut state, &mut env).unwrap(), None);
        assert_eq!(env.transmissions(), 0);
        assert_eq!(state.report_seqn(), 0);
    }

    #[test]
    fn test_sink_sends_nothing() {
        let config = CollectConfig::default();
        let mut state = RoutingState::new(addr(1), Role::Sink);
        let engine = TopologyReports::new(&config, &state);
        let mut env = RecordingEnv::new();

        assert_eq!(engine.send_report(&mut state, &mut env).unwrap(), None);
        assert_eq!(env.transmissions(), 0);
    }

    #[test]
    fn test_report_goes_to_parent() {
        let config = CollectConfig::default();
        let mut state = joined_router(3, 2, 2);
        let engine = TopologyReports::new(&config, &state);
        let mut env = RecordingEnv::new();

        let sent = engine.send_report(&mut state, &mut env).unwrap().unwrap();
        assert_eq!(sent, Report::new(0, addr(3), addr(2)));

        let (channel, to, frame) = &env.unicasts[0];
        assert_eq!(*channel, config.base_channel + 2);
        assert_eq!(*to, addr(2));
        assert_eq!(Report::from_bytes(frame).unwrap(), sent);

        let next = engine.send_report(&mut state, &mut env).unwrap().unwrap();
        assert_eq!(next.seqn, 1);
    }

    #[test]
    fn test_parent_change_arms_timer_once() {
        let config = CollectConfig::default();
        let mut state = joined_router(3, 2, 2);
        let mut engine = TopologyReports::new(&config, &state);
        let mut env = RecordingEnv::new();

        engine.on_parent_changed(&mut state, &mut env).unwrap();
        engine.on_parent_changed(&mut state, &mut env).unwrap();

        let report_timers = env
            .timers
            .iter()
            .filter(|(k, _)| *k == TimerKind::Report)
            .count();
        assert_eq!(report_timers, 1);
        assert_eq!(env.unicasts.len(), 2);
    }

    #[test]
    fn test_timer_rearms() {
        let config = CollectConfig::default();
        let mut state = joined_router(3, 2, 2);
        let mut engine = TopologyReports::new(&config, &state);
        let mut env = RecordingEnv::new();

        engine.on_timer(&mut state, &mut env).unwrap();
        assert_eq!(env.unicasts.len(), 1);
        assert_eq!(
            env.last_timer(TimerKind::Report),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_sink_records_report() {
        let config = CollectConfig::default();
        let state = RoutingState::new(addr(1), Role::Sink);
        let mut engine = TopologyReports::new(&config, &state);
        let mut env = RecordingEnv::new();

        let frame = Report::new(0, addr(2), addr(1)).to_bytes();
        let outcome = engine.on_report(&state, &mut env, addr(2), &frame).unwrap();

        assert!(matches!(
            outcome,
            ReportOutcome::Recorded {
                upsert: Upsert::Inserted,
                ..
            }
        ));
        let table = engine.routing_table().unwrap();
        assert_eq!(table.parent_of(&addr(2)), Some(addr(1)));
        assert_eq!(env.transmissions(), 0);
    }

    #[test]
    fn test_sink_overwrites_known_source() {
        let config = CollectConfig::default();
        let state = RoutingState::new(addr(1), Role::Sink);
        let mut engine = TopologyReports::new(&config, &state);
        let mut env = RecordingEnv::new();

        let first = Report::new(0, addr(5), addr(3)).to_bytes();
        let second = Report::new(1, addr(5), addr(2)).to_bytes();
        engine.on_report(&state, &mut env, addr(3), &first).unwrap();
        let outcome = engine.on_report(&state, &mut env, addr(2), &second).unwrap();

        assert!(matches!(
            outcome,
            ReportOutcome::Recorded {
                upsert: Upsert::Updated { previous_parent },
                ..
            } if previous_parent == addr(3)
        ));
        let table = engine.routing_table().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.parent_of(&addr(5)), Some(addr(2)));
    }

    #[test]
    fn test_sink_table_full() {
        let config = CollectConfig {
            routing_table_capacity: 1,
            ..Default::default()
        };
        let state = RoutingState::new(addr(1), Role::Sink);
        let mut engine = TopologyReports::new(&config, &state);
        let mut env = RecordingEnv::new();

        let first = Report::new(0, addr(2), addr(1)).to_bytes();
        let second = Report::new(0, addr(3), addr(1)).to_bytes();
        engine.on_report(&state, &mut env, addr(2), &first).unwrap();
        let err = engine.on_report(&state, &mut env, addr(3), &second).unwrap_err();

        assert_eq!(err, RoutingError::RoutingTableFull { capacity: 1 });
        assert_eq!(engine.routing_table().unwrap().len(), 1);
    }

    #[test]
    fn test_router_relays_unmodified() {
        let config = CollectConfig::default();
        let state = joined_router(2, 1, 1);
        let mut engine = TopologyReports::new(&config, &state);
        let mut env = RecordingEnv::new();

        let frame = Report::new(42, addr(7), addr(3)).to_bytes();
        let outcome = engine.on_report(&state, &mut env, addr(3), &frame).unwrap();

        assert_eq!(outcome, ReportOutcome::Relayed { to: addr(1) });
        assert_eq!(env.unicasts, vec![(config.base_channel + 2, addr(1), frame)]);
        assert!(engine.routing_table().is_none());
    }

    #[test]
    fn test_detached_router_cannot_relay() {
        let config = CollectConfig::default();
        let state = RoutingState::new(addr(2), Role::Router);
        let mut engine = TopologyReports::new(&config, &state);
        let mut env = RecordingEnv::new();

        let frame = Report::new(0, addr(7), addr(3)).to_bytes();
        let err = engine.on_report(&state, &mut env, addr(3), &frame).unwrap_err();
        assert_eq!(err, RoutingError::NoRoute);
        assert_eq!(env.transmissions(), 0);
    }

    #[test]
    fn test_malformed_report_is_dropped() {
        let config = CollectConfig::default();
        let state = RoutingState::new(addr(1), Role::Sink);
        let mut engine = TopologyReports::new(&config, &state);
        let mut env = RecordingEnv::new();

        let err = engine
            .on_report(&state, &mut env, addr(2), &[0, 1, 2, 0])
            .unwrap_err();
        assert!(matches!(err, RoutingError::Malformed(_)));
        assert!(engine.routing_table().unwrap().is_empty());
    }
}
