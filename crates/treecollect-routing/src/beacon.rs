//! Tree formation by beacon flooding
//!
//! The sink advertises metric 0 every beacon interval. A router that hears a
//! beacon offering a strictly better metric over a good enough link adopts the
//! sender as parent and re-advertises after a short random delay, so the
//! improvement ripples outward one hop per jitter period.

use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};

use treecollect_protocol::{Beacon, Channels, NodeAddr, ProtocolError};

use crate::config::CollectConfig;
use crate::env::{Environment, TimerKind};
use crate::error::{Result, RoutingError};
use crate::state::RoutingState;

/// Why a well-formed beacon left the routing state untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// Sender offers no improvement (ties keep the current parent)
    NotBetter { candidate: u16, current: u16 },
    /// Link to the sender is too weak to be trusted
    WeakLink { link_quality: i16, threshold: i16 },
}

/// Effect of a received beacon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconOutcome {
    Adopted {
        parent: NodeAddr,
        metric: u16,
        previous_parent: Option<NodeAddr>,
    },
    /// Current parent re-advertised the same metric under a newer seqn
    Refreshed { seqn: u16 },
    Ignored(Ignored),
}

/// Tree-formation engine
#[derive(Debug, Clone)]
pub struct TreeFormation {
    channel: u16,
    interval: Duration,
    forward_delay: Duration,
    link_quality_threshold: i16,
    reject_stale: bool,
    /// Newest seqn heard over a usable link, tracked only when stale beacons
    /// are rejected
    last_seen_seqn: Option<u16>,
}

impl TreeFormation {
    pub fn new(config: &CollectConfig) -> Self {
        TreeFormation {
            channel: Channels::from_base(config.base_channel).beacon,
            interval: config.beacon_interval(),
            forward_delay: config.beacon_forward_delay(),
            link_quality_threshold: config.link_quality_threshold,
            reject_stale: config.reject_stale_beacons,
            last_seen_seqn: None,
        }
    }

    pub fn channel(&self) -> u16 {
        self.channel
    }

    /// Start beaconing on the sink; routers stay silent until they join
    pub fn initialize<E: Environment>(&mut self, state: &RoutingState, env: &mut E) -> Result<()> {
        if !state.is_sink() {
            return Ok(());
        }

        env.set_timer(TimerKind::Beacon, self.interval);
        // First beacon goes out now rather than one interval later
        self.emit_advertisement(state, env)
    }

    /// Broadcast the node's current seqn and metric
    pub fn emit_advertisement<E: Environment>(&self, state: &RoutingState, env: &mut E) -> Result<()> {
        let beacon = Beacon::new(state.beacon_seqn(), state.metric());
        debug!(
            "sending beacon: seqn {} metric {}",
            beacon.seqn, beacon.metric
        );
        env.broadcast(self.channel, &beacon.to_bytes())
    }

    /// Beacon timer expiry: advertise, then re-arm for the next period
    pub fn on_timer<E: Environment>(&mut self, state: &mut RoutingState, env: &mut E) -> Result<()> {
        if state.is_sink() {
            state.advance_beacon_seqn();
        }

        let sent = self.emit_advertisement(state, env);
        env.set_timer(TimerKind::Beacon, self.interval);
        sent
    }

    /// Process a beacon broadcast by `sender`
    pub fn on_advertisement<E: Environment, R: Rng + ?Sized>(
        &mut self,
        state: &mut RoutingState,
        env: &mut E,
        rng: &mut R,
        sender: NodeAddr,
        frame: &[u8],
        link_quality: i16,
    ) -> Result<BeaconOutcome> {
        let beacon = Beacon::from_bytes(frame)?;
        if sender.is_null() {
            return Err(ProtocolError::InvalidAddress("beacon from null address".to_string()).into());
        }

        debug!(
            "recv beacon from {} seqn {} metric {} rssi {}",
            sender, beacon.seqn, beacon.metric, link_quality
        );

        if link_quality <= self.link_quality_threshold {
            debug!(
                "ignoring beacon from {}: rssi {} <= {}",
                sender, link_quality, self.link_quality_threshold
            );
            return Ok(BeaconOutcome::Ignored(Ignored::WeakLink {
                link_quality,
                threshold: self.link_quality_threshold,
            }));
        }

        if self.reject_stale {
            self.check_fresh(beacon.seqn)?;
        }

        let candidate = beacon.candidate_metric();
        if candidate >= state.metric() {
            // Parent moved to a new epoch without a better metric
            if state.parent() == Some(sender)
                && candidate == state.metric()
                && serial_newer(beacon.seqn, state.beacon_seqn())
            {
                state.refresh_beacon_seqn(beacon.seqn);
                debug!("parent {} moved to beacon epoch {}", sender, beacon.seqn);
                return Ok(BeaconOutcome::Refreshed { seqn: beacon.seqn });
            }

            return Ok(BeaconOutcome::Ignored(Ignored::NotBetter {
                candidate,
                current: state.metric(),
            }));
        }

        let previous_parent = state.adopt(sender, candidate, beacon.seqn);
        info!(
            "new parent {} metric {} (was {:?})",
            sender, candidate, previous_parent
        );

        let delay = self.jitter(rng);
        env.set_timer(TimerKind::Beacon, delay);

        Ok(BeaconOutcome::Adopted {
            parent: sender,
            metric: candidate,
            previous_parent,
        })
    }

    /// Random delay in `[0, forward_delay)` before re-advertising
    fn jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let max_ms = self.forward_delay.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..max_ms))
    }

    /// Serial-number comparison (RFC 1982) against the newest seqn heard
    fn check_fresh(&mut self, seqn: u16) -> Result<()> {
        if let Some(last_seen) = self.last_seen_seqn {
            if serial_newer(last_seen, seqn) {
                return Err(RoutingError::StaleBeacon { seqn, last_seen });
            }
        }
        self.last_seen_seqn = Some(seqn);
        Ok(())
    }
}

/// `a` is ahead of `b` in serial-number order
fn serial_newer(a: u16, b: u16) -> bool {
    (a.wrapping_sub(b) as i16) > 0
}
