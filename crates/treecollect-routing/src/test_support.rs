//! Recording environment for engine tests

use std::time::Duration;

use treecollect_protocol::NodeAddr;

use crate::env::{Application, Delivery, TimerKind, Timers, Transport};
use crate::error::{Result, RoutingError};

#[derive(Debug, Default)]
pub struct RecordingEnv {
    pub broadcasts: Vec<(u16, Vec<u8>)>,
    pub unicasts: Vec<(u16, NodeAddr, Vec<u8>)>,
    pub timers: Vec<(TimerKind, Duration)>,
    pub deliveries: Vec<Delivery>,
    /// Make every transmission fail
    pub fail_transport: bool,
}

impl RecordingEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transmissions(&self) -> usize {
        self.broadcasts.len() + self.unicasts.len()
    }

    pub fn last_timer(&self, kind: TimerKind) -> Option<Duration> {
        self.timers
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, d)| *d)
    }

    pub fn clear(&mut self) {
        self.broadcasts.clear();
        self.unicasts.clear();
        self.timers.clear();
        self.deliveries.clear();
    }
}

impl Transport for RecordingEnv {
    fn broadcast(&mut self, channel: u16, frame: &[u8]) -> Result<()> {
        if self.fail_transport {
            return Err(RoutingError::Transport("radio off".to_string()));
        }
        self.broadcasts.push((channel, frame.to_vec()));
        Ok(())
    }

    fn unicast(&mut self, channel: u16, to: NodeAddr, frame: &[u8]) -> Result<()> {
        if self.fail_transport {
            return Err(RoutingError::Transport("radio off".to_string()));
        }
        self.unicasts.push((channel, to, frame.to_vec()));
        Ok(())
    }
}

impl Timers for RecordingEnv {
    fn set_timer(&mut self, timer: TimerKind, after: Duration) {
        self.timers.push((timer, after));
    }
}

impl Application for RecordingEnv {
    fn deliver(&mut self, delivery: Delivery) {
        self.deliveries.push(delivery);
    }
}
