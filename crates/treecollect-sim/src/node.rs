//! Simulated node: a collect connection plus the effects it produced

use std::mem;
use std::time::Duration;

use treecollect_protocol::NodeAddr;
use treecollect_routing::{
    Application, CollectConfig, CollectConnection, Delivery, FrameHandler, Incoming, Result, Role,
    TimerKind, Timers, Transport,
};

use crate::event::FrameKind;

/// Everything a handler asked the outside world to do
///
/// The simulator drains this after every handler call and turns each entry
/// into scheduled events.
#[derive(Debug, Default)]
pub struct Outbox {
    pub broadcasts: Vec<(u16, Vec<u8>)>,
    pub unicasts: Vec<(u16, NodeAddr, Vec<u8>)>,
    pub timers: Vec<(TimerKind, Duration)>,
    pub deliveries: Vec<Delivery>,
}

impl Outbox {
    pub fn is_empty(&self) -> bool {
        self.broadcasts.is_empty()
            && self.unicasts.is_empty()
            && self.timers.is_empty()
            && self.deliveries.is_empty()
    }
}

impl Transport for Outbox {
    fn broadcast(&mut self, channel: u16, frame: &[u8]) -> Result<()> {
        self.broadcasts.push((channel, frame.to_vec()));
        Ok(())
    }

    fn unicast(&mut self, channel: u16, to: NodeAddr, frame: &[u8]) -> Result<()> {
        self.unicasts.push((channel, to, frame.to_vec()));
        Ok(())
    }
}

impl Timers for Outbox {
    fn set_timer(&mut self, timer: TimerKind, after: Duration) {
        self.timers.push((timer, after));
    }
}

impl Application for Outbox {
    fn deliver(&mut self, delivery: Delivery) {
        self.deliveries.push(delivery);
    }
}

/// One node of the simulated network
#[derive(Debug)]
pub struct SimNode {
    connection: CollectConnection,
    outbox: Outbox,
    /// Next application seqn
    app_seqn: u16,
}

impl SimNode {
    /// Open the node's connection; its first effects wait in the outbox
    pub fn new(addr: NodeAddr, role: Role, config: &CollectConfig) -> Result<Self> {
        let mut outbox = Outbox::default();
        let connection = CollectConnection::open(&mut outbox, addr, role, config)?;

        Ok(Self {
            connection,
            outbox,
            app_seqn: 0,
        })
    }

    pub fn addr(&self) -> NodeAddr {
        self.connection.addr()
    }

    pub fn connection(&self) -> &CollectConnection {
        &self.connection
    }

    pub fn is_sink(&self) -> bool {
        self.connection.role() == Role::Sink
    }

    pub fn handle_frame(
        &mut self,
        kind: FrameKind,
        channel: u16,
        sender: NodeAddr,
        frame: &[u8],
        rssi: i16,
    ) -> Result<()> {
        let incoming = Incoming {
            channel,
            sender,
            frame,
            link_quality: rssi,
        };

        match kind {
            FrameKind::Broadcast => self.connection.on_broadcast(&mut self.outbox, incoming),
            FrameKind::Unicast => self.connection.on_unicast(&mut self.outbox, incoming),
        }
    }

    pub fn handle_timer(&mut self, timer: TimerKind) -> Result<()> {
        self.connection.on_timer(&mut self.outbox, timer)
    }

    /// Originate one application reading of `size` bytes
    ///
    /// The payload starts with the big-endian application seqn. The seqn is
    /// consumed only when the connection accepts the payload.
    pub fn app_send(&mut self, size: usize) -> Result<u16> {
        let seqn = self.app_seqn;
        let mut payload = vec![0u8; size.max(2)];
        payload[..2].copy_from_slice(&seqn.to_be_bytes());

        self.connection.send(&mut self.outbox, &payload)?;
        self.app_seqn = self.app_seqn.wrapping_add(1);
        Ok(seqn)
    }

    /// Hand over every effect produced since the last call
    pub fn take_outbox(&mut self) -> Outbox {
        mem::take(&mut self.outbox)
    }
}

/// Application seqn carried at the front of a simulated payload
pub fn app_seqn(payload: &[u8]) -> Option<u16> {
    let bytes = payload.get(..2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}
