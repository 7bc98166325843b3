//! Collaborator interfaces
//!
//! The protocol core never touches a radio or a clock itself. The host
//! supplies an [`Environment`] (transport, timers, application sink) on every
//! call, and delivers inbound frames and timer expiries through
//! [`FrameHandler`].

use std::time::Duration;

use treecollect_protocol::NodeAddr;

use crate::error::Result;

/// Timers owned by a collect connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Periodic beacon, also armed with jitter after a parent change
    Beacon,
    /// Periodic topology report
    Report,
}

/// Payload handed to the application on the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Node that originated the payload
    pub source: NodeAddr,
    /// Links the payload crossed
    pub hops: u8,
    pub payload: Vec<u8>,
}

/// A frame as handed over by the transport
#[derive(Debug, Clone, Copy)]
pub struct Incoming<'a> {
    pub channel: u16,
    /// Link-layer sender (the previous hop, not the originator)
    pub sender: NodeAddr,
    pub frame: &'a [u8],
    /// Received signal strength in dBm
    pub link_quality: i16,
}

/// Broadcast/unicast primitive
pub trait Transport {
    /// Send `frame` on `channel` to every neighbour in range
    fn broadcast(&mut self, channel: u16, frame: &[u8]) -> Result<()>;

    /// Send `frame` on `channel` to a single neighbour
    fn unicast(&mut self, channel: u16, to: NodeAddr, frame: &[u8]) -> Result<()>;
}

/// One-shot timer service
pub trait Timers {
    /// Fire [`FrameHandler::on_timer`] with `timer` once after `after`.
    ///
    /// Arming a timer that is still pending replaces it.
    fn set_timer(&mut self, timer: TimerKind, after: Duration);
}

/// Consumer of payloads collected at the sink
pub trait Application {
    fn deliver(&mut self, delivery: Delivery);
}

/// Everything a handler needs from its host
pub trait Environment: Transport + Timers + Application {}

impl<T: Transport + Timers + Application> Environment for T {}

/// Entry points the host invokes when an event arrives
///
/// Each call runs to completion before the next event is dispatched.
pub trait FrameHandler {
    fn on_broadcast<E: Environment>(&mut self, env: &mut E, incoming: Incoming<'_>) -> Result<()>;

    fn on_unicast<E: Environment>(&mut self, env: &mut E, incoming: Incoming<'_>) -> Result<()>;

    fn on_timer<E: Environment>(&mut self, env: &mut E, timer: TimerKind) -> Result<()>;
}
