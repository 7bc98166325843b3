//! TreeCollect routing
//!
//! Many-to-one collection over a multi-hop radio network:
//! - Tree formation from link-quality-gated beacons
//! - Topology reports merged into the sink's routing table
//! - Hop-counted data forwarding towards the sink
//!
//! A host drives each node through a [`CollectConnection`], handing it
//! inbound frames and timer expiries via [`FrameHandler`] and supplying
//! transport, timers and delivery through an [`Environment`].

pub mod beacon;
pub mod config;
pub mod connection;
pub mod env;
pub mod error;
pub mod forward;
pub mod report;
pub mod routing_table;
pub mod state;

#[cfg(test)]
mod test_support;

pub use beacon::{BeaconOutcome, Ignored, TreeFormation};
pub use config::CollectConfig;
pub use connection::{CollectConnection, ConnectionStats};
pub use env::{
    Application, Delivery, Environment, FrameHandler, Incoming, TimerKind, Timers, Transport,
};
pub use error::{Result, RoutingError};
pub use forward::{DataForwarding, DataOutcome};
pub use report::{ReportOutcome, TopologyReports};
pub use routing_table::{RouteEntry, RoutingTable, Upsert};
pub use state::{Role, RoutingState};
