//! TreeCollect network simulator
//!
//! Runs many collect connections in one process over a simulated radio:
//! - Discrete events in `(time, seq)` order, no real-time delays
//! - Chain, star, grid or fully connected topologies
//! - Per-link RSSI, loss rate and delay, changeable mid-run
//! - Periodic application traffic with per-node PDR/PLR statistics
//!
//! ```
//! use std::time::Duration;
//! use treecollect_sim::{ScenarioConfig, Simulator};
//!
//! let scenario = ScenarioConfig::default();
//! let mut sim = Simulator::from_scenario(&scenario).unwrap();
//! let result = sim.run_until(Duration::from_secs(120));
//!
//! assert!(result.converged());
//! assert!(result.reconstructed_tree_matches());
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod node;
pub mod realtime;
pub mod sim;
pub mod topology;

pub use config::{LinkOverride, ScenarioConfig, TimedAction, TrafficConfig};
pub use error::{Result, SimError};
pub use event::{Event, FrameKind, ScenarioAction, ScheduledEvent};
pub use metrics::{DeliveryStats, NodeSnapshot, RadioStats, SimulationResult, SourceStats};
pub use node::{Outbox, SimNode};
pub use realtime::RealtimeRunner;
pub use sim::Simulator;
pub use topology::{Link, Topology, TopologyKind};
