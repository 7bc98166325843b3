//! TreeCollect Protocol Module
//!
//! Node addresses, transport channel layout and the packed wire messages
//! (beacons, topology reports and data headers) of the tree collection
//! protocol.

pub mod error;
pub mod message;
pub mod types;

pub use error::{ProtocolError, Result};
pub use message::{Beacon, DataHeader, Report, METRIC_UNREACHABLE};
pub use types::{Channels, NodeAddr};
