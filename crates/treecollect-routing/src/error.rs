//! Routing error types

use thiserror::Error;

/// Routing-specific errors
///
/// None of these are fatal: each one describes a single dropped frame or a
/// refused send, and the periodic beacon/report cycle repairs whatever state
/// the loss left behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("No route to sink")]
    NoRoute,

    #[error("Malformed message: {0}")]
    Malformed(#[from] treecollect_protocol::ProtocolError),

    #[error("Routing table full (capacity {capacity})")]
    RoutingTableFull { capacity: usize },

    #[error("Hop limit exceeded")]
    HopLimitExceeded,

    #[error("Stale beacon: seqn {seqn} older than {last_seen}")]
    StaleBeacon { seqn: u16, last_seen: u16 },

    #[error("Unexpected channel: {0}")]
    UnexpectedChannel(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;
