//! Simulator error types

use thiserror::Error;

use treecollect_protocol::NodeAddr;
use treecollect_routing::RoutingError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeAddr),

    #[error("Node {0} already exists")]
    DuplicateNode(NodeAddr),

    #[error("Network already has sink {existing}, cannot add {new}")]
    MultipleSinks { existing: NodeAddr, new: NodeAddr },

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}

pub type Result<T> = std::result::Result<T, SimError>;
