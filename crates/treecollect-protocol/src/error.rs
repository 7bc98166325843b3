//! Error types for protocol operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("{kind} of wrong size: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{kind} too short: need at least {min} bytes, got {actual}")]
    TooShort {
        kind: &'static str,
        min: usize,
        actual: usize,
    },

    #[error("Invalid node address: {0}")]
    InvalidAddress(String),

    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },
}
