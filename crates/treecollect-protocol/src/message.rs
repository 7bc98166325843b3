//! Wire messages exchanged by collect connections
//!
//! All integers are big-endian and every message is packed:
//! - Beacon (4 bytes): seqn (2) | metric (2)
//! - Report (6 bytes): seqn (2) | source (2) | parent (2)
//! - Data (3 + n bytes): source (2) | hops (1) | payload (n)

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::types::{NodeAddr, NODE_ADDR_SIZE};

/// Beacon size: 2 + 2 = 4 bytes
pub const BEACON_SIZE: usize = 4;

/// Report size: 2 + 2 + 2 = 6 bytes
pub const REPORT_SIZE: usize = 2 + 2 * NODE_ADDR_SIZE;

/// Data header size: 2 + 1 = 3 bytes
pub const DATA_HEADER_SIZE: usize = NODE_ADDR_SIZE + 1;

/// Largest frame the radio buffer holds (Rime PACKETBUF_SIZE)
pub const MAX_FRAME_SIZE: usize = 128;

/// Largest application payload that fits behind a data header
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - DATA_HEADER_SIZE;

/// Metric advertised by a node that has no route to the sink
pub const METRIC_UNREACHABLE: u16 = u16::MAX;

/// Tree advertisement broadcast by every connected node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    pub seqn: u16,
    pub metric: u16,
}

impl Beacon {
    pub fn new(seqn: u16, metric: u16) -> Self {
        Beacon { seqn, metric }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BEACON_SIZE);
        bytes.extend_from_slice(&self.seqn.to_be_bytes());
        bytes.extend_from_slice(&self.metric.to_be_bytes());
        bytes
    }

    /// Decode a beacon; the frame must be exactly [`BEACON_SIZE`] bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != BEACON_SIZE {
            return Err(ProtocolError::InvalidLength {
                kind: "beacon",
                expected: BEACON_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(Beacon {
            seqn: u16::from_be_bytes([bytes[0], bytes[1]]),
            metric: u16::from_be_bytes([bytes[2], bytes[3]]),
        })
    }

    /// Metric a receiver would adopt by choosing the sender as parent
    pub fn candidate_metric(&self) -> u16 {
        self.metric.saturating_add(1)
    }
}

/// Parent choice of `source`, relayed hop-by-hop to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub seqn: u16,
    pub source: NodeAddr,
    pub parent: NodeAddr,
}

impl Report {
    pub fn new(seqn: u16, source: NodeAddr, parent: NodeAddr) -> Self {
        Report {
            seqn,
            source,
            parent,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(REPORT_SIZE);
        bytes.extend_from_slice(&self.seqn.to_be_bytes());
        bytes.extend_from_slice(self.source.as_bytes());
        bytes.extend_from_slice(self.parent.as_bytes());
        bytes
    }

    /// Decode a report; the frame must be exactly [`REPORT_SIZE`] bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != REPORT_SIZE {
            return Err(ProtocolError::InvalidLength {
                kind: "report",
                expected: REPORT_SIZE,
                actual: bytes.len(),
            });
        }

        let mut offset = 0;

        let seqn = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        offset += 2;

        let source = NodeAddr::read(&bytes[offset..]);
        offset += NODE_ADDR_SIZE;

        let parent = NodeAddr::read(&bytes[offset..]);

        Ok(Report {
            seqn,
            source,
            parent,
        })
    }
}

/// Header prepended to every application payload on its way to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataHeader {
    /// Node that originated the payload
    pub source: NodeAddr,

    /// Links traversed so far
    pub hops: u8,
}

impl DataHeader {
    /// Header for a payload originated by `source`
    pub fn originate(source: NodeAddr) -> Self {
        DataHeader { source, hops: 0 }
    }

    pub fn to_bytes(&self) -> [u8; DATA_HEADER_SIZE] {
        let mut bytes = [0u8; DATA_HEADER_SIZE];
        bytes[..NODE_ADDR_SIZE].copy_from_slice(self.source.as_bytes());
        bytes[NODE_ADDR_SIZE] = self.hops;
        bytes
    }

    /// Prepend this header to `payload`
    pub fn encapsulate(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut frame = Vec::with_capacity(DATA_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&self.to_bytes());
        frame.extend_from_slice(payload);
        Ok(frame)
    }

    /// Split a data frame into its header and payload
    pub fn decapsulate(frame: &[u8]) -> Result<(Self, &[u8])> {
        if frame.len() < DATA_HEADER_SIZE {
            return Err(ProtocolError::TooShort {
                kind: "data frame",
                min: DATA_HEADER_SIZE,
                actual: frame.len(),
            });
        }

        let header = DataHeader {
            source: NodeAddr::read(frame),
            hops: frame[NODE_ADDR_SIZE],
        };

        Ok((header, &frame[DATA_HEADER_SIZE..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_sizes() {
        assert_eq!(BEACON_SIZE, 4);
        assert_eq!(REPORT_SIZE, 6);
        assert_eq!(DATA_HEADER_SIZE, 3);
        assert_eq!(MAX_PAYLOAD_SIZE, 125);
    }

    #[test]
    fn test_beacon_layout() {
        let beacon = Beacon::new(0x0102, 0x0304);
        assert_eq!(beacon.to_bytes(), vec![0x01, 0x02, 0x03, 0x04]);
        assert_eq!(Beacon::from_bytes(&[0x01, 0x02, 0x03, 0x04]).unwrap(), beacon);
    }

    #[test]
    fn test_beacon_wrong_size() {
        let err = Beacon::from_bytes(&[0u8; 5]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidLength {
                kind: "beacon",
                expected: 4,
                actual: 5
            }
        );
        assert!(Beacon::from_bytes(&[0u8; 3]).is_err());
        assert!(Beacon::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_candidate_metric_saturates() {
        assert_eq!(Beacon::new(0, 0).candidate_metric(), 1);
        assert_eq!(Beacon::new(0, 41).candidate_metric(), 42);
        assert_eq!(
            Beacon::new(0, METRIC_UNREACHABLE).candidate_metric(),
            METRIC_UNREACHABLE
        );
    }

    #[test]
    fn test_report_layout() {
        let report = Report::new(7, NodeAddr::from_bytes([3, 0]), NodeAddr::from_bytes([1, 0]));
        let bytes = report.to_bytes();
        assert_eq!(bytes, vec![0x00, 0x07, 3, 0, 1, 0]);
        assert_eq!(Report::from_bytes(&bytes).unwrap(), report);
        assert!(Report::from_bytes(&bytes[..5]).is_err());
    }

    #[test]
    fn test_data_encapsulation() {
        let header = DataHeader::originate(NodeAddr::from_id(4));
        let frame = header.encapsulate(b"temp=21").unwrap();
        assert_eq!(&frame[..3], &[4, 0, 0]);

        let (decoded, payload) = DataHeader::decapsulate(&frame).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(payload, b"temp=21");
    }

    #[test]
    fn test_data_header_only_frame() {
        let frame = DataHeader::originate(NodeAddr::from_id(2)).encapsulate(&[]).unwrap();
        let (_, payload) = DataHeader::decapsulate(&frame).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_data_frame_too_short() {
        let err = DataHeader::decapsulate(&[1, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::TooShort { min: 3, actual: 2, .. }));
    }

    #[test]
    fn test_payload_too_large() {
        let header = DataHeader::originate(NodeAddr::from_id(2));
        assert!(header.encapsulate(&[0u8; MAX_PAYLOAD_SIZE]).is_ok());
        assert!(matches!(
            header.encapsulate(&[0u8; MAX_PAYLOAD_SIZE + 1]),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }
}
