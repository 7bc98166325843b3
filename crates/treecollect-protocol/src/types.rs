//! Core protocol types

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Size of a node address in bytes (Rime link-address width)
pub const NODE_ADDR_SIZE: usize = 2;

/// Link-layer address of a node in the collection network
///
/// The all-zero address is reserved as [`NodeAddr::NULL`] and never names a
/// real node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeAddr([u8; NODE_ADDR_SIZE]);

impl NodeAddr {
    /// The reserved "no address" value
    pub const NULL: NodeAddr = NodeAddr([0; NODE_ADDR_SIZE]);

    /// Create a NodeAddr from a byte array
    pub const fn from_bytes(bytes: [u8; NODE_ADDR_SIZE]) -> Self {
        NodeAddr(bytes)
    }

    /// Address for simulated node `id`, laid out as `id:00` like Cooja motes
    pub const fn from_id(id: u8) -> Self {
        NodeAddr([id, 0])
    }

    /// Get the bytes of this NodeAddr
    pub fn as_bytes(&self) -> &[u8; NODE_ADDR_SIZE] {
        &self.0
    }

    /// Whether this is the reserved null address
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Convert to hex string without separators
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Read an address from the start of `bytes`
    pub(crate) fn read(bytes: &[u8]) -> Self {
        NodeAddr([bytes[0], bytes[1]])
    }
}

impl fmt::Debug for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddr({})", self)
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}", self.0[0], self.0[1])
    }
}

impl FromStr for NodeAddr {
    type Err = ProtocolError;

    /// Parse `aa:bb` or `aabb`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| *c != ':').collect();
        let bytes =
            hex::decode(&compact).map_err(|e| ProtocolError::InvalidAddress(e.to_string()))?;

        if bytes.len() != NODE_ADDR_SIZE {
            return Err(ProtocolError::InvalidAddress(format!(
                "expected {} bytes, got {} in {:?}",
                NODE_ADDR_SIZE,
                bytes.len(),
                s
            )));
        }

        Ok(NodeAddr::read(&bytes))
    }
}

impl Serialize for NodeAddr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeAddr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Transport channels used by one collect connection
///
/// Derived from a base channel by fixed offsets: beacons are broadcast on
/// `base`, data is unicast on `base + 1` and topology reports on `base + 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channels {
    pub beacon: u16,
    pub data: u16,
    pub report: u16,
}

impl Channels {
    /// Offset of the data channel from the base channel
    pub const DATA_OFFSET: u16 = 1;

    /// Offset of the report channel from the base channel
    pub const REPORT_OFFSET: u16 = 2;

    pub fn from_base(base: u16) -> Self {
        Channels {
            beacon: base,
            data: base.wrapping_add(Self::DATA_OFFSET),
            report: base.wrapping_add(Self::REPORT_OFFSET),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_address() {
        assert!(NodeAddr::NULL.is_null());
        assert!(!NodeAddr::from_id(1).is_null());
        assert_eq!(NodeAddr::default(), NodeAddr::NULL);
    }

    #[test]
    fn test_display_matches_rime_format() {
        let addr = NodeAddr::from_bytes([0x0a, 0x01]);
        assert_eq!(addr.to_string(), "0a:01");
        assert_eq!(addr.to_hex(), "0a01");
        assert_eq!(format!("{:?}", addr), "NodeAddr(0a:01)");
    }

    #[test]
    fn test_parse() {
        let addr: NodeAddr = "0a:01".parse().unwrap();
        assert_eq!(addr, NodeAddr::from_bytes([0x0a, 0x01]));

        let compact: NodeAddr = "0a01".parse().unwrap();
        assert_eq!(addr, compact);

        assert!("0a".parse::<NodeAddr>().is_err());
        assert!("zz:01".parse::<NodeAddr>().is_err());
        assert!("01:02:03".parse::<NodeAddr>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let addr = NodeAddr::from_id(7);
        let yaml = serde_yaml::to_string(&addr).unwrap();
        assert!(yaml.contains("07:00"));

        let back: NodeAddr = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, addr);

        let quoted: NodeAddr = serde_yaml::from_str("'07:00'").unwrap();
        assert_eq!(quoted, addr);
    }

    #[test]
    fn test_channels_from_base() {
        let channels = Channels::from_base(129);
        assert_eq!(channels.beacon, 129);
        assert_eq!(channels.data, 130);
        assert_eq!(channels.report, 131);
    }

    #[test]
    fn test_ordering_is_bytewise() {
        assert!(NodeAddr::from_bytes([1, 0]) < NodeAddr::from_bytes([2, 0]));
        assert!(NodeAddr::from_bytes([1, 0]) < NodeAddr::from_bytes([1, 1]));
    }
}
