use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, RoutingError};

/// Tunables of a collect connection
///
/// Every field has a default, so a config file only needs to name the values
/// it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// First transport channel; data and reports use the next two
    pub base_channel: u16,
    /// Period of the beacon timer
    pub beacon_interval_secs: u64,
    /// Upper bound (exclusive) of the jitter before a triggered re-broadcast
    pub beacon_forward_delay_ms: u64,
    /// Period of the topology report timer
    pub report_interval_secs: u64,
    /// Beacons heard at or below this RSSI (dBm) never change the parent
    pub link_quality_threshold: i16,
    /// Number of sources the sink can track
    pub routing_table_capacity: usize,
    /// Run the topology report engine (three channels instead of two)
    pub topology_reports: bool,
    /// Drop beacons whose seqn is older than the newest one heard
    pub reject_stale_beacons: bool,
    /// Seed for the jitter RNG; drawn from the OS when absent
    pub seed: Option<u64>,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            base_channel: 129,
            beacon_interval_secs: 60,
            beacon_forward_delay_ms: 1000,
            report_interval_secs: 120,
            link_quality_threshold: -95,
            routing_table_capacity: 64,
            topology_reports: true,
            reject_stale_beacons: false,
            seed: None,
        }
    }
}

impl CollectConfig {
    pub fn beacon_interval(&self) -> Duration {
        Duration::from_secs(self.beacon_interval_secs)
    }

    pub fn beacon_forward_delay(&self) -> Duration {
        Duration::from_millis(self.beacon_forward_delay_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    /// Reject values that would stall the periodic timers or the sink table
    pub fn validate(&self) -> Result<()> {
        if self.beacon_interval_secs == 0 {
            return Err(RoutingError::InvalidConfig(
                "beacon_interval_secs must be positive".to_string(),
            ));
        }

        if self.topology_reports && self.report_interval_secs == 0 {
            return Err(RoutingError::InvalidConfig(
                "report_interval_secs must be positive".to_string(),
            ));
        }

        if self.topology_reports && self.routing_table_capacity == 0 {
            return Err(RoutingError::InvalidConfig(
                "routing_table_capacity must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
