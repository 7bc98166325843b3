//! Hop-by-hop data forwarding towards the sink

use tracing::{debug, info};

use treecollect_protocol::{Channels, DataHeader, NodeAddr};

use crate::config::CollectConfig;
use crate::env::{Delivery, Environment};
use crate::error::{Result, RoutingError};
use crate::state::RoutingState;

/// Effect of a received data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOutcome {
    /// Handed to the application on the sink
    Delivered { source: NodeAddr, hops: u8 },
    /// Passed on to this node's parent
    Forwarded {
        source: NodeAddr,
        hops: u8,
        to: NodeAddr,
    },
}

/// Data-forwarding engine
#[derive(Debug, Clone)]
pub struct DataForwarding {
    channel: u16,
}

impl DataForwarding {
    pub fn new(config: &CollectConfig) -> Self {
        DataForwarding {
            channel: Channels::from_base(config.base_channel).data,
        }
    }

    pub fn channel(&self) -> u16 {
        self.channel
    }

    /// Originate `payload` towards the sink
    ///
    /// Fails with [`RoutingError::NoRoute`] without transmitting anything
    /// while the node has no parent. On the sink the payload is delivered
    /// locally with zero hops.
    pub fn send<E: Environment>(&self, state: &RoutingState, env: &mut E, payload: &[u8]) -> Result<()> {
        let parent = state.parent().ok_or(RoutingError::NoRoute)?;
        let header = DataHeader::originate(state.addr());

        if state.is_sink() {
            env.deliver(Delivery {
                source: header.source,
                hops: header.hops,
                payload: payload.to_vec(),
            });
            return Ok(());
        }

        let frame = header.encapsulate(payload)?;
        debug!("sending data to {} ({} bytes)", parent, payload.len());
        env.unicast(self.channel, parent, &frame)
    }

    /// Process a data frame unicast to this node by `from`
    pub fn on_data<E: Environment>(
        &self,
        state: &RoutingState,
        env: &mut E,
        from: NodeAddr,
        frame: &[u8],
    ) -> Result<DataOutcome> {
        let (mut header, payload) = DataHeader::decapsulate(frame)?;
        header.hops = header
            .hops
            .checked_add(1)
            .ok_or(RoutingError::HopLimitExceeded)?;

        debug!(
            "recv data from {}: source {} hops {}",
            from, header.source, header.hops
        );

        if state.is_sink() {
            info!("delivering from {} hops {}", header.source, header.hops);
            env.deliver(Delivery {
                source: header.source,
                hops: header.hops,
                payload: payload.to_vec(),
            });
            return Ok(DataOutcome::Delivered {
                source: header.source,
                hops: header.hops,
            });
        }

        let parent = state.parent().ok_or(RoutingError::NoRoute)?;
        let forwarded = header.encapsulate(payload)?;
        env.unicast(self.channel, parent, &forwarded)?;

        Ok(DataOutcome::Forwarded {
            source: header.source,
            hops: header.hops,
            to: parent,
        })
    }
}
