//! Events and their ordering in the simulation queue

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use treecollect_protocol::NodeAddr;
use treecollect_routing::TimerKind;

/// How a frame was put on the air
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Broadcast,
    Unicast,
}

/// Topology changes that can be scheduled during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioAction {
    DisableLink { a: NodeAddr, b: NodeAddr },
    EnableLink { a: NodeAddr, b: NodeAddr },
    SetRssi { a: NodeAddr, b: NodeAddr, rssi: i16 },
    SetLossRate { a: NodeAddr, b: NodeAddr, rate: f64 },
}

/// Something that happens at one instant of simulated time
#[derive(Debug, Clone)]
pub enum Event {
    /// A frame arrives at `to`
    Frame {
        to: NodeAddr,
        from: NodeAddr,
        kind: FrameKind,
        channel: u16,
        frame: Vec<u8>,
        rssi: i16,
    },
    /// A node timer expires; stale unless `generation` is still current
    Timer {
        node: NodeAddr,
        timer: TimerKind,
        generation: u64,
    },
    /// The application on `node` originates its next reading
    AppSend { node: NodeAddr },
    Action(ScenarioAction),
}

/// An event with its firing time and a tie-breaking sequence number
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    /// Virtual time in milliseconds
    pub time_ms: u64,
    pub seq: u64,
    pub event: Event,
}

impl ScheduledEvent {
    pub fn new(time_ms: u64, seq: u64, event: Event) -> Self {
        Self { time_ms, seq, event }
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time_ms == other.time_ms && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and the earliest event must pop first
        other
            .time_ms
            .cmp(&self.time_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn app(id: u8) -> Event {
        Event::AppSend {
            node: NodeAddr::from_id(id),
        }
    }

    #[test]
    fn test_earliest_pops_first() {
        let mut queue = BinaryHeap::new();
        queue.push(ScheduledEvent::new(10, 0, app(1)));
        queue.push(ScheduledEvent::new(5, 1, app(2)));
        queue.push(ScheduledEvent::new(7, 2, app(3)));

        let order: Vec<u64> = std::iter::from_fn(|| queue.pop().map(|e| e.time_ms)).collect();
        assert_eq!(order, vec![5, 7, 10]);
    }

    #[test]
    fn test_same_time_keeps_insertion_order() {
        let mut queue = BinaryHeap::new();
        queue.push(ScheduledEvent::new(10, 2, app(3)));
        queue.push(ScheduledEvent::new(10, 0, app(1)));
        queue.push(ScheduledEvent::new(10, 1, app(2)));

        let order: Vec<u64> = std::iter::from_fn(|| queue.pop().map(|e| e.seq)).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_action_yaml() {
        let action: ScenarioAction =
            serde_yaml::from_str("kind: set_rssi\na: '01:00'\nb: '02:00'\nrssi: -99\n").unwrap();
        assert_eq!(
            action,
            ScenarioAction::SetRssi {
                a: NodeAddr::from_id(1),
                b: NodeAddr::from_id(2),
                rssi: -99
            }
        );
    }
}
