//! Wall-clock pacing of a simulation
//!
//! Handlers still run one at a time on the caller's task; the runner only
//! sleeps until each event is due.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::metrics::SimulationResult;
use crate::sim::Simulator;

/// Replays a [`Simulator`] against wall-clock time
pub struct RealtimeRunner {
    sim: Simulator,
    /// Virtual seconds per wall-clock second
    speed: f64,
}

impl RealtimeRunner {
    /// A `speed` of 2.0 runs twice as fast as real time; non-positive values
    /// fall back to 1.0
    pub fn new(sim: Simulator, speed: f64) -> Self {
        let speed = if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            1.0
        };
        Self { sim, speed }
    }

    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    pub fn into_inner(self) -> Simulator {
        self.sim
    }

    pub async fn run_until(&mut self, end: Duration) -> SimulationResult {
        let started = Instant::now();
        let origin = self.sim.now();
        debug!("real-time run from {:?} to {:?} at {}x", origin, end, self.speed);

        while let Some(next) = self.sim.next_event_time() {
            if next > end {
                break;
            }
            sleep_until(started + self.wall_offset(origin, next)).await;
            self.sim.step();
        }

        sleep_until(started + self.wall_offset(origin, end)).await;
        self.sim.run_until(end)
    }

    pub async fn run_for(&mut self, duration: Duration) -> SimulationResult {
        let end = self.sim.now() + duration;
        self.run_until(end).await
    }

    fn wall_offset(&self, origin: Duration, at: Duration) -> Duration {
        at.saturating_sub(origin).div_f64(self.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Link, Topology};
    use treecollect_protocol::NodeAddr;
    use treecollect_routing::{CollectConfig, Role};

    fn pair() -> Simulator {
        let nodes = [NodeAddr::from_id(1), NodeAddr::from_id(2)];
        let config = CollectConfig {
            seed: Some(3),
            ..Default::default()
        };
        let mut sim = Simulator::new(3).with_topology(Topology::chain(&nodes, &Link::default()));
        sim.add_node(nodes[0], Role::Sink, &config).unwrap();
        sim.add_node(nodes[1], Role::Router, &config).unwrap();
        sim
    }

    #[tokio::test(start_paused = true)]
    async fn test_paces_against_clock() {
        let mut runner = RealtimeRunner::new(pair(), 1.0);
        let started = Instant::now();

        let result = runner.run_for(Duration::from_secs(5)).await;

        assert!(result.converged());
        assert_eq!(result.end_time, Duration::from_secs(5));
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_speedup() {
        let mut runner = RealtimeRunner::new(pair(), 10.0);
        let started = Instant::now();

        runner.run_for(Duration::from_secs(10)).await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(runner.simulator().now(), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_speed_falls_back() {
        let runner = RealtimeRunner::new(pair(), 0.0);
        assert_eq!(runner.speed, 1.0);
    }
}
