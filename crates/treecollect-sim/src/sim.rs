//! Discrete-event simulator for collect networks

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::time::Duration;
use tracing::{debug, info_span, trace};

use treecollect_protocol::NodeAddr;
use treecollect_routing::{CollectConfig, Role, RoutingError, TimerKind};

use crate::config::{ScenarioConfig, TrafficConfig};
use crate::error::{Result, SimError};
use crate::event::{Event, FrameKind, ScenarioAction, ScheduledEvent};
use crate::metrics::{DeliveryStats, NodeSnapshot, RadioStats, SimulationResult};
use crate::node::{app_seqn, Outbox, SimNode};
use crate::topology::Topology;

/// Deterministic simulator driving every node from one event queue
///
/// Handlers run one at a time in `(time, seq)` order; whatever a handler asks
/// for is turned into future events when it returns.
pub struct Simulator {
    nodes: BTreeMap<NodeAddr, SimNode>,
    sink: Option<NodeAddr>,
    topology: Topology,
    now_ms: u64,
    queue: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
    /// Current generation per node timer; older expiries are ignored
    timer_generations: HashMap<(NodeAddr, TimerKind), u64>,
    /// Link loss and traffic offsets
    rng: StdRng,
    traffic: Option<TrafficConfig>,
    radio: RadioStats,
    delivery: DeliveryStats,
    events_processed: u64,
}

impl Simulator {
    pub fn new(seed: u64) -> Self {
        Self {
            nodes: BTreeMap::new(),
            sink: None,
            topology: Topology::new(),
            now_ms: 0,
            queue: BinaryHeap::new(),
            next_seq: 0,
            timer_generations: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
            traffic: None,
            radio: RadioStats::default(),
            delivery: DeliveryStats::new(),
            events_processed: 0,
        }
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Build a simulator from a scenario: topology, nodes, traffic and actions
    pub fn from_scenario(scenario: &ScenarioConfig) -> Result<Self> {
        scenario
            .validate()
            .map_err(|e| SimError::InvalidScenario(format!("{:#}", e)))?;

        let addrs = scenario.node_addrs();
        let mut topology = Topology::generate(
            scenario.topology,
            &addrs,
            scenario.grid_width,
            &scenario.link,
        );
        for over in &scenario.links {
            topology.add_link(over.a, over.b, over.link.clone());
        }

        let mut collect = scenario.collect.clone();
        if collect.seed.is_none() {
            collect.seed = Some(scenario.seed);
        }

        let mut sim = Simulator::new(scenario.seed).with_topology(topology);

        // Sink first, so routers joining later still hear its initial beacon
        sim.add_node(scenario.sink, Role::Sink, &collect)?;
        for &addr in addrs.iter().filter(|&&a| a != scenario.sink) {
            sim.add_node(addr, Role::Router, &collect)?;
        }

        if scenario.traffic.enabled {
            sim.start_traffic(scenario.traffic.clone());
        }

        for timed in &scenario.events {
            sim.schedule_action(Duration::from_secs(timed.at_secs), timed.action.clone());
        }

        Ok(sim)
    }

    /// Add a node and open its connection at the current time
    pub fn add_node(&mut self, addr: NodeAddr, role: Role, config: &CollectConfig) -> Result<()> {
        if self.nodes.contains_key(&addr) {
            return Err(SimError::DuplicateNode(addr));
        }
        if role == Role::Sink {
            if let Some(sink) = self.sink {
                return Err(SimError::MultipleSinks { existing: sink, new: addr });
            }
            self.sink = Some(addr);
        }

        let node = SimNode::new(addr, role, config)?;
        self.nodes.insert(addr, node);
        self.flush(addr);

        Ok(())
    }

    pub fn node(&self, addr: &NodeAddr) -> Option<&SimNode> {
        self.nodes.get(addr)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SimNode> {
        self.nodes.values()
    }

    pub fn sink(&self) -> Option<NodeAddr> {
        self.sink
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    pub fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms)
    }

    pub fn delivery(&self) -> &DeliveryStats {
        &self.delivery
    }

    /// Time of the next pending event
    pub fn next_event_time(&self) -> Option<Duration> {
        self.queue.peek().map(|e| Duration::from_millis(e.time_ms))
    }

    pub fn schedule(&mut self, at: Duration, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue
            .push(ScheduledEvent::new(at.as_millis() as u64, seq, event));
    }

    pub fn schedule_action(&mut self, at: Duration, action: ScenarioAction) {
        self.schedule(at, Event::Action(action));
    }

    /// Make every router originate a reading each `traffic.interval`
    ///
    /// Routers start at `traffic.start` plus a random offset within one
    /// interval so their readings do not line up.
    pub fn start_traffic(&mut self, traffic: TrafficConfig) {
        let interval_ms = traffic.interval().as_millis() as u64;
        let start = traffic.start().max(self.now());
        let routers: Vec<NodeAddr> = self
            .nodes
            .values()
            .filter(|n| !n.is_sink())
            .map(SimNode::addr)
            .collect();

        for node in routers {
            self.delivery.expect_source(node);
            let offset = if interval_ms > 0 {
                self.rng.gen_range(0..interval_ms)
            } else {
                0
            };
            self.schedule(start + Duration::from_millis(offset), Event::AppSend { node });
        }

        self.traffic = Some(traffic);
    }

    /// Originate one reading from `node` right now
    pub fn send_from(&mut self, node: NodeAddr, payload_size: usize) -> Result<u16> {
        let sim_node = self
            .nodes
            .get_mut(&node)
            .ok_or(SimError::UnknownNode(node))?;

        let result = sim_node.app_send(payload_size);
        match result {
            Ok(seqn) => self.delivery.record_sent(node, seqn),
            Err(RoutingError::NoRoute) => self.delivery.record_no_route(node),
            Err(_) => {}
        }
        self.flush(node);

        result.map_err(SimError::from)
    }

    /// Process the next event, if any; returns its time
    pub fn step(&mut self) -> Option<Duration> {
        let scheduled = self.queue.pop()?;
        self.now_ms = self.now_ms.max(scheduled.time_ms);
        self.process_event(scheduled.event);
        self.events_processed += 1;
        Some(self.now())
    }

    /// Process every event up to and including `end`, then stop the clock there
    pub fn run_until(&mut self, end: Duration) -> SimulationResult {
        let end_ms = end.as_millis() as u64;
        while self.queue.peek().is_some_and(|e| e.time_ms <= end_ms) {
            self.step();
        }
        self.now_ms = self.now_ms.max(end_ms);

        self.result()
    }

    pub fn run_for(&mut self, duration: Duration) -> SimulationResult {
        self.run_until(self.now() + duration)
    }

    /// Snapshot of the network at the current time
    pub fn result(&self) -> SimulationResult {
        let nodes = self
            .nodes
            .values()
            .map(|n| {
                let c = n.connection();
                NodeSnapshot {
                    addr: c.addr(),
                    role: c.role(),
                    parent: c.parent(),
                    metric: c.metric(),
                    stats: c.stats().clone(),
                }
            })
            .collect();

        let sink_table = self
            .sink
            .and_then(|s| self.nodes.get(&s))
            .and_then(|n| n.connection().routing_table())
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default();

        SimulationResult {
            end_time: self.now(),
            events_processed: self.events_processed,
            sink: self.sink.unwrap_or(NodeAddr::NULL),
            nodes,
            sink_table,
            radio: self.radio.clone(),
            delivery: self.delivery.clone(),
        }
    }

    fn process_event(&mut self, event: Event) {
        match event {
            Event::Frame {
                to,
                from,
                kind,
                channel,
                frame,
                rssi,
            } => {
                let Some(node) = self.nodes.get_mut(&to) else {
                    return;
                };
                let _span = info_span!("node", addr = %to).entered();
                if let Err(e) = node.handle_frame(kind, channel, from, &frame, rssi) {
                    trace!("frame from {} not handled: {}", from, e);
                }
                self.flush(to);
            }
            Event::Timer {
                node,
                timer,
                generation,
            } => {
                if self.timer_generations.get(&(node, timer)) != Some(&generation) {
                    return;
                }
                let Some(sim_node) = self.nodes.get_mut(&node) else {
                    return;
                };
                let _span = info_span!("node", addr = %node).entered();
                if let Err(e) = sim_node.handle_timer(timer) {
                    trace!("{:?} timer failed: {}", timer, e);
                }
                self.flush(node);
            }
            Event::AppSend { node } => {
                let Some(traffic) = self.traffic.clone() else {
                    return;
                };
                let _span = info_span!("node", addr = %node).entered();
                match self.send_from(node, traffic.payload_size) {
                    Ok(seqn) => debug!("app: sent seqn {}", seqn),
                    Err(e) => debug!("app: send failed: {}", e),
                }
                self.schedule(self.now() + traffic.interval(), Event::AppSend { node });
            }
            Event::Action(action) => self.apply_action(action),
        }
    }

    fn apply_action(&mut self, action: ScenarioAction) {
        debug!("t={}ms scenario action {:?}", self.now_ms, action);
        match action {
            ScenarioAction::DisableLink { a, b } => {
                if let Some(link) = self.topology.get_link_mut(a, b) {
                    link.active = false;
                }
            }
            ScenarioAction::EnableLink { a, b } => {
                if let Some(link) = self.topology.get_link_mut(a, b) {
                    link.active = true;
                }
            }
            ScenarioAction::SetRssi { a, b, rssi } => {
                if let Some(link) = self.topology.get_link_mut(a, b) {
                    link.rssi = rssi;
                }
            }
            ScenarioAction::SetLossRate { a, b, rate } => {
                if let Some(link) = self.topology.get_link_mut(a, b) {
                    link.loss_rate = rate.clamp(0.0, 1.0);
                }
            }
        }
    }

    /// Turn a node's pending effects into scheduled events
    fn flush(&mut self, addr: NodeAddr) {
        let outbox = match self.nodes.get_mut(&addr) {
            Some(node) => node.take_outbox(),
            None => return,
        };
        let Outbox {
            broadcasts,
            unicasts,
            timers,
            deliveries,
        } = outbox;

        for (timer, after) in timers {
            let generation = self.timer_generations.entry((addr, timer)).or_insert(0);
            *generation += 1;
            let generation = *generation;
            self.schedule(
                self.now() + after,
                Event::Timer {
                    node: addr,
                    timer,
                    generation,
                },
            );
        }

        for (channel, frame) in broadcasts {
            self.radio.broadcasts += 1;
            for neighbor in self.topology.neighbors(addr) {
                self.transmit(addr, neighbor, FrameKind::Broadcast, channel, &frame);
            }
        }

        for (channel, to, frame) in unicasts {
            self.radio.unicasts += 1;
            if !self.topology.is_connected(addr, to) {
                self.radio.frames_unreachable += 1;
                trace!("unicast {} -> {} has no link", addr, to);
                continue;
            }
            self.transmit(addr, to, FrameKind::Unicast, channel, &frame);
        }

        for delivery in deliveries {
            match app_seqn(&delivery.payload) {
                Some(seqn) => {
                    debug!(
                        "app: recv from {} seqn {} hops {}",
                        delivery.source, seqn, delivery.hops
                    );
                    self.delivery
                        .record_received(delivery.source, seqn, delivery.hops);
                }
                None => trace!("delivery from {} without app seqn", delivery.source),
            }
        }
    }

    /// Put one copy of `frame` on the link from `from` to `to`
    fn transmit(&mut self, from: NodeAddr, to: NodeAddr, kind: FrameKind, channel: u16, frame: &[u8]) {
        let Some(link) = self.topology.get_link(from, to) else {
            return;
        };
        let (loss_rate, delay, rssi) = (link.loss_rate, link.delay(), link.rssi);

        if loss_rate > 0.0 && self.rng.gen::<f64>() < loss_rate {
            self.radio.frames_lost += 1;
            return;
        }

        self.radio.frames_delivered += 1;
        self.schedule(
            self.now() + delay,
            Event::Frame {
                to,
                from,
                kind,
                channel,
                frame: frame.to_vec(),
                rssi,
            },
        );
    }
}
