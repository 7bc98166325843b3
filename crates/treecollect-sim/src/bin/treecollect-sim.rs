//! TreeCollect simulator CLI
//!
//! Runs a collection scenario and prints the resulting tree and delivery
//! statistics.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use treecollect_sim::{RealtimeRunner, ScenarioConfig, Simulator, TopologyKind};

#[derive(Parser, Debug)]
#[command(name = "treecollect-sim")]
#[command(about = "Simulate many-to-one tree collection over a multi-hop radio network")]
struct Args {
    /// Scenario file (YAML); built-in 8-node chain when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of nodes
    #[arg(short, long)]
    nodes: Option<usize>,

    /// Topology: chain, star, grid or full
    #[arg(short, long)]
    topology: Option<TopologyKind>,

    /// Simulated duration in seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Seed for every random choice in the run
    #[arg(short, long)]
    seed: Option<u64>,

    /// Pace the run against the wall clock at this speed-up factor
    #[arg(long, value_name = "SPEED")]
    realtime: Option<f64>,

    /// Log filter, overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the effective scenario as YAML and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn scenario(&self) -> Result<ScenarioConfig> {
        let mut scenario = match &self.config {
            Some(path) => ScenarioConfig::load(path)?,
            None => ScenarioConfig::default(),
        };

        if let Some(nodes) = self.nodes {
            scenario.nodes = nodes;
        }
        if let Some(topology) = self.topology {
            scenario.topology = topology;
        }
        if let Some(duration) = self.duration {
            scenario.duration_secs = duration;
        }
        if let Some(seed) = self.seed {
            scenario.seed = seed;
        }

        scenario.validate().context("Invalid scenario")?;
        Ok(scenario)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let scenario = args.scenario()?;

    if args.print_config {
        print!("{}", scenario.to_yaml()?);
        return Ok(());
    }

    info!(
        "Simulating {} nodes ({} topology) for {}s, seed {}",
        scenario.nodes, scenario.topology, scenario.duration_secs, scenario.seed
    );

    let sim = Simulator::from_scenario(&scenario).context("Failed to build simulation")?;
    let end = Duration::from_secs(scenario.duration_secs);

    let result = match args.realtime {
        Some(speed) => RealtimeRunner::new(sim, speed).run_until(end).await,
        None => {
            let mut sim = sim;
            sim.run_until(end)
        }
    };

    println!("{}", result);
    Ok(())
}
