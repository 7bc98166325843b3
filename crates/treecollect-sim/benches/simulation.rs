use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::time::Duration;

use treecollect_sim::{ScenarioConfig, Simulator, TopologyKind};

fn bench_convergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("converge_10min");

    for (topology, nodes) in [
        (TopologyKind::Chain, 16),
        (TopologyKind::Grid, 64),
        (TopologyKind::Full, 32),
    ] {
        let scenario = ScenarioConfig {
            nodes,
            topology,
            ..Default::default()
        };

        group.bench_with_input(
            BenchmarkId::new(topology.to_string(), nodes),
            &scenario,
            |b, scenario| {
                b.iter(|| {
                    let mut sim = Simulator::from_scenario(scenario).unwrap();
                    black_box(sim.run_until(Duration::from_secs(600)))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_convergence);
criterion_main!(benches);
