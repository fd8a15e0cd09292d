//! Benchmarks for FlowPolicy demand placement (component C5)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use netgraph_core::flows::policy::get_flow_policy;
use netgraph_core::graph::StrictMultiDiGraph;

fn mesh_graph(size: usize) -> StrictMultiDiGraph {
    let mut g = StrictMultiDiGraph::new();
    g.add_node("S").unwrap();
    g.add_node("T").unwrap();
    for i in 0..size {
        g.add_node(format!("M{i}")).unwrap();
        g.add_bidirectional_edge("S", &format!("M{i}"), 50.0, 1.0).unwrap();
        g.add_bidirectional_edge(&format!("M{i}"), "T", 50.0, 1.0).unwrap();
    }
    g
}

fn bench_place_demand(c: &mut Criterion) {
    let mut group = c.benchmark_group("flow_policy_place_demand");

    for size in [4, 16, 64].iter() {
        group.bench_with_input(BenchmarkId::new("SHORTEST_PATHS_ECMP", size), size, |b, &size| {
            b.iter_batched(
                || (mesh_graph(size), get_flow_policy("SHORTEST_PATHS_ECMP").unwrap()),
                |(mut g, mut policy)| policy.place_demand(black_box(&mut g), "S", "T", "default", 500.0).unwrap(),
                criterion::BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("TE_ECMP_16_LSP", size), size, |b, &size| {
            b.iter_batched(
                || (mesh_graph(size), get_flow_policy("TE_ECMP_16_LSP").unwrap()),
                |(mut g, mut policy)| policy.place_demand(black_box(&mut g), "S", "T", "default", 500.0).unwrap(),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_place_demand);
criterion_main!(benches);
