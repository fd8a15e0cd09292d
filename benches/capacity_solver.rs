//! Benchmarks for the capacity solver (component C3)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use netgraph_core::graph::spf::{shortest_path_first, EdgeSelect, ExclusionSet};
use netgraph_core::graph::{flow, StrictMultiDiGraph};
use netgraph_core::types::FlowPlacement;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_layered_graph(layers: usize, width: usize, seed: u64) -> StrictMultiDiGraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut g = StrictMultiDiGraph::new();
    g.add_node("S").unwrap();
    g.add_node("T").unwrap();
    for l in 0..layers {
        for w in 0..width {
            g.add_node(format!("L{l}_{w}")).unwrap();
        }
    }

    for w in 0..width {
        g.add_edge("S", &format!("L0_{w}"), rng.gen_range(1.0..100.0), 1.0).unwrap();
    }
    for l in 0..layers - 1 {
        for w in 0..width {
            for w2 in 0..width {
                g.add_edge(&format!("L{l}_{w}"), &format!("L{}_{w2}", l + 1), rng.gen_range(1.0..100.0), 1.0).unwrap();
            }
        }
    }
    for w in 0..width {
        g.add_edge(&format!("L{}_{w}", layers - 1), "T", rng.gen_range(1.0..100.0), 1.0).unwrap();
    }
    g
}

fn bench_capacity_solver(c: &mut Criterion) {
    let mut group = c.benchmark_group("calc_graph_capacity");

    for (layers, width) in [(3, 5), (5, 10), (8, 15)].iter() {
        let g = random_layered_graph(*layers, *width, 7);
        let dag = shortest_path_first(&g, "S", &EdgeSelect::AllMinCost, &ExclusionSet::empty()).unwrap();

        group.bench_with_input(BenchmarkId::new("proportional", format!("{layers}x{width}")), &g, |b, g| {
            b.iter(|| flow::calc_graph_capacity(black_box(g), "S", "T", &dag, FlowPlacement::Proportional).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("equal_balanced", format!("{layers}x{width}")), &g, |b, g| {
            b.iter(|| flow::calc_graph_capacity(black_box(g), "S", "T", &dag, FlowPlacement::EqualBalanced).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_capacity_solver);
criterion_main!(benches);
