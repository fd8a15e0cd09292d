//! Capacity solver: Dinic-style blocking flow over a reversed residual graph
//! for [`FlowPlacement::Proportional`], BFS fan-out for
//! [`FlowPlacement::EqualBalanced`] (component C3, §4.1).
//!
//! Node names are re-indexed to small integers for the duration of a single
//! solve so the hot inner loop walks plain arrays rather than hashing
//! strings repeatedly (§9: "avoid hidden dictionaries in hot paths").

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;

use super::spf::PredDag;
use super::{EdgeId, NodeId, StrictMultiDiGraph, MIN_CAP, MIN_FLOW};
use crate::error::{Error, Result};
use crate::types::FlowPlacement;

/// Forward-oriented normalized flow fractions: `fractions[(u, v)] >= 0` is the
/// share of the solved feasible volume carried on the forward arc `u -> v`.
pub type FlowFractions = HashMap<(NodeId, NodeId), f64>;

struct ReversedGraph {
    nodes: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
    /// succ[u][v] = forward edge ids u->v, restricted to the predecessor DAG.
    succ: Vec<IndexMap<usize, Vec<EdgeId>>>,
    residual_cap: Vec<IndexMap<usize, f64>>,
    flow_dict: Vec<IndexMap<usize, f64>>,
}

impl ReversedGraph {
    fn get_or_insert(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(name.to_string());
        self.index.insert(name.to_string(), i);
        self.succ.push(IndexMap::new());
        self.residual_cap.push(IndexMap::new());
        self.flow_dict.push(IndexMap::new());
        i
    }
}

fn init_graph_data(
    graph: &StrictMultiDiGraph,
    pred: &PredDag,
    dst: &str,
    placement: FlowPlacement,
) -> ReversedGraph {
    let mut rg = ReversedGraph {
        nodes: Vec::new(),
        index: HashMap::new(),
        succ: Vec::new(),
        residual_cap: Vec::new(),
        flow_dict: Vec::new(),
    };

    let dst_idx = rg.get_or_insert(dst);
    let mut visited = vec![true];
    let mut queue = VecDeque::new();
    queue.push_back(dst_idx);

    while let Some(node_idx) = queue.pop_front() {
        let node_name = rg.nodes[node_idx].clone();
        let Some(preds) = pred.predecessors_of(&node_name) else { continue };
        for (adj_name, edge_list) in preds {
            let adj_idx = rg.get_or_insert(adj_name);
            while visited.len() <= adj_idx.max(node_idx) {
                visited.push(false);
            }

            if !rg.succ[adj_idx].contains_key(&node_idx) {
                rg.succ[adj_idx].insert(node_idx, edge_list.to_vec());
            }

            let capacities: Vec<f64> = edge_list
                .iter()
                .filter_map(|eid| graph.edge(*eid))
                .map(|e| (e.capacity - e.flow_total).max(0.0))
                .collect();

            match placement {
                FlowPlacement::Proportional => {
                    let fwd_capacity: f64 = capacities.iter().sum();
                    rg.residual_cap[node_idx]
                        .insert(adj_idx, if fwd_capacity >= MIN_CAP { fwd_capacity } else { 0.0 });
                    rg.residual_cap[adj_idx].entry(node_idx).or_insert(0.0);
                }
                FlowPlacement::EqualBalanced => {
                    let rev_cap = if capacities.is_empty() {
                        0.0
                    } else {
                        let min_cap = capacities.iter().cloned().fold(f64::INFINITY, f64::min);
                        min_cap * capacities.len() as f64
                    };
                    rg.residual_cap[adj_idx]
                        .insert(node_idx, if rev_cap >= MIN_CAP { rev_cap } else { 0.0 });
                    rg.residual_cap[node_idx].entry(adj_idx).or_insert(0.0);
                }
            }

            rg.flow_dict[node_idx].insert(adj_idx, 0.0);
            rg.flow_dict[adj_idx].insert(node_idx, 0.0);

            if !visited[adj_idx] {
                visited[adj_idx] = true;
                queue.push_back(adj_idx);
            }
        }
    }

    rg
}

fn set_levels_bfs(start: usize, n: usize, residual_cap: &[IndexMap<usize, f64>]) -> Vec<i64> {
    let mut levels = vec![-1i64; n];
    levels[start] = 0;
    let mut queue = VecDeque::new();
    queue.push_back(start);
    while let Some(u) = queue.pop_front() {
        for (&v, &cap) in &residual_cap[u] {
            if cap >= MIN_CAP && levels[v] < 0 {
                levels[v] = levels[u] + 1;
                queue.push_back(v);
            }
        }
    }
    levels
}

fn push_flow_dfs(
    current: usize,
    sink: usize,
    flow_in: f64,
    residual_cap: &mut [IndexMap<usize, f64>],
    flow_dict: &mut [IndexMap<usize, f64>],
    levels: &[i64],
) -> f64 {
    if current == sink {
        return flow_in;
    }

    let mut total_pushed = 0.0;
    let mut remaining = flow_in;
    let neighbors: Vec<(usize, f64)> =
        residual_cap[current].iter().map(|(&v, &c)| (v, c)).collect();

    for (nxt, cap_uv) in neighbors {
        if remaining < MIN_FLOW {
            break;
        }
        if cap_uv < MIN_CAP {
            continue;
        }
        if levels.get(nxt).copied().unwrap_or(-1) != levels[current] + 1 {
            continue;
        }
        let to_push = remaining.min(cap_uv);
        if to_push < MIN_FLOW {
            continue;
        }
        let pushed = push_flow_dfs(nxt, sink, to_push, residual_cap, flow_dict, levels);
        if pushed >= MIN_FLOW {
            *residual_cap[current].get_mut(&nxt).unwrap() -= pushed;
            *residual_cap[nxt].entry(current).or_insert(0.0) += pushed;

            *flow_dict[current].get_mut(&nxt).unwrap() += pushed;
            *flow_dict[nxt].entry(current).or_insert(0.0) -= pushed;

            remaining -= pushed;
            total_pushed += pushed;
        }
    }

    total_pushed
}

fn equal_balance_bfs(
    src: usize,
    succ: &[IndexMap<usize, Vec<EdgeId>>],
    flow_dict: &mut [IndexMap<usize, f64>],
) {
    let node_split: Vec<usize> =
        succ.iter().map(|m| m.values().map(|v| v.len()).sum()).collect();

    let mut queue = VecDeque::new();
    queue.push_back((src, 1.0f64));
    let mut visited = vec![false; succ.len()];

    while let Some((node, incoming)) = queue.pop_front() {
        visited[node] = true;
        let split_count = node_split[node];
        if split_count == 0 || incoming < MIN_FLOW {
            continue;
        }
        let targets: Vec<(usize, usize)> =
            succ[node].iter().map(|(&v, edges)| (v, edges.len())).collect();
        for (nxt, edge_count) in targets {
            if edge_count == 0 {
                continue;
            }
            let push = (incoming * edge_count as f64) / split_count as f64;
            if push < MIN_FLOW {
                continue;
            }
            *flow_dict[node].get_mut(&nxt).unwrap() += push;
            *flow_dict[nxt].entry(node).or_insert(0.0) -= push;
            if !visited[nxt] {
                queue.push_back((nxt, push));
            }
        }
    }
}

/// Compute feasible flow volume and normalized forward flow fractions between
/// `src` and `dst`, given a predecessor DAG from SPF (§4.1).
pub fn calc_graph_capacity(
    graph: &StrictMultiDiGraph,
    src: &str,
    dst: &str,
    pred: &PredDag,
    placement: FlowPlacement,
) -> Result<(f64, FlowFractions)> {
    if !graph.has_node(src) {
        return Err(Error::invalid_input(format!("unknown source node '{src}'")));
    }
    if !graph.has_node(dst) {
        return Err(Error::invalid_input(format!("unknown destination node '{dst}'")));
    }
    if src == dst {
        return Ok((0.0, FlowFractions::new()));
    }

    let mut rg = init_graph_data(graph, pred, dst, placement);
    let n = rg.nodes.len();
    let src_idx = rg.index.get(src).copied();
    let dst_idx = rg.index[dst];

    let mut total_flow = 0.0f64;

    match placement {
        FlowPlacement::Proportional => loop {
            let levels = set_levels_bfs(dst_idx, n, &rg.residual_cap);
            let src_level = src_idx.map(|i| levels[i]).unwrap_or(-1);
            if src_level <= 0 {
                break;
            }
            let Some(src_idx) = src_idx else { break };
            let pushed = push_flow_dfs(
                dst_idx,
                src_idx,
                f64::INFINITY,
                &mut rg.residual_cap,
                &mut rg.flow_dict,
                &levels,
            );
            if pushed < MIN_FLOW {
                break;
            }
            total_flow += pushed;
        },
        FlowPlacement::EqualBalanced => {
            if let Some(src_idx) = src_idx {
                equal_balance_bfs(src_idx, &rg.succ, &mut rg.flow_dict);
            }

            let mut min_ratio = f64::INFINITY;
            for u in 0..n {
                for (&v, _) in &rg.succ[u] {
                    let assigned = rg.flow_dict[u].get(&v).copied().unwrap_or(0.0);
                    if assigned >= MIN_FLOW && assigned > 0.0 {
                        let cap_uv = rg.residual_cap[u].get(&v).copied().unwrap_or(0.0);
                        let ratio = cap_uv / assigned;
                        if ratio < min_ratio {
                            min_ratio = ratio;
                        }
                    }
                }
            }

            if !min_ratio.is_finite() || min_ratio < MIN_FLOW {
                total_flow = 0.0;
            } else {
                total_flow = min_ratio;
                for u in 0..n {
                    for (_, val) in rg.flow_dict[u].iter_mut() {
                        let scaled = *val * total_flow;
                        *val = if scaled.abs() >= MIN_FLOW { scaled } else { 0.0 };
                    }
                }
                for u in 0..n {
                    for (_, val) in rg.flow_dict[u].iter_mut() {
                        if val.abs() > 0.0 {
                            *val /= total_flow;
                        }
                    }
                }
            }
        }
    }

    let mut fractions = FlowFractions::new();
    if total_flow >= MIN_FLOW {
        match placement {
            FlowPlacement::Proportional => {
                for u in 0..n {
                    for (&v, &val) in &rg.flow_dict[u] {
                        let frac = -(val / total_flow);
                        let frac = if frac.abs() < MIN_FLOW { 0.0 } else { frac };
                        fractions.insert((rg.nodes[u].clone(), rg.nodes[v].clone()), frac);
                    }
                }
            }
            FlowPlacement::EqualBalanced => {
                for u in 0..n {
                    for (&v, &val) in &rg.flow_dict[u] {
                        let val = if val.abs() < MIN_FLOW { 0.0 } else { val };
                        fractions.insert((rg.nodes[u].clone(), rg.nodes[v].clone()), val);
                    }
                }
            }
        }
    } else {
        total_flow = 0.0;
    }

    Ok((total_flow, fractions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::spf::{shortest_path_first, EdgeSelect, ExclusionSet};

    fn diamond(a_cap: f64, b_cap: f64) -> StrictMultiDiGraph {
        let mut g = StrictMultiDiGraph::new();
        for n in ["S", "A", "B", "T"] {
            g.add_node(n).unwrap();
        }
        g.add_bidirectional_edge("S", "A", a_cap, 1.0).unwrap();
        g.add_bidirectional_edge("A", "T", a_cap, 1.0).unwrap();
        g.add_bidirectional_edge("S", "B", b_cap, 1.0).unwrap();
        g.add_bidirectional_edge("B", "T", b_cap, 1.0).unwrap();
        g
    }

    #[test]
    fn diamond_proportional_sums_capacities() {
        let g = diamond(10.0, 30.0);
        let dag = shortest_path_first(&g, "S", &EdgeSelect::AllMinCost, &ExclusionSet::empty())
            .unwrap();
        let (flow, _fractions) =
            calc_graph_capacity(&g, "S", "T", &dag, FlowPlacement::Proportional).unwrap();
        assert!((flow - 40.0).abs() < 1e-6, "expected 40.0, got {flow}");
    }

    #[test]
    fn diamond_equal_balanced_bottlenecked_by_min_leg() {
        let g = diamond(10.0, 30.0);
        let dag = shortest_path_first(&g, "S", &EdgeSelect::AllMinCost, &ExclusionSet::empty())
            .unwrap();
        let (flow, _fractions) =
            calc_graph_capacity(&g, "S", "T", &dag, FlowPlacement::EqualBalanced).unwrap();
        // Two equal-cost legs, ECMP bottlenecked by the smaller (10) leg: 2 * 10 = 20.
        assert!((flow - 20.0).abs() < 1e-6, "expected 20.0, got {flow}");
    }

    #[test]
    fn self_loop_returns_zero() {
        let g = diamond(10.0, 30.0);
        let dag = shortest_path_first(&g, "S", &EdgeSelect::AllMinCost, &ExclusionSet::empty())
            .unwrap();
        let (flow, fractions) =
            calc_graph_capacity(&g, "S", "S", &dag, FlowPlacement::Proportional).unwrap();
        assert_eq!(flow, 0.0);
        assert!(fractions.is_empty());
    }

    #[test]
    fn unreachable_destination_returns_zero() {
        let mut g = StrictMultiDiGraph::new();
        g.add_node("S").unwrap();
        g.add_node("T").unwrap();
        let dag = shortest_path_first(&g, "S", &EdgeSelect::AllMinCost, &ExclusionSet::empty())
            .unwrap();
        let (flow, _) =
            calc_graph_capacity(&g, "S", "T", &dag, FlowPlacement::Proportional).unwrap();
        assert_eq!(flow, 0.0);
    }
}
