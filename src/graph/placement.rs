//! Flow placement: realize a solved [`FlowFractions`] map as concrete flow on
//! concrete parallel edges (component C4, §4.4).
//!
//! [`calc_graph_capacity`] tells us how much flow *can* move and in what
//! ratios between node pairs; placement is the separate step of actually
//! writing that flow onto one or more parallel edges between each pair,
//! splitting further according to [`FlowPlacement`].

use std::collections::HashSet;

use super::flow::{calc_graph_capacity, FlowFractions};
use super::spf::PredDag;
use super::{EdgeId, FlowId, NodeId, StrictMultiDiGraph};
use crate::error::Result;
use crate::types::FlowPlacement;

/// Outcome of a single [`place_flow_on_graph`] call: how much flow moved, how
/// much of the request remains unplaced, and which nodes/edges participated.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowPlacementMeta {
    /// Amount of flow actually placed.
    pub placed_flow: f64,
    /// Portion of the request that capacity could not satisfy.
    pub remaining_flow: f64,
    /// Node names that carried some portion of this flow.
    pub nodes: HashSet<NodeId>,
    /// Edge ids that carried some portion of this flow.
    pub edges: HashSet<EdgeId>,
}

impl FlowPlacementMeta {
    fn empty(requested: f64) -> Self {
        Self { placed_flow: 0.0, remaining_flow: requested, nodes: HashSet::new(), edges: HashSet::new() }
    }
}

/// Place up to `requested` volume of flow from `src` to `dst` on `graph`,
/// splitting across the predecessor DAG `pred` per `placement`, and tagging
/// every touched edge/node with `flow_id`.
///
/// `requested` may be `f64::INFINITY`, meaning "place as much as capacity allows".
pub fn place_flow_on_graph(
    graph: &mut StrictMultiDiGraph,
    src: &str,
    dst: &str,
    pred: &PredDag,
    requested: f64,
    flow_id: &FlowId,
    placement: FlowPlacement,
) -> Result<FlowPlacementMeta> {
    if src == dst {
        return Ok(FlowPlacementMeta::empty(requested));
    }

    let (rem_cap, fractions) = calc_graph_capacity(graph, src, dst, pred, placement)?;

    let placed_flow = rem_cap.min(requested);
    let remaining_flow = if requested.is_infinite() {
        f64::INFINITY
    } else {
        (requested - rem_cap).max(0.0)
    };

    if placed_flow <= 0.0 {
        return Ok(FlowPlacementMeta::empty(requested));
    }

    let mut meta = FlowPlacementMeta {
        placed_flow,
        remaining_flow,
        nodes: HashSet::new(),
        edges: HashSet::new(),
    };
    meta.nodes.insert(src.to_string());
    meta.nodes.insert(dst.to_string());

    distribute(graph, pred, &fractions, placed_flow, flow_id, placement, &mut meta);

    Ok(meta)
}

fn distribute(
    graph: &mut StrictMultiDiGraph,
    pred: &PredDag,
    fractions: &FlowFractions,
    placed_flow: f64,
    flow_id: &FlowId,
    placement: FlowPlacement,
    meta: &mut FlowPlacementMeta,
) {
    for (&(ref node_a, ref node_b), &flow_fraction) in fractions {
        if flow_fraction <= 0.0 {
            continue;
        }
        meta.nodes.insert(node_a.clone());
        meta.nodes.insert(node_b.clone());

        // fractions[(a, b)] describes forward flow a->b; the carrying edges
        // are the ones recorded as b's predecessors via a in the SPF DAG.
        let Some(edge_list) = pred.predecessors_of(node_b).and_then(|m| m.get(node_a)) else {
            continue;
        };

        match placement {
            FlowPlacement::Proportional => {
                let total_rem_cap: f64 = edge_list
                    .iter()
                    .filter_map(|&eid| graph.edge(eid))
                    .map(|e| e.residual())
                    .sum();
                if total_rem_cap > 0.0 {
                    for &eid in edge_list {
                        let Some(edge) = graph.edge(eid) else { continue };
                        let unused = edge.residual();
                        if unused > 0.0 {
                            let edge_subflow =
                                flow_fraction * placed_flow / total_rem_cap * unused;
                            if edge_subflow > 0.0 {
                                meta.edges.insert(eid);
                                graph.place_on_edge(eid, flow_id, edge_subflow);
                            }
                        }
                    }
                }
            }
            FlowPlacement::EqualBalanced => {
                if !edge_list.is_empty() {
                    let edge_subflow = (flow_fraction * placed_flow) / edge_list.len() as f64;
                    for &eid in edge_list {
                        meta.edges.insert(eid);
                        graph.place_on_edge(eid, flow_id, edge_subflow);
                    }
                }
            }
        }
    }
}

/// Remove flow previously placed under `flow_id` from every edge in `graph`.
pub fn remove_flow_from_graph(graph: &mut StrictMultiDiGraph, flow_id: &FlowId) {
    let edge_ids: Vec<EdgeId> = graph.edges().map(|e| e.id).collect();
    for eid in edge_ids {
        graph.unplace_from_edge(eid, flow_id);
    }
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

    fn fid() -> FlowId {
        FlowId { src: "S".into(), dst: "T".into(), flow_class: "default".into(), id: 0 }
    }

    #[test]
    fn places_full_capacity_when_unbounded() {
        let mut g = diamond(10.0, 30.0);
        let dag = shortest_path_first(&g, "S", &EdgeSelect::AllMinCost, &ExclusionSet::empty())
            .unwrap();
        let meta = place_flow_on_graph(
            &mut g,
            "S",
            "T",
            &dag,
            f64::INFINITY,
            &fid(),
            FlowPlacement::Proportional,
        )
        .unwrap();
        assert!((meta.placed_flow - 40.0).abs() < 1e-6);
        assert_eq!(meta.remaining_flow, f64::INFINITY);
        assert!(g.node("S").unwrap().flow_total > 0.0);
    }

    #[test]
    fn partial_request_leaves_remainder() {
        let mut g = diamond(10.0, 30.0);
        let dag = shortest_path_first(&g, "S", &EdgeSelect::AllMinCost, &ExclusionSet::empty())
            .unwrap();
        let meta =
            place_flow_on_graph(&mut g, "S", "T", &dag, 25.0, &fid(), FlowPlacement::Proportional)
                .unwrap();
        assert!((meta.placed_flow - 25.0).abs() < 1e-6);
        assert_eq!(meta.remaining_flow, 0.0);
    }

    #[test]
    fn self_loop_places_nothing() {
        let mut g = diamond(10.0, 30.0);
        let dag = shortest_path_first(&g, "S", &EdgeSelect::AllMinCost, &ExclusionSet::empty())
            .unwrap();
        let meta =
            place_flow_on_graph(&mut g, "S", "S", &dag, 5.0, &fid(), FlowPlacement::Proportional)
                .unwrap();
        assert_eq!(meta.placed_flow, 0.0);
        assert_eq!(meta.remaining_flow, 5.0);
    }

    #[test]
    fn remove_flow_zeroes_edges() {
        let mut g = diamond(10.0, 30.0);
        let dag = shortest_path_first(&g, "S", &EdgeSelect::AllMinCost, &ExclusionSet::empty())
            .unwrap();
        place_flow_on_graph(&mut g, "S", "T", &dag, f64::INFINITY, &fid(), FlowPlacement::Proportional)
            .unwrap();
        remove_flow_from_graph(&mut g, &fid());
        for e in g.edges() {
            assert_eq!(e.flow_total, 0.0);
        }
    }
}
