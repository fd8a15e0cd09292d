//! Shortest-path-first search and edge selectors (components C2/§4.2, §4.3).
//!
//! SPF here means "shortest path, all equal-cost parents recorded" — the
//! output is a predecessor DAG, not a single path, so that the capacity
//! solver (§4.1) can spread flow over every tied-cost route.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use smallvec::{smallvec, SmallVec};

use super::{Cost, EdgeData, EdgeId, NodeId, StrictMultiDiGraph};
use crate::error::{Error, Result};

/// Parallel edge ids between one `(u, v)` hop. Almost always 1-2 entries
/// (rarely more than a handful of physical links between the same pair), so
/// this stays inline instead of heap-allocating per hop.
pub type EdgeIdList = SmallVec<[EdgeId; 4]>;

/// Edge-selection mode (§4.2): chooses which parallel edges between `(u, v)`
/// are eligible for a predecessor-DAG entry, and what cost to expose for them.
#[derive(Clone)]
pub enum EdgeSelect {
    /// Expose the minimum edge cost; all edges tied at that minimum are eligible.
    AllMinCost,
    /// Expose the minimum edge cost; a single edge (lowest id) is eligible.
    SingleMinCost,
    /// Like `AllMinCost`, but only considers edges with
    /// `capacity - flow >= select_value.unwrap_or(MIN_CAP)`.
    AllMinCostWithCapRemaining {
        /// Residual-capacity threshold; defaults to `MIN_CAP` when `None`.
        select_value: Option<f64>,
    },
    /// Minimum cost, tie-broken by lowest current load (`flow_total`); single edge.
    SingleMinCostWithCapRemainingLoadFactored,
    /// Caller-provided selector. `discriminant` stands in for the closure in
    /// cache keys, since closures are not hashable (documented in DESIGN.md).
    UserDefined {
        /// Cache-key discriminant identifying this selector instance.
        discriminant: String,
        /// `(edges, from, to) -> Some((cost, eligible_edge_ids))`.
        select: Arc<dyn Fn(&[&EdgeData]) -> Option<(Cost, EdgeIdList)> + Send + Sync>,
    },
}

impl std::fmt::Debug for EdgeSelect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllMinCost => f.write_str("AllMinCost"),
            Self::SingleMinCost => f.write_str("SingleMinCost"),
            Self::AllMinCostWithCapRemaining { select_value } => f
                .debug_struct("AllMinCostWithCapRemaining")
                .field("select_value", select_value)
                .finish(),
            Self::SingleMinCostWithCapRemainingLoadFactored => {
                f.write_str("SingleMinCostWithCapRemainingLoadFactored")
            }
            Self::UserDefined { discriminant, .. } => f
                .debug_struct("UserDefined")
                .field("discriminant", discriminant)
                .finish_non_exhaustive(),
        }
    }
}

impl EdgeSelect {
    /// Cache-key discriminant for this selector's `(mode, value)` pair.
    pub fn cache_key(&self) -> String {
        match self {
            EdgeSelect::AllMinCost => "all_min_cost".to_string(),
            EdgeSelect::SingleMinCost => "single_min_cost".to_string(),
            EdgeSelect::AllMinCostWithCapRemaining { select_value } => {
                format!("all_min_cost_cap:{select_value:?}")
            }
            EdgeSelect::SingleMinCostWithCapRemainingLoadFactored => {
                "single_min_cost_cap_load".to_string()
            }
            EdgeSelect::UserDefined { discriminant, .. } => format!("user:{discriminant}"),
        }
    }

    /// Apply this selector to the set of parallel edges between one `(u, v)` pair.
    /// Returns `None` if no edge is eligible.
    fn select(&self, edges: &[&EdgeData]) -> Option<(Cost, EdgeIdList)> {
        if edges.is_empty() {
            return None;
        }
        match self {
            EdgeSelect::AllMinCost => {
                let min_cost = edges.iter().map(|e| e.cost).fold(f64::INFINITY, f64::min);
                let ids = edges
                    .iter()
                    .filter(|e| (e.cost - min_cost).abs() < 1e-12)
                    .map(|e| e.id)
                    .collect();
                Some((min_cost, ids))
            }
            EdgeSelect::SingleMinCost => {
                let best = edges.iter().min_by(|a, b| {
                    a.cost
                        .partial_cmp(&b.cost)
                        .unwrap()
                        .then(a.id.cmp(&b.id))
                })?;
                Some((best.cost, smallvec![best.id]))
            }
            EdgeSelect::AllMinCostWithCapRemaining { select_value } => {
                let threshold = select_value.unwrap_or(super::MIN_CAP);
                let eligible: Vec<&&EdgeData> =
                    edges.iter().filter(|e| e.residual() >= threshold).collect();
                if eligible.is_empty() {
                    return None;
                }
                let min_cost = eligible.iter().map(|e| e.cost).fold(f64::INFINITY, f64::min);
                let ids = eligible
                    .iter()
                    .filter(|e| (e.cost - min_cost).abs() < 1e-12)
                    .map(|e| e.id)
                    .collect();
                Some((min_cost, ids))
            }
            EdgeSelect::SingleMinCostWithCapRemainingLoadFactored => {
                let best = edges
                    .iter()
                    .filter(|e| e.residual() >= super::MIN_CAP)
                    .min_by(|a, b| {
                        a.cost
                            .partial_cmp(&b.cost)
                            .unwrap()
                            .then(a.flow_total.partial_cmp(&b.flow_total).unwrap())
                            .then(a.id.cmp(&b.id))
                    })?;
                Some((best.cost, smallvec![best.id]))
            }
            EdgeSelect::UserDefined { select, .. } => select(edges),
        }
    }
}

/// Predecessor DAG: for each reachable node `v`, the set of immediate
/// predecessors and the parallel edge ids connecting each to `v`.
#[derive(Debug, Clone, Default)]
pub struct PredDag {
    /// `pred[v][u]` = parallel edge ids carrying the minimum-cost path `u -> v`.
    pub pred: HashMap<NodeId, IndexMap<NodeId, EdgeIdList>>,
    /// Shortest cost from the SPF root to each reachable node.
    pub cost: HashMap<NodeId, Cost>,
}

impl PredDag {
    /// Immediate predecessors of `v`, if reachable.
    pub fn predecessors_of(&self, v: &str) -> Option<&IndexMap<NodeId, EdgeIdList>> {
        self.pred.get(v)
    }

    /// Whether `node` is reachable from the SPF root.
    pub fn is_reachable(&self, node: &str) -> bool {
        self.cost.contains_key(node)
    }
}

/// Exclusion mask applied while walking the graph: excluded nodes/edges are
/// treated as absent by every solver and selector (§9 "exclusion masks vs.
/// mutated copies").
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    /// Node names to treat as removed.
    pub nodes: HashSet<NodeId>,
    /// Edge ids to treat as removed.
    pub edges: HashSet<EdgeId>,
}

impl ExclusionSet {
    /// No exclusions.
    pub fn empty() -> Self {
        Self::default()
    }

    fn edge_allowed(&self, e: &EdgeData) -> bool {
        !e.disabled
            && !self.edges.contains(&e.id)
            && !self.nodes.contains(&e.source)
            && !self.nodes.contains(&e.target)
    }
}

/// Run SPF rooted at `src`, producing a predecessor DAG over every node
/// reachable under `exclusions`, using `selector` to pick eligible parallel
/// edges at each expansion step (§4.3).
pub fn shortest_path_first(
    graph: &StrictMultiDiGraph,
    src: &str,
    selector: &EdgeSelect,
    exclusions: &ExclusionSet,
) -> Result<PredDag> {
    if !graph.has_node(src) {
        return Err(Error::invalid_input(format!("unknown source node '{src}'")));
    }

    let mut dist: HashMap<NodeId, Cost> = HashMap::new();
    let mut pred: HashMap<NodeId, IndexMap<NodeId, EdgeIdList>> = HashMap::new();
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f64>, NodeId)>> = BinaryHeap::new();

    if exclusions.nodes.contains(src) {
        return Ok(PredDag::default());
    }

    dist.insert(src.to_string(), 0.0);
    heap.push(Reverse((OrderedFloat(0.0), src.to_string())));

    while let Some(Reverse((d, u))) = heap.pop() {
        let d = d.0;
        if exclusions.nodes.contains(&u) {
            continue;
        }
        match dist.get(&u) {
            Some(&best) if (d - best).abs() > 1e-12 && d > best => continue,
            _ => {}
        }

        let Some(node) = graph.node(&u) else { continue };
        // Group outgoing edges by target so the selector sees all parallels at once.
        let mut by_target: IndexMap<NodeId, Vec<&EdgeData>> = IndexMap::new();
        for &eid in node.out_edges() {
            let Some(e) = graph.edge(eid) else { continue };
            if !exclusions.edge_allowed(e) {
                continue;
            }
            by_target.entry(e.target.clone()).or_default().push(e);
        }

        for (v, edges) in by_target {
            if exclusions.nodes.contains(&v) {
                continue;
            }
            let Some((edge_cost, ids)) = selector.select(&edges) else {
                continue;
            };
            let cand = d + edge_cost;
            let best_v = dist.get(&v).copied();
            match best_v {
                Some(existing) if cand > existing + 1e-12 => continue,
                Some(existing) if (cand - existing).abs() <= 1e-12 => {
                    // Tied-cost alternate predecessor: extend the DAG.
                    pred.entry(v.clone()).or_default().insert(u.clone(), ids);
                }
                _ => {
                    dist.insert(v.clone(), cand);
                    let mut group = IndexMap::new();
                    group.insert(u.clone(), ids);
                    pred.insert(v.clone(), group);
                    heap.push(Reverse((OrderedFloat(cand), v)));
                }
            }
        }
    }

    Ok(PredDag { pred, cost: dist })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> StrictMultiDiGraph {
        let mut g = StrictMultiDiGraph::new();
        for n in ["S", "A", "B", "T"] {
            g.add_node(n).unwrap();
        }
        g.add_bidirectional_edge("S", "A", 10.0, 1.0).unwrap();
        g.add_bidirectional_edge("A", "T", 10.0, 1.0).unwrap();
        g.add_bidirectional_edge("S", "B", 30.0, 1.0).unwrap();
        g.add_bidirectional_edge("B", "T", 30.0, 1.0).unwrap();
        g
    }

    #[test]
    fn diamond_has_two_equal_cost_predecessors_of_t() {
        let g = diamond();
        let dag = shortest_path_first(&g, "S", &EdgeSelect::AllMinCost, &ExclusionSet::empty())
            .unwrap();
        assert_eq!(dag.cost["T"], 2.0);
        let preds = dag.predecessors_of("T").unwrap();
        assert_eq!(preds.len(), 2);
        assert!(preds.contains_key("A"));
        assert!(preds.contains_key("B"));
    }

    #[test]
    fn single_min_cost_picks_one_edge_per_hop() {
        let g = diamond();
        let dag =
            shortest_path_first(&g, "S", &EdgeSelect::SingleMinCost, &ExclusionSet::empty())
                .unwrap();
        // Even with a single-edge selector, both A and B hops are tied in cost,
        // so both remain as alternate predecessors of T — selection narrows
        // *parallel edges* within one hop, not alternate paths.
        let preds = dag.predecessors_of("T").unwrap();
        for (_, ids) in preds {
            assert_eq!(ids.len(), 1);
        }
    }

    #[test]
    fn excluded_node_is_unreachable_through() {
        let g = diamond();
        let mut excl = ExclusionSet::empty();
        excl.nodes.insert("A".to_string());
        let dag = shortest_path_first(&g, "S", &EdgeSelect::AllMinCost, &excl).unwrap();
        let preds = dag.predecessors_of("T").unwrap();
        assert_eq!(preds.len(), 1);
        assert!(preds.contains_key("B"));
    }

    #[test]
    fn unknown_source_is_invalid_input() {
        let g = diamond();
        let err = shortest_path_first(&g, "Z", &EdgeSelect::AllMinCost, &ExclusionSet::empty());
        assert!(err.is_err());
    }
}
