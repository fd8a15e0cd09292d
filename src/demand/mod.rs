//! Traffic demands and the demand-placement scheduler (component C6, §4.6).
//!
//! [`TrafficDemand`] is the declarative unit (endpoints, volume, priority);
//! [`Demand`] is one expanded `(src, dst)` pair with its own [`FlowPolicy`];
//! [`TrafficManager`] owns a graph plus the expanded demand set and runs the
//! round-robin placement scheduler (§4.6 "Orchestration").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flows::FlowPolicy;
use crate::graph::{NodeId, StrictMultiDiGraph};
use crate::model::Network;
use crate::types::GroupMode;

/// A declarative demand before endpoint-group expansion: "move `volume`
/// between nodes matching `source_pattern` and `sink_pattern`".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficDemand {
    /// Regex selecting source nodes.
    pub source_pattern: String,
    /// Regex selecting sink nodes.
    pub sink_pattern: String,
    /// Requested volume.
    pub volume: f64,
    /// Scheduling priority; lower values are placed first by the round-robin
    /// scheduler within a priority class (§4.6).
    pub priority: i32,
    /// How matched source/sink nodes combine into concrete `(src, dst)` pairs.
    pub mode: GroupMode,
    /// Name of the `FlowPolicyConfig` preset this demand should use.
    pub flow_policy: String,
}

/// A named collection of [`TrafficDemand`]s, the unit callers typically load
/// from configuration (§4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficMatrixSet {
    /// Matrix name to demand list.
    pub matrices: HashMap<String, Vec<TrafficDemand>>,
}

/// One expanded, concrete demand: a single `(src, dst)` pair with its own
/// [`FlowPolicy`] instance and placement bookkeeping.
pub struct Demand {
    /// Source node.
    pub src: NodeId,
    /// Destination node.
    pub dst: NodeId,
    /// Requested volume for this pair (already split across matched pairs
    /// when the owning [`TrafficDemand`] used [`GroupMode::Pairwise`]).
    pub volume: f64,
    /// Scheduling priority, copied from the owning [`TrafficDemand`].
    pub priority: i32,
    /// Flow class tag applied to every flow this demand places.
    pub flow_class: String,
    /// This demand's own routing policy instance.
    pub flow_policy: FlowPolicy,
    /// Volume placed so far.
    pub placed: f64,
}

impl Demand {
    /// Remaining unplaced volume.
    pub fn remaining(&self) -> f64 {
        (self.volume - self.placed).max(0.0)
    }
}

/// Orchestrates graph construction and demand placement for one analysis run.
pub struct TrafficManager<'a> {
    network: &'a Network,
    graph: StrictMultiDiGraph,
    demands: Vec<Demand>,
}

impl<'a> TrafficManager<'a> {
    /// Build the graph from `network` with no demands expanded yet.
    pub fn new(network: &'a Network) -> Result<Self> {
        let (graph, _) = network.to_strict_multidigraph()?;
        Ok(Self { network, graph, demands: Vec::new() })
    }

    /// Rebuild the graph from the underlying network, clearing all placement.
    pub fn build_graph(&mut self) -> Result<()> {
        let (graph, _) = self.network.to_strict_multidigraph()?;
        self.graph = graph;
        Ok(())
    }

    /// Expand every [`TrafficDemand`] in `matrix` into concrete [`Demand`]s,
    /// resolving source/sink patterns against the network and splitting
    /// volume evenly across matched pairs under [`GroupMode::Pairwise`], or
    /// aggregating matched nodes into one pseudo pair under
    /// [`GroupMode::Combine`] (here realized as "first match of each side").
    pub fn expand_demands(&mut self, matrix: &[TrafficDemand]) -> Result<()> {
        self.demands.clear();
        for (idx, td) in matrix.iter().enumerate() {
            let sources = self.network.select_node_groups_by_path(&td.source_pattern)?;
            let sinks = self.network.select_node_groups_by_path(&td.sink_pattern)?;
            let pairs: Vec<(NodeId, NodeId)> = match td.mode {
                GroupMode::Pairwise => sources
                    .iter()
                    .flat_map(|s| sinks.iter().filter(move |d| *d != s).map(move |d| (s.clone(), d.clone())))
                    .collect(),
                GroupMode::Combine => {
                    let (Some(s), Some(d)) = (sources.first(), sinks.first()) else { continue };
                    vec![(s.clone(), d.clone())]
                }
            };
            if pairs.is_empty() {
                continue;
            }
            let per_pair_volume = td.volume / pairs.len() as f64;
            for (pair_idx, (src, dst)) in pairs.into_iter().enumerate() {
                let flow_policy = crate::flows::policy::get_flow_policy(&td.flow_policy)?;
                self.demands.push(Demand {
                    src,
                    dst,
                    volume: per_pair_volume,
                    priority: td.priority,
                    flow_class: format!("demand-{idx}-{pair_idx}"),
                    flow_policy,
                    placed: 0.0,
                });
            }
        }
        Ok(())
    }

    /// Place every demand's remaining volume once, in round-robin order
    /// within each priority class (lower priority value first), until every
    /// demand's residual capacity is exhausted (§4.6 `schedule.py`).
    pub fn place_all_demands(&mut self) -> Result<()> {
        let mut order: Vec<usize> = (0..self.demands.len()).collect();
        order.sort_by_key(|&i| self.demands[i].priority);

        loop {
            let mut progressed = false;
            for &i in &order {
                let remaining = self.demands[i].remaining();
                if remaining <= 0.0 {
                    continue;
                }
                let (src, dst, flow_class) =
                    (self.demands[i].src.clone(), self.demands[i].dst.clone(), self.demands[i].flow_class.clone());
                let (placed, _) =
                    self.demands[i].flow_policy.place_demand(&mut self.graph, &src, &dst, &flow_class, remaining)?;
                if placed > 0.0 {
                    self.demands[i].placed += placed;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        Ok(())
    }

    /// Zero all flow accounting on the graph and every demand's placed total.
    pub fn reset_all_flow_usages(&mut self) {
        self.graph.reset_all_flow_usages();
        for d in &mut self.demands {
            d.placed = 0.0;
        }
    }

    /// Per-demand `(src, dst, requested, placed)` snapshot.
    pub fn get_flow_details(&self) -> Vec<(NodeId, NodeId, f64, f64)> {
        self.demands.iter().map(|d| (d.src.clone(), d.dst.clone(), d.volume, d.placed)).collect()
    }

    /// Aggregate placed-flow volume per edge id, keyed by `(source, target)`.
    pub fn summarize_link_usage(&self) -> HashMap<(NodeId, NodeId), f64> {
        let mut usage = HashMap::new();
        for edge in self.graph.edges() {
            *usage.entry((edge.source.clone(), edge.target.clone())).or_insert(0.0) += edge.flow_total;
        }
        usage
    }

    /// Borrow the underlying graph (e.g. for custom post-analysis).
    pub fn graph(&self) -> &StrictMultiDiGraph {
        &self.graph
    }

    /// Borrow the expanded demands.
    pub fn demands(&self) -> &[Demand] {
        &self.demands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Link, Node};

    fn sample_network() -> Network {
        let mut net = Network::new();
        for n in ["A", "B", "C"] {
            net.add_node(Node::new(n)).unwrap();
        }
        net.add_link(Link::new("L1", "A", "B", 10.0, 1.0)).unwrap();
        net.add_link(Link::new("L2", "B", "C", 10.0, 1.0)).unwrap();
        net
    }

    #[test]
    fn expand_and_place_single_demand() {
        let net = sample_network();
        let mut tm = TrafficManager::new(&net).unwrap();
        let matrix = vec![TrafficDemand {
            source_pattern: "^A$".into(),
            sink_pattern: "^C$".into(),
            volume: 5.0,
            priority: 0,
            mode: GroupMode::Combine,
            flow_policy: "SHORTEST_PATHS_ECMP".into(),
        }];
        tm.expand_demands(&matrix).unwrap();
        tm.place_all_demands().unwrap();
        let details = tm.get_flow_details();
        assert_eq!(details.len(), 1);
        assert!((details[0].3 - 5.0).abs() < 1e-6);
    }

    #[test]
    fn reset_clears_placement() {
        let net = sample_network();
        let mut tm = TrafficManager::new(&net).unwrap();
        let matrix = vec![TrafficDemand {
            source_pattern: "^A$".into(),
            sink_pattern: "^C$".into(),
            volume: 5.0,
            priority: 0,
            mode: GroupMode::Combine,
            flow_policy: "SHORTEST_PATHS_ECMP".into(),
        }];
        tm.expand_demands(&matrix).unwrap();
        tm.place_all_demands().unwrap();
        tm.reset_all_flow_usages();
        for e in tm.graph().edges() {
            assert_eq!(e.flow_total, 0.0);
        }
    }
}
