//! FlowPolicy (§4.5): places a traffic demand onto a strict multi-digraph as
//! one or more [`FlowId`]-tagged flows, each routed over an SPF predecessor
//! DAG and split across parallel edges per [`FlowPlacement`].
//!
//! A policy with `max_flow_count = Some(1)` routes the whole demand as a
//! single flow; ECMP/WCMP fan-out across tied-cost paths is inherent to the
//! predecessor DAG, not to the flow count. Larger `max_flow_count` values
//! model explicit LSP-like flows that the registry grows into as placement
//! proceeds, capping at the configured count rather than recreating flows
//! on every call (§4.5 presets `TE_ECMP_UP_TO_256_LSP`, `TE_ECMP_16_LSP`).

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::graph::placement::{place_flow_on_graph, remove_flow_from_graph};
use crate::graph::spf::{shortest_path_first, EdgeSelect, ExclusionSet, PredDag};
use crate::graph::{FlowId, NodeId, StrictMultiDiGraph};
use crate::types::{FlowPlacement, MIN_FLOW};

/// Running counters exposed after placement, aggregated across demands by
/// `demand_placement_analysis` (§4.9).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolicyMetrics {
    /// Number of SPF invocations this policy has triggered.
    pub spf_calls: u64,
    /// Number of flow objects (LSPs) this policy has created.
    pub flows_created: u64,
    /// Number of reoptimization passes performed.
    pub reopt_calls: u64,
    /// Number of placement rounds performed (one per flow per attempt).
    pub place_iterations: u64,
}

/// One flow in a policy's registry: a path bundle and the volume currently
/// assigned to it (§3 "Flow").
#[derive(Debug, Clone)]
struct PolicyFlow {
    id: FlowId,
    src: NodeId,
    dst: NodeId,
    bundle: PredDag,
    placed_flow: f64,
}

/// A bounded, reusable set of routing parameters for placing demand on a
/// graph. One instance is typically owned per `(src, dst, priority class)`
/// triple by the demand scheduler (§4.6).
#[derive(Debug, Clone)]
pub struct FlowPolicy {
    /// Edge-selection mode used at every SPF hop.
    pub edge_select: EdgeSelect,
    /// How solved capacity fractions are split across parallel edges.
    pub flow_placement: FlowPlacement,
    /// Number of flows to create immediately when the registry is empty.
    pub min_flow_count: usize,
    /// Upper bound on how many flows the registry may grow to; `None` means
    /// unbounded (still subject to the diminishing-returns/no-progress guards).
    pub max_flow_count: Option<usize>,
    /// Absolute ceiling on an accepted path-bundle cost.
    pub max_path_cost: Option<f64>,
    /// Reject any candidate path whose cost exceeds `best_path_cost * factor`.
    pub max_path_cost_factor: Option<f64>,
    /// After placing, tear down and re-place every registered flow from
    /// scratch. Models TE reoptimization against updated residual capacity.
    pub reoptimize_flows_on_each_placement: bool,
    /// Safety-net cap on placement-loop iterations per `place_demand` call.
    pub max_total_iterations: usize,
    /// Safety-net cap on consecutive no-progress iterations.
    pub max_no_progress_iterations: usize,
    /// Width of the sliding window used for the diminishing-returns cutoff.
    pub diminishing_returns_window: usize,
    /// Fraction of the initial request below which a full window's placement
    /// sum is treated as diminishing returns.
    pub diminishing_returns_epsilon_frac: f64,

    metrics: PolicyMetrics,
    next_flow_seq: u64,
    flows: Vec<PolicyFlow>,
    best_path_cost: Option<f64>,
    last_bundle: Option<(NodeId, NodeId, PredDag)>,
}

impl FlowPolicy {
    /// Construct a policy. `flow_class` distinguishes this policy's flows from
    /// others placed on the same graph.
    pub fn new(edge_select: EdgeSelect, flow_placement: FlowPlacement) -> Self {
        Self {
            edge_select,
            flow_placement,
            min_flow_count: 1,
            max_flow_count: None,
            max_path_cost: None,
            max_path_cost_factor: None,
            reoptimize_flows_on_each_placement: false,
            max_total_iterations: 10_000,
            max_no_progress_iterations: 20,
            diminishing_returns_window: 3,
            diminishing_returns_epsilon_frac: 0.01,
            metrics: PolicyMetrics::default(),
            next_flow_seq: 0,
            flows: Vec::new(),
            best_path_cost: None,
            last_bundle: None,
        }
    }

    /// Current metric snapshot.
    pub fn metrics(&self) -> PolicyMetrics {
        self.metrics
    }

    /// Number of flows currently registered.
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    fn fresh_flow_id(&mut self, src: &str, dst: &str, flow_class: &str) -> FlowId {
        let id = FlowId { src: src.to_string(), dst: dst.to_string(), flow_class: flow_class.to_string(), id: self.next_flow_seq };
        self.next_flow_seq += 1;
        id
    }

    /// `ALL_MIN_COST`/`SINGLE_MIN_COST` ignore residual capacity entirely, so
    /// neither a new flow nor reoptimization can route around a bottleneck
    /// under those selectors (§4.5 step 3 guard).
    fn capacity_aware(&self) -> bool {
        !matches!(self.edge_select, EdgeSelect::AllMinCost | EdgeSelect::SingleMinCost)
    }

    fn label(&self) -> String {
        format!("{:?}/{}", self.flow_placement, self.edge_select.cache_key())
    }

    fn bundle_edge_ids(bundle: &PredDag) -> impl Iterator<Item = crate::graph::EdgeId> + '_ {
        bundle.pred.values().flat_map(|preds| preds.values().flat_map(|ids| ids.iter().copied()))
    }

    fn bundle_is_stale(graph: &StrictMultiDiGraph, bundle: &PredDag) -> bool {
        Self::bundle_edge_ids(bundle).any(|eid| !graph.has_edge_by_id(eid))
    }

    fn bundle_has_headroom(graph: &StrictMultiDiGraph, bundle: &PredDag, threshold: f64) -> bool {
        Self::bundle_edge_ids(bundle).all(|eid| graph.edge(eid).is_some_and(|e| e.residual() >= threshold))
    }

    /// Whether `a` and `b` name the same best-cost predecessor set into `dst`
    /// (`PredDag` has no structural equality, so this compares the one
    /// relevant slice directly; §4.5 "Reoptimization of a flow").
    fn bundles_equivalent(a: &PredDag, b: &PredDag, dst: &str) -> bool {
        let (Some(&ca), Some(&cb)) = (a.cost.get(dst), b.cost.get(dst)) else { return false };
        if (ca - cb).abs() > 1e-9 {
            return false;
        }
        match (a.predecessors_of(dst), b.predecessors_of(dst)) {
            (Some(pa), Some(pb)) => {
                pa.len() == pb.len() && pa.keys().all(|k| pb.contains_key(k))
            }
            (None, None) => true,
            _ => false,
        }
    }

    /// §4.5 `_get_path_bundle`: SPF with the configured selector, cost-ceiling
    /// enforcement against `best_path_cost`, and single-bundle reuse when the
    /// last bundle for this `(src, dst)` still has headroom.
    fn get_path_bundle(&mut self, graph: &StrictMultiDiGraph, src: &str, dst: &str, min_volume: f64) -> Result<Option<PredDag>> {
        let threshold = min_volume.max(MIN_FLOW);
        if let Some((ref last_src, ref last_dst, ref bundle)) = self.last_bundle {
            if last_src == src && last_dst == dst && Self::bundle_has_headroom(graph, bundle, threshold) {
                return Ok(Some(bundle.clone()));
            }
        }

        let dag = shortest_path_first(graph, src, &self.edge_select, &ExclusionSet::empty())?;
        self.metrics.spf_calls += 1;

        if !dag.is_reachable(dst) {
            return Ok(None);
        }
        let cost_to_dst = dag.cost[dst];
        self.best_path_cost = Some(self.best_path_cost.map_or(cost_to_dst, |best| best.min(cost_to_dst)));

        let ceiling = match (self.max_path_cost, self.max_path_cost_factor.zip(self.best_path_cost)) {
            (Some(abs), Some((factor, best))) => Some(abs.min(best * factor)),
            (Some(abs), None) => Some(abs),
            (None, Some((factor, best))) => Some(best * factor),
            (None, None) => None,
        };
        if let Some(ceiling) = ceiling {
            if cost_to_dst > ceiling + 1e-9 {
                return Ok(None);
            }
        }

        self.last_bundle = Some((src.to_string(), dst.to_string(), dag.clone()));
        Ok(Some(dag))
    }

    fn try_create_flow(&mut self, graph: &StrictMultiDiGraph, src: &str, dst: &str, flow_class: &str) -> Result<Option<usize>> {
        let Some(bundle) = self.get_path_bundle(graph, src, dst, MIN_FLOW)? else { return Ok(None) };
        let id = self.fresh_flow_id(src, dst, flow_class);
        self.metrics.flows_created += 1;
        self.flows.push(PolicyFlow { id, src: src.to_string(), dst: dst.to_string(), bundle, placed_flow: 0.0 });
        Ok(Some(self.flows.len() - 1))
    }

    /// Drop registered flows whose path-bundle edges no longer exist in the
    /// graph (§4.5 step 1 — handles graph rebuild between placements).
    fn prune_stale_flows(&mut self, graph: &mut StrictMultiDiGraph) {
        let mut i = 0;
        while i < self.flows.len() {
            if Self::bundle_is_stale(graph, &self.flows[i].bundle) {
                remove_flow_from_graph(graph, &self.flows[i].id);
                self.flows.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Remove a flow's current assignment, search for a fresher path bundle
    /// with `headroom = MIN_FLOW`, and re-place at the same volume (§4.5
    /// "Reoptimization of a flow").
    fn reoptimize_flow_at(&mut self, graph: &mut StrictMultiDiGraph, idx: usize) -> Result<()> {
        self.metrics.reopt_calls += 1;
        let (flow_id, src, dst, placed, old_bundle) = {
            let f = &self.flows[idx];
            (f.id.clone(), f.src.clone(), f.dst.clone(), f.placed_flow, f.bundle.clone())
        };
        remove_flow_from_graph(graph, &flow_id);

        let candidate = self.get_path_bundle(graph, &src, &dst, placed + MIN_FLOW)?;
        let bundle = match candidate {
            Some(b) if !Self::bundles_equivalent(&b, &old_bundle, &dst) => b,
            _ => old_bundle,
        };

        let meta = place_flow_on_graph(graph, &src, &dst, &bundle, placed, &flow_id, self.flow_placement)?;
        self.metrics.place_iterations += 1;
        self.flows[idx].bundle = bundle;
        self.flows[idx].placed_flow = meta.placed_flow;
        Ok(())
    }

    /// §4.5 step 5: when EQUAL_BALANCED leaves flows unequal beyond `MIN_FLOW`,
    /// remove every flow and re-place each at `placed_demand / flow_count`.
    /// Non-recursive: this runs exactly once per `place_demand` call.
    fn rebalance_equal_balanced(&mut self, graph: &mut StrictMultiDiGraph) -> Result<()> {
        if self.flow_placement != FlowPlacement::EqualBalanced || self.flows.len() <= 1 {
            return Ok(());
        }
        let placed_total: f64 = self.flows.iter().map(|f| f.placed_flow).sum();
        if placed_total <= MIN_FLOW {
            return Ok(());
        }
        let target = placed_total / self.flows.len() as f64;
        let unequal = self.flows.iter().any(|f| (f.placed_flow - target).abs() > MIN_FLOW);
        if !unequal {
            return Ok(());
        }

        for f in &self.flows {
            remove_flow_from_graph(graph, &f.id);
        }
        for idx in 0..self.flows.len() {
            let (id, src, dst, bundle) = {
                let f = &self.flows[idx];
                (f.id.clone(), f.src.clone(), f.dst.clone(), f.bundle.clone())
            };
            let meta = place_flow_on_graph(graph, &src, &dst, &bundle, target, &id, self.flow_placement)?;
            self.metrics.place_iterations += 1;
            self.flows[idx].placed_flow = meta.placed_flow;
        }
        Ok(())
    }

    /// Place `volume` of demand from `src` to `dst` onto `graph`, tagging
    /// every created flow with `flow_class`. Returns `(placed, remaining)`.
    /// Never fails for infeasibility; fails only when a termination guard
    /// trips (§4.5 step 4, §7).
    #[tracing::instrument(level = "debug", skip(self, graph), fields(src = %src, dst = %dst, volume))]
    pub fn place_demand(&mut self, graph: &mut StrictMultiDiGraph, src: &str, dst: &str, flow_class: &str, volume: f64) -> Result<(f64, f64)> {
        if volume <= 0.0 {
            return Ok((0.0, 0.0));
        }

        self.prune_stale_flows(graph);

        if self.flows.is_empty() {
            for _ in 0..self.min_flow_count.max(1) {
                if self.try_create_flow(graph, src, dst, flow_class)?.is_none() {
                    break;
                }
            }
        }

        let placed_before: f64 = self.flows.iter().map(|f| f.placed_flow).sum();
        let initial_request = volume;
        let mut remaining = volume;
        let mut total_iterations = 0usize;
        let mut consecutive_no_progress = 0usize;
        let mut window: VecDeque<f64> = VecDeque::new();
        let mut queue: VecDeque<usize> = (0..self.flows.len()).collect();
        let capacity_aware = self.capacity_aware();

        while remaining > MIN_FLOW {
            let Some(idx) = queue.pop_front() else { break };

            total_iterations += 1;
            if total_iterations > self.max_total_iterations {
                return Err(Error::termination_guard(
                    self.label(),
                    format!("max_total_iterations ({}) exceeded placing {src}->{dst}", self.max_total_iterations),
                ));
            }

            let (flow_id, flow_src, flow_dst, bundle) = {
                let f = &self.flows[idx];
                (f.id.clone(), f.src.clone(), f.dst.clone(), f.bundle.clone())
            };
            let meta = place_flow_on_graph(graph, &flow_src, &flow_dst, &bundle, remaining, &flow_id, self.flow_placement)?;
            self.metrics.place_iterations += 1;
            self.flows[idx].placed_flow += meta.placed_flow;
            remaining -= meta.placed_flow;

            window.push_back(meta.placed_flow);
            if window.len() > self.diminishing_returns_window {
                window.pop_front();
            }

            if meta.placed_flow <= MIN_FLOW {
                consecutive_no_progress += 1;
            } else {
                consecutive_no_progress = 0;
            }

            if consecutive_no_progress >= self.max_no_progress_iterations {
                return Err(Error::termination_guard(
                    self.label(),
                    format!(
                        "no placement progress for {} consecutive iterations on {src}->{dst}; check edge_select/max_flow_count/capacity",
                        self.max_no_progress_iterations
                    ),
                ));
            }

            if remaining <= MIN_FLOW {
                break;
            }

            let stalled_under_fixed_selection =
                meta.placed_flow <= MIN_FLOW && !capacity_aware && self.flow_placement == FlowPlacement::Proportional;

            if !stalled_under_fixed_selection {
                if self.flows.len() < self.max_flow_count.unwrap_or(usize::MAX) {
                    if let Some(new_idx) = self.try_create_flow(graph, src, dst, flow_class)? {
                        queue.push_back(new_idx);
                    }
                } else if capacity_aware {
                    self.reoptimize_flow_at(graph, idx)?;
                }
            }

            queue.push_back(idx);

            if window.len() >= self.diminishing_returns_window {
                let sum: f64 = window.iter().sum();
                let floor = MIN_FLOW.max(self.diminishing_returns_epsilon_frac * initial_request);
                if sum < floor {
                    break;
                }
            }
        }

        self.rebalance_equal_balanced(graph)?;
        if self.reoptimize_flows_on_each_placement {
            self.reoptimize(graph)?;
        }

        let placed_after: f64 = self.flows.iter().map(|f| f.placed_flow).sum();
        let total_placed = (placed_after - placed_before).max(0.0);
        let remaining = (volume - total_placed).max(0.0);
        if remaining > MIN_FLOW {
            tracing::warn!(remaining, "demand placement left unplaced volume after all flows attempted");
        }
        Ok((total_placed, remaining))
    }

    /// Remove every registered flow's assignment and re-place each at its
    /// current `placed_flow`, against current residual capacity (§4.5
    /// "Reoptimization of a flow", applied to the whole registry).
    pub fn reoptimize(&mut self, graph: &mut StrictMultiDiGraph) -> Result<()> {
        for idx in 0..self.flows.len() {
            self.reoptimize_flow_at(graph, idx)?;
        }
        Ok(())
    }

    /// Tear down every flow this policy has placed and reset the registry.
    pub fn clear(&mut self, graph: &mut StrictMultiDiGraph) {
        for f in self.flows.drain(..) {
            remove_flow_from_graph(graph, &f.id);
        }
        self.last_bundle = None;
    }

    /// Total volume currently placed across all registered flows.
    pub fn placed_volume(&self) -> f64 {
        self.flows.iter().map(|f| f.placed_flow).filter(|v| *v > MIN_FLOW).sum()
    }
}

/// Named presets matching common traffic-engineering policies (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPolicyConfig {
    /// Equal-cost multipath shortest paths, single flow (ECMP fan-out lives
    /// inside that flow's predecessor DAG).
    ShortestPathsEcmp,
    /// Weighted-cost multipath shortest paths, single flow.
    ShortestPathsWcmp,
    /// Traffic-engineered WCMP with no bound on path count.
    TeWcmpUnlimited,
    /// Traffic-engineered ECMP, bounded to 256 explicit LSPs.
    TeEcmpUpTo256Lsp,
    /// Traffic-engineered ECMP, bounded to 16 explicit LSPs.
    TeEcmp16Lsp,
}

impl FlowPolicyConfig {
    /// Build the concrete [`FlowPolicy`] this preset names.
    pub fn build(self) -> FlowPolicy {
        match self {
            FlowPolicyConfig::ShortestPathsEcmp => {
                let mut p = FlowPolicy::new(EdgeSelect::AllMinCost, FlowPlacement::EqualBalanced);
                p.min_flow_count = 1;
                p.max_flow_count = Some(1);
                p
            }
            FlowPolicyConfig::ShortestPathsWcmp => {
                let mut p = FlowPolicy::new(EdgeSelect::AllMinCost, FlowPlacement::Proportional);
                p.min_flow_count = 1;
                p.max_flow_count = Some(1);
                p
            }
            FlowPolicyConfig::TeWcmpUnlimited => {
                let mut p = FlowPolicy::new(
                    EdgeSelect::AllMinCostWithCapRemaining { select_value: None },
                    FlowPlacement::Proportional,
                );
                p.min_flow_count = 1;
                p.max_flow_count = None;
                p.reoptimize_flows_on_each_placement = true;
                p
            }
            FlowPolicyConfig::TeEcmpUpTo256Lsp => {
                let mut p = FlowPolicy::new(
                    EdgeSelect::SingleMinCostWithCapRemainingLoadFactored,
                    FlowPlacement::EqualBalanced,
                );
                p.min_flow_count = 1;
                p.max_flow_count = Some(256);
                p.reoptimize_flows_on_each_placement = true;
                p
            }
            FlowPolicyConfig::TeEcmp16Lsp => {
                let mut p = FlowPolicy::new(
                    EdgeSelect::SingleMinCostWithCapRemainingLoadFactored,
                    FlowPlacement::EqualBalanced,
                );
                p.min_flow_count = 16;
                p.max_flow_count = Some(16);
                p.reoptimize_flows_on_each_placement = true;
                p
            }
        }
    }
}

/// Factory mirroring the presets above, for callers that only have a preset
/// name (e.g. deserialized from config).
pub fn get_flow_policy(name: &str) -> Result<FlowPolicy> {
    let preset = match name {
        "SHORTEST_PATHS_ECMP" => FlowPolicyConfig::ShortestPathsEcmp,
        "SHORTEST_PATHS_WCMP" => FlowPolicyConfig::ShortestPathsWcmp,
        "TE_WCMP_UNLIM" => FlowPolicyConfig::TeWcmpUnlimited,
        "TE_ECMP_UP_TO_256_LSP" => FlowPolicyConfig::TeEcmpUpTo256Lsp,
        "TE_ECMP_16_LSP" => FlowPolicyConfig::TeEcmp16Lsp,
        other => return Err(Error::invalid_input(format!("unknown flow policy preset '{other}'"))),
    };
    Ok(preset.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::StrictMultiDiGraph;

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
    fn shortest_paths_ecmp_places_up_to_capacity() {
        let mut g = diamond();
        let mut policy = get_flow_policy("SHORTEST_PATHS_ECMP").unwrap();
        let (placed, remaining) = policy.place_demand(&mut g, "S", "T", "default", 15.0).unwrap();
        assert!((placed - 15.0).abs() < 1e-6);
        assert_eq!(remaining, 0.0);
        assert_eq!(policy.flow_count(), 1);
    }

    #[test]
    fn demand_beyond_capacity_leaves_remainder() {
        let mut g = diamond();
        let mut policy = get_flow_policy("SHORTEST_PATHS_WCMP").unwrap();
        let (placed, remaining) = policy.place_demand(&mut g, "S", "T", "default", 1000.0).unwrap();
        assert!((placed - 40.0).abs() < 1e-6);
        assert!(remaining > 0.0);
        assert_eq!(policy.flow_count(), 1);
    }

    #[test]
    fn te_policy_creates_bounded_lsp_count() {
        let mut g = diamond();
        let mut policy = get_flow_policy("TE_ECMP_16_LSP").unwrap();
        policy.place_demand(&mut g, "S", "T", "default", 10.0).unwrap();
        assert_eq!(policy.metrics().flows_created, 16);
        assert_eq!(policy.flow_count(), 16);
    }

    #[test]
    fn registry_is_reused_and_capped_across_rounds() {
        // Reproduces the scheduler calling place_demand repeatedly against
        // the same policy instance: the flow registry must stay capped at
        // max_flow_count rather than creating a fresh batch every round.
        let mut g = diamond();
        let mut policy = get_flow_policy("TE_ECMP_16_LSP").unwrap();
        for _ in 0..3 {
            policy.place_demand(&mut g, "S", "T", "default", 1.0).unwrap();
        }
        assert_eq!(policy.flow_count(), 16);
        assert_eq!(policy.metrics().flows_created, 16);
    }

    #[test]
    fn clear_removes_all_placed_flow() {
        let mut g = diamond();
        let mut policy = get_flow_policy("SHORTEST_PATHS_ECMP").unwrap();
        policy.place_demand(&mut g, "S", "T", "default", 10.0).unwrap();
        policy.clear(&mut g);
        for e in g.edges() {
            assert_eq!(e.flow_total, 0.0);
        }
        assert_eq!(policy.flow_count(), 0);
    }

    #[test]
    fn unknown_preset_is_invalid_input() {
        assert!(get_flow_policy("NOT_A_PRESET").is_err());
    }

    #[test]
    fn unreachable_destination_places_nothing_without_error() {
        let mut g = StrictMultiDiGraph::new();
        g.add_node("S").unwrap();
        g.add_node("T").unwrap();
        let mut policy = get_flow_policy("SHORTEST_PATHS_ECMP").unwrap();
        let (placed, remaining) = policy.place_demand(&mut g, "S", "T", "default", 5.0).unwrap();
        assert_eq!(placed, 0.0);
        assert_eq!(remaining, 5.0);
        assert_eq!(policy.flow_count(), 0);
    }

    #[test]
    fn persistent_no_progress_trips_termination_guard() {
        // A single bottleneck edge with a selector that refuses to create
        // more flows mid-demand: feed the policy a starved step count so
        // the no-progress guard, not the diminishing-returns cutoff, fires.
        let mut g = StrictMultiDiGraph::new();
        for n in ["S", "T"] {
            g.add_node(n).unwrap();
        }
        g.add_edge("S", "T", 5.0, 1.0).unwrap();
        let mut policy = FlowPolicy::new(EdgeSelect::AllMinCost, FlowPlacement::Proportional);
        policy.max_flow_count = Some(1);
        policy.max_no_progress_iterations = 2;
        policy.diminishing_returns_window = 100;
        let err = policy.place_demand(&mut g, "S", "T", "default", 1000.0).unwrap_err();
        assert!(matches!(err, Error::TerminationGuard { .. }));
    }
}
