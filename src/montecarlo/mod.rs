//! Convenience analyses layered on top of [`crate::model::NetworkView`] and
//! [`crate::demand::TrafficManager`] (component C9, §4.9). These are the
//! closures typically handed to
//! [`crate::failure::FailureManager::run_monte_carlo_analysis`].

use crate::demand::{TrafficDemand, TrafficManager};
use crate::error::Result;
use crate::graph::NodeId;
use crate::model::{Network, NetworkView};
use crate::results::{FlowEntry, FlowSummary, IterationMetrics};
use crate::types::FlowPlacement;

/// Compute max flow for every `(src, dst)` pair under the view's current
/// exclusions, returning one [`FlowEntry`] per pair plus an aggregate summary.
pub fn max_flow_analysis(view: &NetworkView<'_>, pairs: &[(NodeId, NodeId)], placement: FlowPlacement) -> Result<(Vec<FlowEntry>, FlowSummary)> {
    let mut entries = Vec::with_capacity(pairs.len());
    for (src, dst) in pairs {
        let placed = view.max_flow(src, dst, placement)?;
        entries.push(FlowEntry::new(src.clone(), dst.clone(), f64::INFINITY, placed));
    }
    let summary = FlowSummary::from_entries(&entries);
    Ok((entries, summary))
}

/// Build a graph from `network`, expand `matrix` into demands, and place
/// them all, returning per-pair placement results plus aggregated
/// `FlowPolicy` metrics across every demand (§4.9 `demand_placement_analysis`).
pub fn demand_placement_analysis(network: &Network, matrix: &[TrafficDemand]) -> Result<(Vec<FlowEntry>, IterationMetrics)> {
    let mut tm = TrafficManager::new(network)?;
    tm.expand_demands(matrix)?;
    tm.place_all_demands()?;

    let entries = tm
        .demands()
        .iter()
        .map(|d| FlowEntry::new(d.src.clone(), d.dst.clone(), d.volume, d.placed))
        .collect();

    let mut metrics = IterationMetrics::default();
    for d in tm.demands() {
        let m = d.flow_policy.metrics();
        metrics.spf_calls_total += m.spf_calls;
        metrics.flows_created_total += m.flows_created;
        metrics.reopt_calls_total += m.reopt_calls;
        metrics.place_iterations_total += m.place_iterations;
    }

    Ok((entries, metrics))
}

/// Per-edge sensitivity scores for the `(src, dst)` max flow under the view's
/// current exclusions (§4.9 `sensitivity_analysis`): thin pass-through to
/// [`NetworkView::sensitivity_analysis`], kept here so every convenience
/// analysis has one home module.
pub fn sensitivity_analysis(view: &NetworkView<'_>, src: &str, dst: &str, placement: FlowPlacement) -> Result<std::collections::HashMap<(NodeId, NodeId), f64>> {
    view.sensitivity_analysis(src, dst, placement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Link, Node};
    use crate::types::GroupMode;

    fn sample_network() -> Network {
        let mut net = Network::new();
        for n in ["A", "B", "C"] {
            net.add_node(Node::new(n)).unwrap();
        }
        net.add_link(Link::new("L1", "A", "B", 10.0, 1.0)).unwrap();
        net.add_link(Link::new("L2", "B", "C", 6.0, 1.0)).unwrap();
        net
    }

    #[test]
    fn max_flow_analysis_reports_bottleneck() {
        let net = sample_network();
        let view = NetworkView::new(&net);
        let (entries, summary) = max_flow_analysis(&view, &[("A".into(), "C".into())], FlowPlacement::Proportional).unwrap();
        assert_eq!(entries.len(), 1);
        assert!((entries[0].placed - 6.0).abs() < 1e-9);
        assert!((summary.total_placed - 6.0).abs() < 1e-9);
    }

    #[test]
    fn demand_placement_analysis_aggregates_metrics() {
        let net = sample_network();
        let matrix = vec![TrafficDemand {
            source_pattern: "^A$".into(),
            sink_pattern: "^C$".into(),
            volume: 4.0,
            priority: 0,
            mode: GroupMode::Combine,
            flow_policy: "SHORTEST_PATHS_ECMP".into(),
        }];
        let (entries, metrics) = demand_placement_analysis(&net, &matrix).unwrap();
        assert_eq!(entries.len(), 1);
        assert!((entries[0].placed - 4.0).abs() < 1e-9);
        assert!(metrics.spf_calls_total >= 1);
        assert!(metrics.flows_created_total >= 1);
    }

    #[test]
    fn sensitivity_analysis_flags_bottleneck_link() {
        let net = sample_network();
        let view = NetworkView::new(&net);
        let scores = sensitivity_analysis(&view, "A", "C", FlowPlacement::Proportional).unwrap();
        let bc_drop = scores.get(&("B".to_string(), "C".to_string())).copied().unwrap_or(0.0);
        assert!(bc_drop > 0.0);
    }
}
