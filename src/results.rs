//! Serializable result shapes shared across analyses (component C10, §6).
//!
//! These types carry no behavior beyond simple aggregation helpers; they
//! exist so that [`crate::montecarlo`], [`crate::failure`], and [`crate::msd`]
//! all hand back the same JSON-friendly shapes regardless of which analysis
//! produced them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::graph::{EdgeId, NodeId};

/// A single source/destination flow result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEntry {
    /// Source node (or combined pseudo-endpoint name).
    pub source: NodeId,
    /// Destination node (or combined pseudo-endpoint name).
    pub destination: NodeId,
    /// Requested volume, possibly `f64::INFINITY` for a pure max-flow probe.
    pub requested: f64,
    /// Volume actually placed.
    pub placed: f64,
    /// `placed / requested`, or `1.0` when nothing was requested.
    pub ratio: f64,
}

impl FlowEntry {
    /// Construct an entry, deriving `ratio` from `placed`/`requested`.
    pub fn new(source: impl Into<NodeId>, destination: impl Into<NodeId>, requested: f64, placed: f64) -> Self {
        let ratio = if requested.is_finite() && requested > 0.0 {
            placed / requested
        } else if placed > 0.0 {
            1.0
        } else {
            0.0
        };
        Self { source: source.into(), destination: destination.into(), requested, placed, ratio }
    }
}

/// Aggregate across a set of [`FlowEntry`] values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FlowSummary {
    /// Total requested volume across all entries.
    pub total_requested: f64,
    /// Total placed volume across all entries.
    pub total_placed: f64,
    /// Number of entries with `placed == 0.0`.
    pub dropped_flows: usize,
    /// `total_placed / total_requested`, or `1.0` when nothing was requested.
    pub overall_ratio: f64,
}

impl FlowSummary {
    /// Summarize a slice of flow entries.
    pub fn from_entries(entries: &[FlowEntry]) -> Self {
        let total_requested: f64 = entries.iter().map(|e| e.requested).filter(|r| r.is_finite()).sum();
        let total_placed: f64 = entries.iter().map(|e| e.placed).sum();
        let dropped_flows = entries.iter().filter(|e| e.placed <= 0.0).count();
        let overall_ratio = if total_requested > 0.0 { total_placed / total_requested } else { 1.0 };
        Self { total_requested, total_placed, dropped_flows, overall_ratio }
    }
}

/// Per-iteration metrics accumulated from every demand's `FlowPolicy` during a
/// single demand-placement pass (§4.9 `demand_placement_analysis`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IterationMetrics {
    /// Total SPF invocations across all demands this iteration.
    pub spf_calls_total: u64,
    /// Total flow objects created across all demands this iteration.
    pub flows_created_total: u64,
    /// Total reoptimization passes across all demands this iteration.
    pub reopt_calls_total: u64,
    /// Total placement rounds across all demands this iteration.
    pub place_iterations_total: u64,
}

/// One realized failure/exclusion pattern and every iteration index that
/// mapped to it (§4.8 deduplication).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRecord {
    /// `blake2s`-derived id of this pattern (or `"baseline"` for iteration 0).
    pub failure_id: String,
    /// Node names excluded under this pattern.
    pub excluded_nodes: Vec<NodeId>,
    /// Edge ids excluded under this pattern.
    pub excluded_edges: Vec<EdgeId>,
    /// Iteration indices this pattern was reused for.
    pub iterations: Vec<usize>,
}

/// Result of one Monte Carlo analysis run (§4.8/§4.9): per-iteration results,
/// the deduplicated failure patterns, and run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult<T> {
    /// One result per iteration, in iteration order (index 0 is the baseline
    /// when `include_baseline` was set).
    pub results: Vec<T>,
    /// Deduplicated failure/exclusion patterns actually evaluated.
    pub failure_patterns: Vec<PatternRecord>,
    /// Free-form run metadata (iteration count, seed, parallelism, policy name).
    pub metadata: HashMap<String, serde_json::Value>,
}
