//! Common scalar types and numeric constants used across the engine.

use serde::{Deserialize, Serialize};

/// Capacity, cost, and flow volume are all non-negative floating point in this engine.
pub type Capacity = f64;
/// See [`Capacity`].
pub type Cost = f64;
/// See [`Capacity`].
pub type Volume = f64;

/// Node identity: an opaque hashable name, typically a string.
pub type NodeId = String;

/// Stable identifier for an edge, assigned monotonically on insertion.
pub type EdgeId = u64;

/// Residual capacities and flow magnitudes below this threshold are treated as
/// zero by the capacity solver, placement, and FlowPolicy alike. Must be shared
/// by every numeric comparison in the hot path to avoid oscillation between
/// components that disagree on what counts as "no capacity left".
pub const MIN_CAP: f64 = 1e-10;

/// Flow magnitudes below this threshold are treated as zero. Kept numerically
/// equal to [`MIN_CAP`]; spec'd as a distinct constant because the two guard
/// conceptually different quantities (residual capacity vs. flow placed).
pub const MIN_FLOW: f64 = 1e-10;

/// Placement strategy used by the capacity solver and FlowPolicy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowPlacement {
    /// Weighted-ECMP: traffic splits proportionally to residual capacity on tied paths.
    Proportional,
    /// ECMP: traffic splits equally across parallel edges/paths regardless of capacity.
    EqualBalanced,
}

impl Default for FlowPlacement {
    fn default() -> Self {
        Self::Proportional
    }
}

/// Endpoint-group expansion mode for regex-matched source/sink groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupMode {
    /// Aggregate every matched node into a single pseudo-endpoint.
    Combine,
    /// Emit one demand/flow per ordered pair of matched nodes.
    Pairwise,
}

impl Default for GroupMode {
    fn default() -> Self {
        Self::Combine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_placement_is_proportional() {
        assert_eq!(FlowPlacement::default(), FlowPlacement::Proportional);
    }

    #[test]
    fn min_cap_and_min_flow_match() {
        assert_eq!(MIN_CAP, MIN_FLOW);
    }
}
