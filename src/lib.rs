//! # netgraph-core
//!
//! Network capacity-planning and reliability-analysis engine: a strict
//! multi-digraph model, a max-flow/ECMP/WCMP capacity solver, a FlowPolicy
//! demand-placement layer, a failure-policy and Monte Carlo reliability
//! engine, and a Maximum Supported Demand bisection search.
//!
//! ## Modules
//!
//! - [`graph`] - strict multi-digraph, SPF + edge selectors, capacity solver, placement
//! - [`flows`] - flow identity, path bundles, FlowPolicy
//! - [`demand`] - traffic demands, matrices, and the demand-placement scheduler
//! - [`failure`] - failure policies/rules and the Monte Carlo failure manager
//! - [`montecarlo`] - convenience analyses (max-flow, demand-placement, sensitivity)
//! - [`msd`] - Maximum Supported Demand bisection search
//! - [`model`] - ambient network model (nodes, links, risk groups, network views)
//! - [`results`] - serializable result shapes shared across analyses
//!
//! ## Quick start
//!
//! ```rust
//! use netgraph_core::graph::{StrictMultiDiGraph, spf, flow};
//! use netgraph_core::types::FlowPlacement;
//!
//! let mut g = StrictMultiDiGraph::new();
//! g.add_node("A").unwrap();
//! g.add_node("B").unwrap();
//! g.add_edge("A", "B", 10.0, 1.0).unwrap();
//!
//! let dag = spf::shortest_path_first(&g, "A", &spf::EdgeSelect::AllMinCost, &spf::ExclusionSet::empty()).unwrap();
//! let (capacity, _fractions) = flow::calc_graph_capacity(&g, "A", "B", &dag, FlowPlacement::Proportional).unwrap();
//! assert_eq!(capacity, 10.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod demand;
pub mod failure;
pub mod flows;
pub mod graph;
pub mod model;
pub mod montecarlo;
pub mod msd;
pub mod results;

mod error;
mod types;

pub use error::{Error, Result};
pub use types::*;

/// Common imports for applications embedding this engine.
pub mod prelude {
    pub use crate::demand::{Demand, TrafficDemand, TrafficManager, TrafficMatrixSet};
    pub use crate::failure::{FailureManager, FailurePolicy, FailurePolicySet};
    pub use crate::flows::{FlowPolicy, FlowPolicyConfig};
    pub use crate::graph::{EdgeId, NodeId, StrictMultiDiGraph};
    pub use crate::model::{Link, Network, NetworkView, Node, RiskGroup};
    pub use crate::msd::MsdSearch;
    pub use crate::Error;
    pub use crate::Result;
}
