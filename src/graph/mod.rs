//! Strict multi-digraph (component C1).
//!
//! A parallel-edge directed graph keyed by opaque string node names with
//! monotonically increasing integer edge ids. This is the canonical graph
//! type the rest of the engine operates on: the capacity solver, SPF, and
//! placement all borrow it read-only or mutate it only through the flow
//! accounting helpers on [`EdgeData`]/[`NodeData`].
//!
//! ## Example
//!
//! ```rust
//! use netgraph_core::graph::StrictMultiDiGraph;
//!
//! let mut g = StrictMultiDiGraph::new();
//! g.add_node("A").unwrap();
//! g.add_node("B").unwrap();
//! let e = g.add_edge("A", "B", 10.0, 1.0).unwrap();
//! assert_eq!(g.edge(e).unwrap().capacity, 10.0);
//! ```

pub mod flow;
pub mod placement;
pub mod spf;

pub use crate::types::{Capacity, Cost, EdgeId, NodeId, Volume, MIN_CAP, MIN_FLOW};

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identity of a single flow within a graph: `(src, dst, flow_class, monotone_int)`.
///
/// `flow_class` is an arbitrary caller-supplied label (typically derived from
/// demand priority/identity); the trailing integer disambiguates multiple
/// flows created for the same `(src, dst, flow_class)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowId {
    /// Source node of the owning demand.
    pub src: NodeId,
    /// Destination node of the owning demand.
    pub dst: NodeId,
    /// Caller-supplied class label (e.g. priority bucket identity).
    pub flow_class: String,
    /// Monotone disambiguator, unique per policy instance.
    pub id: u64,
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}:{}:{}", self.src, self.dst, self.flow_class, self.id)
    }
}

/// Free-form attribute map attached to nodes and edges, mirroring the
/// reference implementation's untyped attribute dictionaries.
pub type AttrMap = HashMap<String, serde_json::Value>;

/// Per-edge data: endpoints, static attributes, and live flow accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeData {
    /// Stable id, unique and monotonically increasing within a graph instance.
    pub id: EdgeId,
    /// Source node name.
    pub source: NodeId,
    /// Target node name.
    pub target: NodeId,
    /// Maximum capacity.
    pub capacity: Capacity,
    /// Cost per unit flow.
    pub cost: Cost,
    /// Administratively disabled (excluded from all solving).
    pub disabled: bool,
    /// Risk-group tags (for failure-policy matching and shared-fate expansion).
    pub risk_groups: std::collections::HashSet<String>,
    /// Free-form attributes beyond the fields above.
    pub attrs: AttrMap,
    /// Aggregate placed flow, `0 <= flow_total <= capacity + MIN_FLOW`.
    pub flow_total: Volume,
    /// Per-flow-id contribution; `sum(flow_by_id.values()) == flow_total` within `MIN_FLOW`.
    pub flow_by_id: HashMap<FlowId, Volume>,
}

impl EdgeData {
    /// Residual (unused) capacity, never negative.
    pub fn residual(&self) -> Capacity {
        (self.capacity - self.flow_total).max(0.0)
    }

    /// Add `amount` of flow under `flow_id`, updating both the aggregate and
    /// the per-id contribution.
    pub fn add_flow(&mut self, flow_id: &FlowId, amount: Volume) {
        if amount.abs() < MIN_FLOW {
            return;
        }
        self.flow_total += amount;
        *self.flow_by_id.entry(flow_id.clone()).or_insert(0.0) += amount;
        if self.flow_by_id.get(flow_id).copied().unwrap_or(0.0).abs() < MIN_FLOW {
            self.flow_by_id.remove(flow_id);
        }
    }

    /// Remove all flow previously recorded under `flow_id`, returning the
    /// amount removed.
    pub fn remove_flow(&mut self, flow_id: &FlowId) -> Volume {
        if let Some(amount) = self.flow_by_id.remove(flow_id) {
            self.flow_total -= amount;
            if self.flow_total.abs() < MIN_FLOW {
                self.flow_total = 0.0;
            }
            amount
        } else {
            0.0
        }
    }
}

/// Per-node data: static attributes and aggregate flow accounting mirroring
/// the edge-level bookkeeping (§3: "node attribute maps carry the same
/// `flow`/`flows` pair for aggregation during placement").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    /// Node name (also the map key in [`StrictMultiDiGraph`]).
    pub name: NodeId,
    /// Administratively disabled.
    pub disabled: bool,
    /// Risk-group tags.
    pub risk_groups: std::collections::HashSet<String>,
    /// Free-form attributes.
    pub attrs: AttrMap,
    /// Aggregate outgoing placed flow across all owned flow ids.
    pub flow_total: Volume,
    /// Per-flow-id contribution at this node.
    pub flow_by_id: HashMap<FlowId, Volume>,
    out_edges: Vec<EdgeId>,
    in_edges: Vec<EdgeId>,
}

impl NodeData {
    fn new(name: NodeId) -> Self {
        Self {
            name,
            disabled: false,
            risk_groups: Default::default(),
            attrs: AttrMap::new(),
            flow_total: 0.0,
            flow_by_id: HashMap::new(),
            out_edges: Vec::new(),
            in_edges: Vec::new(),
        }
    }

    /// Outgoing edge ids, in insertion order.
    pub fn out_edges(&self) -> &[EdgeId] {
        &self.out_edges
    }

    /// Incoming edge ids, in insertion order.
    pub fn in_edges(&self) -> &[EdgeId] {
        &self.in_edges
    }

    fn add_flow(&mut self, flow_id: &FlowId, amount: Volume) {
        if amount.abs() < MIN_FLOW {
            return;
        }
        self.flow_total += amount;
        *self.flow_by_id.entry(flow_id.clone()).or_insert(0.0) += amount;
    }

    fn remove_flow(&mut self, flow_id: &FlowId) -> Volume {
        if let Some(amount) = self.flow_by_id.remove(flow_id) {
            self.flow_total -= amount;
            if self.flow_total.abs() < MIN_FLOW {
                self.flow_total = 0.0;
            }
            amount
        } else {
            0.0
        }
    }
}

/// A strict multi-digraph: parallel edges allowed, no implicit node creation,
/// monotonically increasing edge ids, cascading node removal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrictMultiDiGraph {
    nodes: IndexMap<NodeId, NodeData>,
    edges: HashMap<EdgeId, EdgeData>,
    next_edge_id: EdgeId,
}

impl StrictMultiDiGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Fails if a node with this name already exists.
    pub fn add_node(&mut self, name: impl Into<NodeId>) -> Result<()> {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(Error::invalid_input(format!("node '{name}' already exists")));
        }
        self.nodes.insert(name.clone(), NodeData::new(name));
        Ok(())
    }

    /// Insert a node if absent; no-op otherwise.
    pub fn ensure_node(&mut self, name: impl Into<NodeId>) {
        let name = name.into();
        self.nodes.entry(name.clone()).or_insert_with(|| NodeData::new(name));
    }

    /// Remove a node and every edge incident to it (incoming or outgoing).
    pub fn remove_node(&mut self, name: &str) -> Result<()> {
        let node = self
            .nodes
            .shift_remove(name)
            .ok_or_else(|| Error::invalid_input(format!("node '{name}' does not exist")))?;
        let mut to_remove: Vec<EdgeId> = node.out_edges.clone();
        to_remove.extend(node.in_edges.iter().copied());
        for eid in to_remove {
            let _ = self.remove_edge_by_id(eid);
        }
        Ok(())
    }

    /// Add a directed edge. Endpoints must already exist. Returns the new edge id.
    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        capacity: Capacity,
        cost: Cost,
    ) -> Result<EdgeId> {
        if !self.nodes.contains_key(source) {
            return Err(Error::invalid_input(format!("unknown source node '{source}'")));
        }
        if !self.nodes.contains_key(target) {
            return Err(Error::invalid_input(format!("unknown target node '{target}'")));
        }
        let id = self.next_edge_id;
        self.next_edge_id = self
            .next_edge_id
            .checked_add(1)
            .ok_or_else(|| Error::Overflow("edge id counter overflowed".into()))?;

        let edge = EdgeData {
            id,
            source: source.to_string(),
            target: target.to_string(),
            capacity,
            cost,
            disabled: false,
            risk_groups: Default::default(),
            attrs: AttrMap::new(),
            flow_total: 0.0,
            flow_by_id: HashMap::new(),
        };
        self.nodes.get_mut(source).unwrap().out_edges.push(id);
        self.nodes.get_mut(target).unwrap().in_edges.push(id);
        self.edges.insert(id, edge);
        Ok(id)
    }

    /// Convenience: add both `a->b` and `b->a` with identical capacity/cost,
    /// realizing a "bidirectional link" per §3. Returns `(forward, reverse)` ids.
    pub fn add_bidirectional_edge(
        &mut self,
        a: &str,
        b: &str,
        capacity: Capacity,
        cost: Cost,
    ) -> Result<(EdgeId, EdgeId)> {
        let fwd = self.add_edge(a, b, capacity, cost)?;
        let rev = self.add_edge(b, a, capacity, cost)?;
        Ok((fwd, rev))
    }

    /// Remove an edge by id.
    pub fn remove_edge_by_id(&mut self, id: EdgeId) -> Result<EdgeData> {
        let edge = self
            .edges
            .remove(&id)
            .ok_or_else(|| Error::invalid_input(format!("edge id {id} does not exist")))?;
        if let Some(n) = self.nodes.get_mut(&edge.source) {
            n.out_edges.retain(|&e| e != id);
        }
        if let Some(n) = self.nodes.get_mut(&edge.target) {
            n.in_edges.retain(|&e| e != id);
        }
        Ok(edge)
    }

    /// Whether an edge id currently exists.
    pub fn has_edge_by_id(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    /// Borrow an edge by id.
    pub fn edge(&self, id: EdgeId) -> Option<&EdgeData> {
        self.edges.get(&id)
    }

    /// Mutably borrow an edge by id.
    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut EdgeData> {
        self.edges.get_mut(&id)
    }

    /// Borrow a node by name.
    pub fn node(&self, name: &str) -> Option<&NodeData> {
        self.nodes.get(name)
    }

    /// Mutably borrow a node by name.
    pub fn node_mut(&mut self, name: &str) -> Option<&mut NodeData> {
        self.nodes.get_mut(name)
    }

    /// Whether a node exists.
    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// All node names, in insertion order.
    pub fn node_names(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.nodes.values()
    }

    /// All edges, in arbitrary order.
    pub fn edges(&self) -> impl Iterator<Item = &EdgeData> {
        self.edges.values()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Parallel edges from `source` to `target` (ignoring disabled state).
    pub fn edges_between(&self, source: &str, target: &str) -> Vec<EdgeId> {
        match self.nodes.get(source) {
            None => Vec::new(),
            Some(n) => n
                .out_edges
                .iter()
                .copied()
                .filter(|&e| self.edges.get(&e).map(|ed| ed.target == target).unwrap_or(false))
                .collect(),
        }
    }

    /// Record `amount` of flow under `flow_id` on `edge_id`, mirroring the
    /// update onto the edge's source node per §3/§4.4.
    pub fn place_on_edge(&mut self, edge_id: EdgeId, flow_id: &FlowId, amount: Volume) {
        let source = match self.edges.get_mut(&edge_id) {
            Some(e) => {
                e.add_flow(flow_id, amount);
                e.source.clone()
            }
            None => return,
        };
        if let Some(n) = self.nodes.get_mut(&source) {
            n.add_flow(flow_id, amount);
        }
    }

    /// Remove all flow previously placed under `flow_id` on `edge_id`.
    pub fn unplace_from_edge(&mut self, edge_id: EdgeId, flow_id: &FlowId) -> Volume {
        let (source, amount) = match self.edges.get_mut(&edge_id) {
            Some(e) => (e.source.clone(), e.remove_flow(flow_id)),
            None => return 0.0,
        };
        if let Some(n) = self.nodes.get_mut(&source) {
            n.remove_flow(flow_id);
        }
        amount
    }

    /// Zero every edge's and node's flow accounting. Used by `reset_all_flow_usages`.
    pub fn reset_all_flow_usages(&mut self) {
        for edge in self.edges.values_mut() {
            edge.flow_total = 0.0;
            edge.flow_by_id.clear();
        }
        for node in self.nodes.values_mut() {
            node.flow_total = 0.0;
            node.flow_by_id.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StrictMultiDiGraph {
        let mut g = StrictMultiDiGraph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        g.add_edge("A", "B", 10.0, 1.0).unwrap();
        g
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut g = sample();
        assert!(g.add_node("A").is_err());
    }

    #[test]
    fn edge_to_missing_endpoint_rejected() {
        let mut g = sample();
        assert!(g.add_edge("A", "Z", 1.0, 1.0).is_err());
    }

    #[test]
    fn edge_ids_monotonic() {
        let mut g = sample();
        let e1 = g.add_edge("A", "B", 1.0, 1.0).unwrap();
        let e2 = g.add_edge("A", "B", 1.0, 1.0).unwrap();
        assert!(e2 > e1);
    }

    #[test]
    fn remove_node_cascades_to_edges() {
        let mut g = sample();
        let edges_before = g.edge_count();
        assert_eq!(edges_before, 1);
        g.remove_node("A").unwrap();
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn place_and_unplace_roundtrip() {
        let mut g = sample();
        let eid = g.edges_between("A", "B")[0];
        let fid = FlowId { src: "A".into(), dst: "B".into(), flow_class: "x".into(), id: 0 };
        g.place_on_edge(eid, &fid, 4.0);
        assert_eq!(g.edge(eid).unwrap().flow_total, 4.0);
        assert_eq!(g.node("A").unwrap().flow_total, 4.0);
        g.unplace_from_edge(eid, &fid);
        assert_eq!(g.edge(eid).unwrap().flow_total, 0.0);
        assert_eq!(g.node("A").unwrap().flow_total, 0.0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut g = sample();
        let eid = g.edges_between("A", "B")[0];
        let fid = FlowId { src: "A".into(), dst: "B".into(), flow_class: "x".into(), id: 0 };
        g.place_on_edge(eid, &fid, 4.0);
        g.reset_all_flow_usages();
        assert_eq!(g.edge(eid).unwrap().flow_total, 0.0);
        assert!(g.edge(eid).unwrap().flow_by_id.is_empty());
    }
}
