//! Ambient network model (component C0): the concrete, owned representation
//! of a network that [`crate::graph::StrictMultiDiGraph`] instances are built
//! from, plus [`NetworkView`], a cheap borrowed-plus-exclusions handle used by
//! every Monte Carlo worker so iterations never clone the whole network.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::spf::{shortest_path_first, EdgeSelect, ExclusionSet};
use crate::graph::{flow, EdgeId, NodeId, StrictMultiDiGraph};
use crate::results::{FlowEntry, FlowSummary};
use crate::types::{Capacity, Cost, FlowPlacement};

/// Free-form attribute map, mirrored onto [`crate::graph::AttrMap`].
pub type AttrMap = HashMap<String, serde_json::Value>;

/// A network node before graph construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Node name, unique within a [`Network`].
    pub name: NodeId,
    /// Administratively disabled.
    pub disabled: bool,
    /// Risk-group tags.
    pub risk_groups: HashSet<String>,
    /// Free-form attributes.
    pub attrs: AttrMap,
}

impl Node {
    /// Construct a node with no tags or attributes.
    pub fn new(name: impl Into<NodeId>) -> Self {
        Self { name: name.into(), disabled: false, risk_groups: HashSet::new(), attrs: AttrMap::new() }
    }
}

/// A network link. Directed by default (one edge, `source -> target`); a
/// "bidirectional" link is realized by also adding the reverse edge with
/// identical capacity/cost, per §3 "A link is directed; a 'bidirectional'
/// link... is realized by adding a reverse link."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    /// Link identity, unique within a [`Network`].
    pub id: String,
    /// One endpoint.
    pub source: NodeId,
    /// The other endpoint.
    pub target: NodeId,
    /// Capacity in each direction.
    pub capacity: Capacity,
    /// Cost in each direction.
    pub cost: Cost,
    /// When true, a reverse `target -> source` edge is also realized.
    pub bidirectional: bool,
    /// Administratively disabled.
    pub disabled: bool,
    /// Risk-group tags.
    pub risk_groups: HashSet<String>,
    /// Free-form attributes.
    pub attrs: AttrMap,
}

impl Link {
    /// Construct a directed (one-way) link with no tags or attributes.
    pub fn new(id: impl Into<String>, source: impl Into<NodeId>, target: impl Into<NodeId>, capacity: Capacity, cost: Cost) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            capacity,
            cost,
            bidirectional: false,
            disabled: false,
            risk_groups: HashSet::new(),
            attrs: AttrMap::new(),
        }
    }

    /// Construct a bidirectional link (forward plus reverse edge).
    pub fn bidirectional(id: impl Into<String>, a: impl Into<NodeId>, b: impl Into<NodeId>, capacity: Capacity, cost: Cost) -> Self {
        Self { bidirectional: true, ..Self::new(id, a, b, capacity, cost) }
    }
}

/// A named shared-fate group: a physical or administrative grouping (duct,
/// rack, power domain) whose failure is applied as one event rather than
/// independently across its members (§4.7 risk-group expansion).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskGroup {
    /// Group name, unique within a [`Network`].
    pub name: String,
    /// Names of child risk groups nested under this one.
    pub children: Vec<String>,
    /// Administratively disabled (excludes every member transitively).
    pub disabled: bool,
}

impl RiskGroup {
    /// Construct a risk group with no children.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), children: Vec::new(), disabled: false }
    }
}

/// Owning container of nodes, links, and risk groups; the source of truth
/// that [`StrictMultiDiGraph`] instances are built from for each analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    /// Nodes, in insertion order.
    pub nodes: IndexMap<NodeId, Node>,
    /// Links, in insertion order.
    pub links: IndexMap<String, Link>,
    /// Risk groups, in insertion order.
    pub risk_groups: IndexMap<String, RiskGroup>,
}

impl Network {
    /// Construct an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, erroring on a duplicate name.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.name) {
            return Err(Error::invalid_input(format!("node '{}' already exists", node.name)));
        }
        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    /// Insert a link, erroring on a duplicate id or an unknown endpoint.
    pub fn add_link(&mut self, link: Link) -> Result<()> {
        if self.links.contains_key(&link.id) {
            return Err(Error::invalid_input(format!("link '{}' already exists", link.id)));
        }
        if !self.nodes.contains_key(&link.source) {
            return Err(Error::invalid_input(format!("unknown source node '{}'", link.source)));
        }
        if !self.nodes.contains_key(&link.target) {
            return Err(Error::invalid_input(format!("unknown target node '{}'", link.target)));
        }
        self.links.insert(link.id.clone(), link);
        Ok(())
    }

    /// Insert a risk group, erroring on a duplicate name.
    pub fn add_risk_group(&mut self, group: RiskGroup) -> Result<()> {
        if self.risk_groups.contains_key(&group.name) {
            return Err(Error::invalid_input(format!("risk group '{}' already exists", group.name)));
        }
        self.risk_groups.insert(group.name.clone(), group);
        Ok(())
    }

    /// Select node names whose name matches `pattern` (a regular expression).
    pub fn select_node_groups_by_path(&self, pattern: &str) -> Result<Vec<NodeId>> {
        let re = Regex::new(pattern)
            .map_err(|e| Error::invalid_input(format!("invalid node selection pattern: {e}")))?;
        Ok(self.nodes.keys().filter(|n| re.is_match(n)).cloned().collect())
    }

    /// Recursively expand a set of risk-group names into itself plus every
    /// transitively nested child group, via BFS over `children` (§4.7/§9).
    pub fn expand_risk_groups(&self, seeds: &HashSet<String>) -> HashSet<String> {
        let mut out = HashSet::new();
        let mut queue: VecDeque<String> = seeds.iter().cloned().collect();
        while let Some(name) = queue.pop_front() {
            if !out.insert(name.clone()) {
                continue;
            }
            if let Some(group) = self.risk_groups.get(&name) {
                for child in &group.children {
                    if !out.contains(child) {
                        queue.push_back(child.clone());
                    }
                }
            }
        }
        out
    }

    /// Build a [`StrictMultiDiGraph`] from every non-disabled node/link, plus
    /// a map from link id to its `(forward, reverse)` edge ids — `reverse` is
    /// `None` for a one-way link (§3: links are directed unless marked
    /// `bidirectional`).
    pub fn to_strict_multidigraph(&self) -> Result<(StrictMultiDiGraph, HashMap<String, (EdgeId, Option<EdgeId>)>)> {
        let mut g = StrictMultiDiGraph::new();
        for node in self.nodes.values() {
            g.add_node(node.name.clone())?;
        }
        let mut link_edges = HashMap::new();
        for link in self.links.values() {
            let (fwd, rev) = if link.bidirectional {
                let (fwd, rev) = g.add_bidirectional_edge(&link.source, &link.target, link.capacity, link.cost)?;
                (fwd, Some(rev))
            } else {
                (g.add_edge(&link.source, &link.target, link.capacity, link.cost)?, None)
            };
            for id in [Some(fwd), rev].into_iter().flatten() {
                let e = g.edge_mut(id).unwrap();
                e.disabled = link.disabled;
                e.risk_groups = link.risk_groups.clone();
                e.attrs = link.attrs.clone();
            }
            link_edges.insert(link.id.clone(), (fwd, rev));
        }
        for node in self.nodes.values() {
            if node.disabled {
                if let Some(n) = g.node_mut(&node.name) {
                    n.disabled = true;
                }
            }
        }
        Ok((g, link_edges))
    }
}

/// A borrowed [`Network`] plus a set of excluded nodes/links: the handle
/// every analysis function and Monte Carlo worker actually operates on, so
/// that iterating over failure scenarios never clones the network (§5).
pub struct NetworkView<'a> {
    network: &'a Network,
    excluded_nodes: HashSet<NodeId>,
    excluded_links: HashSet<String>,
}

impl<'a> NetworkView<'a> {
    /// A view with no exclusions.
    pub fn new(network: &'a Network) -> Self {
        Self { network, excluded_nodes: HashSet::new(), excluded_links: HashSet::new() }
    }

    /// A view excluding the given nodes and links.
    pub fn with_exclusions(network: &'a Network, excluded_nodes: HashSet<NodeId>, excluded_links: HashSet<String>) -> Self {
        Self { network, excluded_nodes, excluded_links }
    }

    fn build(&self) -> Result<(StrictMultiDiGraph, ExclusionSet)> {
        let (graph, link_edges) = self.network.to_strict_multidigraph()?;
        let mut exclusions = ExclusionSet::empty();
        exclusions.nodes = self.excluded_nodes.clone();
        for link_id in &self.excluded_links {
            if let Some((fwd, rev)) = link_edges.get(link_id) {
                exclusions.edges.insert(*fwd);
                if let Some(rev) = rev {
                    exclusions.edges.insert(*rev);
                }
            }
        }
        Ok((graph, exclusions))
    }

    /// Maximum feasible flow from `src` to `dst` under the current exclusions.
    pub fn max_flow(&self, src: &str, dst: &str, placement: FlowPlacement) -> Result<f64> {
        let (graph, exclusions) = self.build()?;
        if exclusions.nodes.contains(src) || exclusions.nodes.contains(dst) {
            return Ok(0.0);
        }
        let dag = shortest_path_first(&graph, src, &EdgeSelect::AllMinCostWithCapRemaining { select_value: None }, &exclusions)?;
        let (cap, _) = flow::calc_graph_capacity(&graph, src, dst, &dag, placement)?;
        Ok(cap)
    }

    /// Like [`Self::max_flow`], but also returns a [`FlowSummary`] wrapping the
    /// single `(src, dst)` pair (§4.9 `max_flow_with_summary`).
    pub fn max_flow_with_summary(&self, src: &str, dst: &str, placement: FlowPlacement) -> Result<(f64, FlowSummary)> {
        let placed = self.max_flow(src, dst, placement)?;
        let entry = FlowEntry::new(src, dst, f64::INFINITY, placed);
        let summary = FlowSummary::from_entries(std::slice::from_ref(&entry));
        Ok((placed, summary))
    }

    /// Per-component sensitivity scores for the `(src, dst)` max flow: for
    /// every non-excluded edge, the drop in max flow caused by additionally
    /// excluding that single edge (§4.9 `sensitivity_analysis`).
    pub fn sensitivity_analysis(&self, src: &str, dst: &str, placement: FlowPlacement) -> Result<HashMap<(NodeId, NodeId), f64>> {
        let baseline = self.max_flow(src, dst, placement)?;
        let (graph, base_exclusions) = self.build()?;
        let mut scores = HashMap::new();
        for edge in graph.edges() {
            if !base_exclusions.edges.contains(&edge.id) && !edge.disabled {
                let mut perturbed = base_exclusions.clone();
                perturbed.edges.insert(edge.id);
                let dag = shortest_path_first(&graph, src, &EdgeSelect::AllMinCostWithCapRemaining { select_value: None }, &perturbed)?;
                let (perturbed_flow, _) = flow::calc_graph_capacity(&graph, src, dst, &dag, placement)?;
                let drop = (baseline - perturbed_flow).max(0.0);
                scores.insert((edge.source.clone(), edge.target.clone()), drop);
            }
        }
        Ok(scores)
    }
}
