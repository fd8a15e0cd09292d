//! Failure rules and policies (§4.7).
//!
//! A [`FailurePolicy`] holds a flat set of [`FailureRule`]s. Applying a
//! policy evaluates every rule against the network's nodes, links, and risk
//! groups and unions the results into one excluded-entity set, then expands
//! through shared-fate risk groups per the policy's expansion flags.

use std::collections::{HashMap, HashSet};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::graph::NodeId;
use crate::model::Network;

/// Comparison operator evaluated between an entity attribute and a rule value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// String/array attribute contains the rule value.
    Contains,
    /// String/array attribute does not contain the rule value.
    NotContains,
    /// Attribute is present, regardless of value.
    AnyValue,
    /// Attribute is absent.
    NoValue,
}

fn numeric(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn compare(attr: Option<&Value>, op: Operator, rule_value: Option<&Value>) -> bool {
    match op {
        Operator::AnyValue => attr.is_some(),
        Operator::NoValue => attr.is_none(),
        Operator::Eq => attr == rule_value,
        Operator::Ne => attr != rule_value,
        Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
            let (Some(a), Some(b)) = (attr.and_then(numeric), rule_value.and_then(numeric)) else { return false };
            match op {
                Operator::Lt => a < b,
                Operator::Le => a <= b,
                Operator::Gt => a > b,
                Operator::Ge => a >= b,
                _ => unreachable!(),
            }
        }
        Operator::Contains | Operator::NotContains => {
            let found = match (attr, rule_value) {
                (Some(Value::String(s)), Some(Value::String(needle))) => s.contains(needle.as_str()),
                (Some(Value::Array(items)), Some(needle)) => items.contains(needle),
                _ => false,
            };
            if op == Operator::Contains { found } else { !found }
        }
    }
}

/// One condition on an entity attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureCondition {
    /// Attribute name to inspect (`"name"`, `"disabled"`, or a key in `attrs`).
    pub attr: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Value to compare against; unused for `AnyValue`/`NoValue`.
    pub value: Option<Value>,
}

/// What kind of network entity a [`FailureRule`] scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityScope {
    /// Scan nodes.
    Node,
    /// Scan links.
    Link,
    /// Scan named risk groups.
    RiskGroup,
}

/// How matched candidates are reduced to the final excluded set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SelectionStrategy {
    /// Exclude every matched entity.
    All,
    /// Include each matched entity independently with the given probability.
    Random {
        /// Per-entity inclusion probability, in `[0, 1]`.
        probability: f64,
    },
    /// Exclude a random sample of the given size from the matches.
    Choice {
        /// Number of matched entities to exclude.
        count: usize,
    },
}

/// One rule: scan `scope` for entities matching every condition in `conditions`
/// (AND semantics), then reduce matches via `selection`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRule {
    /// Entity kind this rule scans.
    pub scope: EntityScope,
    /// Conditions an entity must satisfy to be a candidate (AND-combined).
    pub conditions: Vec<FailureCondition>,
    /// How candidates are reduced to the excluded set.
    pub selection: SelectionStrategy,
}

impl FailureRule {
    fn attr_value<'a>(&self, attr: &str, name: &'a str, disabled: bool, risk_groups: &HashSet<String>, attrs: &'a HashMap<String, Value>) -> Option<Value> {
        match attr {
            "name" => Some(Value::String(name.to_string())),
            "disabled" => Some(Value::Bool(disabled)),
            "risk_groups" => Some(Value::Array(risk_groups.iter().cloned().map(Value::String).collect())),
            other => attrs.get(other).cloned(),
        }
    }

    fn matches(&self, name: &str, disabled: bool, risk_groups: &HashSet<String>, attrs: &HashMap<String, Value>) -> bool {
        self.conditions.iter().all(|c| {
            let attr_val = self.attr_value(&c.attr, name, disabled, risk_groups, attrs);
            compare(attr_val.as_ref(), c.operator, c.value.as_ref())
        })
    }
}

/// A set of rules applied unconditionally every time the policy runs, plus
/// the shared-fate expansion flags (§3 "Failure policy: Set of rules").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePolicy {
    /// Rules evaluated on every application; results union across rules.
    pub rules: Vec<FailureRule>,
    /// Expand to every node/link sharing a failed risk-group tag.
    pub fail_risk_groups: bool,
    /// Expand failed risk groups to their transitive children (only takes
    /// effect for risk groups failed directly by a `RiskGroup`-scoped rule).
    pub fail_risk_group_children: bool,
}

impl FailurePolicy {
    /// A policy that runs `rules` with both risk-group expansions enabled,
    /// matching the common case of the original reference engine.
    pub fn single(rules: Vec<FailureRule>) -> Self {
        Self { rules, fail_risk_groups: true, fail_risk_group_children: true }
    }

    /// Apply this policy to `network` with a deterministic `seed`, returning
    /// the excluded node names and excluded link ids (§4.7 "Combine union
    /// across rules").
    pub fn apply_failures(&self, network: &Network, seed: u64) -> (HashSet<NodeId>, HashSet<String>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut excluded_nodes = HashSet::new();
        let mut excluded_links = HashSet::new();
        let mut failed_risk_groups = HashSet::new();

        for rule in &self.rules {
            match rule.scope {
                EntityScope::Node => {
                    let candidates: Vec<String> = network
                        .nodes
                        .values()
                        .filter(|n| rule.matches(&n.name, n.disabled, &n.risk_groups, &n.attrs))
                        .map(|n| n.name.clone())
                        .collect();
                    for name in select(&candidates, &rule.selection, &mut rng) {
                        if let Some(n) = network.nodes.get(&name) {
                            failed_risk_groups.extend(n.risk_groups.iter().cloned());
                        }
                        excluded_nodes.insert(name);
                    }
                }
                EntityScope::Link => {
                    let candidates: Vec<String> = network
                        .links
                        .values()
                        .filter(|l| rule.matches(&l.id, l.disabled, &l.risk_groups, &l.attrs))
                        .map(|l| l.id.clone())
                        .collect();
                    for id in select(&candidates, &rule.selection, &mut rng) {
                        if let Some(l) = network.links.get(&id) {
                            failed_risk_groups.extend(l.risk_groups.iter().cloned());
                        }
                        excluded_links.insert(id);
                    }
                }
                EntityScope::RiskGroup => {
                    let empty = HashSet::new();
                    let candidates: Vec<String> = network
                        .risk_groups
                        .values()
                        .filter(|g| rule.matches(&g.name, g.disabled, &empty, &HashMap::new()))
                        .map(|g| g.name.clone())
                        .collect();
                    failed_risk_groups.extend(select(&candidates, &rule.selection, &mut rng));
                }
            }
        }

        if self.fail_risk_group_children && !failed_risk_groups.is_empty() {
            failed_risk_groups = network.expand_risk_groups(&failed_risk_groups);
        }

        if self.fail_risk_groups && !failed_risk_groups.is_empty() {
            for node in network.nodes.values() {
                if node.risk_groups.iter().any(|g| failed_risk_groups.contains(g)) {
                    excluded_nodes.insert(node.name.clone());
                }
            }
            for link in network.links.values() {
                if link.risk_groups.iter().any(|g| failed_risk_groups.contains(g)) {
                    excluded_links.insert(link.id.clone());
                }
            }
        }

        (excluded_nodes, excluded_links)
    }
}

fn select(candidates: &[String], strategy: &SelectionStrategy, rng: &mut ChaCha8Rng) -> Vec<String> {
    match strategy {
        SelectionStrategy::All => candidates.to_vec(),
        SelectionStrategy::Random { probability } => {
            candidates.iter().filter(|_| rng.gen::<f64>() < probability.clamp(0.0, 1.0)).cloned().collect()
        }
        SelectionStrategy::Choice { count } => {
            let mut pool = candidates.to_vec();
            let mut chosen = Vec::new();
            let n = (*count).min(pool.len());
            for _ in 0..n {
                let idx = rng.gen_range(0..pool.len());
                chosen.push(pool.swap_remove(idx));
            }
            chosen
        }
    }
}

/// A named map of [`FailurePolicy`] instances, the unit typically loaded from
/// configuration alongside a [`crate::model::Network`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailurePolicySet {
    /// Policy name to policy.
    pub policies: HashMap<String, FailurePolicy>,
}

impl FailurePolicySet {
    /// Look up a policy by name.
    pub fn get(&self, name: &str) -> Result<&FailurePolicy> {
        self.policies.get(name).ok_or_else(|| Error::invalid_input(format!("unknown failure policy '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Link, Node, RiskGroup};

    fn network_with_risk_group() -> Network {
        let mut net = Network::new();
        let mut a = Node::new("A");
        a.risk_groups.insert("rack1".into());
        net.add_node(a).unwrap();
        net.add_node(Node::new("B")).unwrap();
        let mut l = Link::new("L1", "A", "B", 10.0, 1.0);
        l.risk_groups.insert("rack1".into());
        net.add_link(l).unwrap();
        net
    }

    #[test]
    fn single_node_rule_excludes_matching_node() {
        let net = network_with_risk_group();
        let policy = FailurePolicy::single(vec![FailureRule {
            scope: EntityScope::Node,
            conditions: vec![FailureCondition { attr: "name".into(), operator: Operator::Eq, value: Some(Value::String("A".into())) }],
            selection: SelectionStrategy::All,
        }]);
        let (nodes, links) = policy.apply_failures(&net, 42);
        assert!(nodes.contains("A"));
        // risk-group expansion should also pull in the co-located link.
        assert!(links.contains("L1"));
    }

    #[test]
    fn no_value_matches_absent_attribute() {
        let net = network_with_risk_group();
        let policy = FailurePolicy::single(vec![FailureRule {
            scope: EntityScope::Node,
            conditions: vec![FailureCondition { attr: "maintenance".into(), operator: Operator::NoValue, value: None }],
            selection: SelectionStrategy::All,
        }]);
        let (nodes, _) = policy.apply_failures(&net, 1);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn choice_selection_respects_count() {
        let net = network_with_risk_group();
        let policy = FailurePolicy::single(vec![FailureRule {
            scope: EntityScope::Node,
            conditions: vec![],
            selection: SelectionStrategy::Choice { count: 1 },
        }]);
        let (nodes, _) = policy.apply_failures(&net, 7);
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn unknown_policy_name_is_invalid_input() {
        let set = FailurePolicySet::default();
        assert!(set.get("missing").is_err());
    }

    #[test]
    fn multiple_rules_union_their_matches() {
        let net = network_with_risk_group();
        let policy = FailurePolicy {
            rules: vec![
                FailureRule {
                    scope: EntityScope::Node,
                    conditions: vec![FailureCondition { attr: "name".into(), operator: Operator::Eq, value: Some(Value::String("A".into())) }],
                    selection: SelectionStrategy::All,
                },
                FailureRule {
                    scope: EntityScope::Node,
                    conditions: vec![FailureCondition { attr: "name".into(), operator: Operator::Eq, value: Some(Value::String("B".into())) }],
                    selection: SelectionStrategy::All,
                },
            ],
            fail_risk_groups: false,
            fail_risk_group_children: false,
        };
        let (nodes, links) = policy.apply_failures(&net, 0);
        assert_eq!(nodes.len(), 2);
        assert!(links.is_empty(), "expansion disabled, so the risk-group-linked edge stays up");
    }

    #[test]
    fn risk_group_scope_fails_its_tagged_members() {
        let net = network_with_risk_group();
        let policy = FailurePolicy {
            rules: vec![FailureRule {
                scope: EntityScope::RiskGroup,
                conditions: vec![FailureCondition { attr: "name".into(), operator: Operator::Eq, value: Some(Value::String("rack1".into())) }],
                selection: SelectionStrategy::All,
            }],
            fail_risk_groups: true,
            fail_risk_group_children: false,
        };
        let (nodes, links) = policy.apply_failures(&net, 0);
        assert!(nodes.contains("A"));
        assert!(links.contains("L1"));
    }

    #[test]
    fn risk_group_children_expand_only_when_flag_set() {
        let mut net = network_with_risk_group();
        net.add_risk_group(RiskGroup { name: "rack1".into(), children: vec!["power1".into()], disabled: false }).unwrap();
        let mut c = Node::new("C");
        c.risk_groups.insert("power1".into());
        net.add_node(c).unwrap();

        let policy_without_children = FailurePolicy {
            rules: vec![FailureRule {
                scope: EntityScope::RiskGroup,
                conditions: vec![FailureCondition { attr: "name".into(), operator: Operator::Eq, value: Some(Value::String("rack1".into())) }],
                selection: SelectionStrategy::All,
            }],
            fail_risk_groups: true,
            fail_risk_group_children: false,
        };
        let (nodes, _) = policy_without_children.apply_failures(&net, 0);
        assert!(!nodes.contains("C"));

        let policy_with_children = FailurePolicy { fail_risk_group_children: true, ..policy_without_children };
        let (nodes, _) = policy_with_children.apply_failures(&net, 0);
        assert!(nodes.contains("C"));
    }
}
