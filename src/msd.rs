//! Maximum Supported Demand search (component C9, §4.9 `msd.rs`).
//!
//! Finds the largest scaling factor `alpha` such that every demand in a
//! traffic matrix can be fully placed (the "hard" feasibility rule: every
//! OD pair reaches `placed / requested >= 1 - epsilon`). The search first
//! brackets a feasible/infeasible `alpha` interval by geometric growth or
//! shrink from `alpha_start`, then bisects within the bracket until the
//! interval width is at most `resolution`.

use tracing::{debug, info};

use crate::demand::{Demand, TrafficDemand, TrafficManager};
use crate::error::{Error, Result};
use crate::model::Network;

const FEASIBILITY_EPSILON: f64 = 1e-12;

/// Search parameters for [`MsdSearch`].
#[derive(Debug, Clone, Copy)]
pub struct MsdConfig {
    /// Initial alpha guess.
    pub alpha_start: f64,
    /// Geometric growth/shrink factor used while bracketing; must be `> 1.0`.
    pub growth_factor: f64,
    /// Lower bound alpha may shrink to while bracketing.
    pub alpha_min: f64,
    /// Upper bound alpha may grow to while bracketing.
    pub alpha_max: f64,
    /// Bisection stops once `right - left <= resolution`.
    pub resolution: f64,
    /// Growth/shrink step cap during bracketing.
    pub max_bracket_iters: usize,
    /// Bisection step cap.
    pub max_bisect_iters: usize,
    /// Repeated placements per alpha; alpha is feasible if a majority of
    /// seeds satisfy the rule (deterministic policies yield identical
    /// results across seeds, so this only matters for randomized policies).
    pub seeds_per_alpha: usize,
}

impl Default for MsdConfig {
    fn default() -> Self {
        Self {
            alpha_start: 1.0,
            growth_factor: 2.0,
            alpha_min: 1e-6,
            alpha_max: 1e9,
            resolution: 0.01,
            max_bracket_iters: 32,
            max_bisect_iters: 32,
            seeds_per_alpha: 1,
        }
    }
}

impl MsdConfig {
    fn validate(&self) -> Result<()> {
        if self.seeds_per_alpha < 1 {
            return Err(Error::invalid_input("seeds_per_alpha must be >= 1"));
        }
        if self.growth_factor <= 1.0 {
            return Err(Error::invalid_input("growth_factor must be > 1.0"));
        }
        if self.resolution <= 0.0 {
            return Err(Error::invalid_input("resolution must be positive"));
        }
        Ok(())
    }
}

/// One alpha probe: whether it was feasible, and how many of its seeds agreed.
#[derive(Debug, Clone, Copy)]
pub struct ProbeRecord {
    /// Scaling factor tested.
    pub alpha: f64,
    /// Majority-vote feasibility at this alpha.
    pub feasible: bool,
    /// Number of seeds evaluated.
    pub seeds: usize,
    /// Number of seeds that were individually feasible.
    pub feasible_seeds: usize,
    /// Minimum per-demand placement ratio observed across seeds.
    pub min_placement_ratio: f64,
}

/// Final search outcome.
#[derive(Debug, Clone)]
pub struct MsdResult {
    /// Largest alpha found feasible, to within `resolution`.
    pub alpha_star: f64,
    /// Every alpha probed, in evaluation order.
    pub probes: Vec<ProbeRecord>,
}

/// Runs the bracket-then-bisect Maximum Supported Demand search for a base
/// traffic matrix against a network.
pub struct MsdSearch<'a> {
    network: &'a Network,
    base_demands: &'a [TrafficDemand],
    config: MsdConfig,
}

impl<'a> MsdSearch<'a> {
    /// Construct a search; validates `config` eagerly so misconfiguration
    /// fails before any placement work runs.
    pub fn new(network: &'a Network, base_demands: &'a [TrafficDemand], config: MsdConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { network, base_demands, config })
    }

    fn scaled_matrix(&self, alpha: f64) -> Vec<TrafficDemand> {
        self.base_demands
            .iter()
            .map(|d| TrafficDemand {
                source_pattern: d.source_pattern.clone(),
                sink_pattern: d.sink_pattern.clone(),
                volume: d.volume * alpha,
                priority: d.priority,
                mode: d.mode,
                flow_policy: d.flow_policy.clone(),
            })
            .collect()
    }

    fn ratios(demands: &[Demand]) -> Vec<f64> {
        demands
            .iter()
            .map(|d| if d.volume == 0.0 { 1.0 } else { d.placed / d.volume })
            .collect()
    }

    /// Evaluate feasibility at `alpha`, running `seeds_per_alpha` independent
    /// placements and taking the majority vote (§"Evaluate starting alpha").
    fn evaluate_alpha(&self, alpha: f64) -> Result<ProbeRecord> {
        let matrix = self.scaled_matrix(alpha);
        let mut tm = TrafficManager::new(self.network)?;
        tm.expand_demands(&matrix)?;

        let mut feasible_seeds = 0usize;
        let mut min_ratio = 1.0f64;

        for _ in 0..self.config.seeds_per_alpha {
            tm.reset_all_flow_usages();
            tm.expand_demands(&matrix)?;
            tm.place_all_demands()?;

            let ratios = Self::ratios(tm.demands());
            let seed_min = ratios.iter().cloned().fold(1.0, f64::min);
            let seed_feasible = ratios.iter().all(|&r| r >= 1.0 - FEASIBILITY_EPSILON);

            if seed_feasible {
                feasible_seeds += 1;
            }
            min_ratio = min_ratio.min(seed_min);
        }

        let required = self.config.seeds_per_alpha / 2 + 1;
        let feasible = feasible_seeds >= required;

        debug!(alpha, feasible, feasible_seeds, min_ratio, "msd probe");

        Ok(ProbeRecord { alpha, feasible, seeds: self.config.seeds_per_alpha, feasible_seeds, min_placement_ratio: min_ratio })
    }

    /// Run the full bracket-then-bisect search.
    pub fn run(&self) -> Result<MsdResult> {
        let cfg = self.config;
        info!(alpha_start = cfg.alpha_start, growth = cfg.growth_factor, seeds = cfg.seeds_per_alpha, "starting msd analysis");

        let mut probes = Vec::new();
        let mut probe = |alpha: f64, probes: &mut Vec<ProbeRecord>| -> Result<bool> {
            let record = self.evaluate_alpha(alpha)?;
            let feasible = record.feasible;
            probes.push(record);
            Ok(feasible)
        };

        let start_alpha = cfg.alpha_start;
        let feasible0 = probe(start_alpha, &mut probes)?;

        let mut lower: Option<f64> = None;
        let mut upper: Option<f64> = None;

        if feasible0 {
            lower = Some(start_alpha);
            let mut alpha = start_alpha;
            for _ in 0..cfg.max_bracket_iters {
                let next = (alpha * cfg.growth_factor).min(cfg.alpha_max);
                if next == lower.unwrap() {
                    break;
                }
                alpha = next;
                let feas = probe(alpha, &mut probes)?;
                if !feas {
                    upper = Some(alpha);
                    break;
                }
                lower = Some(alpha);
            }
            if upper.is_none() {
                upper = Some(cfg.alpha_max.min(lower.unwrap() + cfg.resolution.max(1.0)));
            }
        } else {
            upper = Some(start_alpha);
            let mut alpha = start_alpha;
            for _ in 0..cfg.max_bracket_iters {
                let next = (alpha / cfg.growth_factor).max(cfg.alpha_min);
                if next == upper.unwrap() {
                    break;
                }
                alpha = next;
                let feas = probe(alpha, &mut probes)?;
                if feas {
                    lower = Some(alpha);
                    break;
                }
                upper = Some(alpha);
            }
            if lower.is_none() {
                return Err(Error::no_bracket_found("no feasible alpha found above alpha_min"));
            }
        }

        let mut left = lower.unwrap();
        let mut right = upper.unwrap();
        let mut iters = 0;
        while (right - left) > cfg.resolution && iters < cfg.max_bisect_iters {
            let mid = (left + right) / 2.0;
            let feas = probe(mid, &mut probes)?;
            if feas {
                left = mid;
            } else {
                right = mid;
            }
            iters += 1;
        }

        info!(alpha_star = left, probes = probes.len(), bisect_iters = iters, "msd analysis complete");

        Ok(MsdResult { alpha_star: left, probes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Link, Node};
    use crate::types::GroupMode;

    fn linear_network(capacity: f64) -> Network {
        let mut net = Network::new();
        for n in ["A", "B"] {
            net.add_node(Node::new(n)).unwrap();
        }
        net.add_link(Link::new("L1", "A", "B", capacity, 1.0)).unwrap();
        net
    }

    fn base_matrix(volume: f64) -> Vec<TrafficDemand> {
        vec![TrafficDemand {
            source_pattern: "^A$".into(),
            sink_pattern: "^B$".into(),
            volume,
            priority: 0,
            mode: GroupMode::Combine,
            flow_policy: "SHORTEST_PATHS_ECMP".into(),
        }]
    }

    #[test]
    fn finds_alpha_star_near_capacity_ratio() {
        let net = linear_network(10.0);
        let matrix = base_matrix(1.0);
        let search = MsdSearch::new(&net, &matrix, MsdConfig { resolution: 0.05, ..Default::default() }).unwrap();
        let result = search.run().unwrap();
        // Capacity 10 / demand 1 means alpha_star should land near 10.0.
        assert!((result.alpha_star - 10.0).abs() < 0.2, "alpha_star = {}", result.alpha_star);
        assert!(!result.probes.is_empty());
    }

    #[test]
    fn invalid_growth_factor_is_rejected() {
        let net = linear_network(10.0);
        let matrix = base_matrix(1.0);
        let cfg = MsdConfig { growth_factor: 1.0, ..Default::default() };
        assert!(MsdSearch::new(&net, &matrix, cfg).is_err());
    }

    #[test]
    fn zero_seeds_is_rejected() {
        let net = linear_network(10.0);
        let matrix = base_matrix(1.0);
        let cfg = MsdConfig { seeds_per_alpha: 0, ..Default::default() };
        assert!(MsdSearch::new(&net, &matrix, cfg).is_err());
    }

    #[test]
    fn infeasible_start_bisects_downward() {
        let net = linear_network(5.0);
        let matrix = base_matrix(1.0);
        let cfg = MsdConfig { alpha_start: 100.0, resolution: 0.1, ..Default::default() };
        let search = MsdSearch::new(&net, &matrix, cfg).unwrap();
        let result = search.run().unwrap();
        assert!((result.alpha_star - 5.0).abs() < 0.5, "alpha_star = {}", result.alpha_star);
    }
}
