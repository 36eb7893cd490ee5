//! Unsupervised training of edit costs from (source, target) pairs.
//!
//! Each cycle aligns every distinct pair with the current costs, counts the
//! edit rules used by all tied alignments, turns the counts into a
//! normalised pointwise-mutual-information distance per rule and moves each
//! rule's cost a fraction of the way towards that distance.

use ahash::AHashMap;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::TrainerConfig;
use crate::cost_table::{CostMode, CostTable};
use crate::explanation::RuleSet;
use crate::ngram_weights::NgramWeightEstimator;
use crate::ngrams::accumulate_rules;
use crate::types::{FrequencyMap, RuleCostMap, RuleKey};
use crate::weighted_levenshtein::Aligner;

/// Distance assigned to every rule of a cycle in which all rules share the
/// same PMI, leaving the normalised distance undefined.
pub const DEGENERATE_DISTANCE: f64 = i64::MAX as f64;

/// Tied rule sets per distinct training pair.
pub type PairAlignments = AHashMap<RuleKey, Vec<RuleSet>>;

/// Marginal probabilities for one cycle's rule counts.
#[derive(Debug, Default)]
pub struct RuleProbabilities {
    pub rule: AHashMap<RuleKey, f64>,
    pub source: AHashMap<String, f64>,
    pub target: AHashMap<String, f64>,
}

/// Per-rule distances of one cycle.
#[derive(Debug)]
pub struct RuleDistances {
    pub distances: RuleCostMap,
    /// All rules had the same PMI and received [`DEGENERATE_DISTANCE`].
    pub degenerate: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainingStatus {
    /// The average weight change dropped to the convergence quota.
    Converged,
    /// The cycle cap was hit first; weights are the last ones computed.
    IterationCapReached,
    /// No rules could be collected, so nothing was trained.
    EmptyCorpus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub cycle: usize,
    pub rules: usize,
    pub avg_delta: f64,
    pub degenerate: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainingReport {
    pub status: TrainingStatus,
    pub cycles: Vec<CycleReport>,
}

impl TrainingReport {
    pub fn converged(&self) -> bool {
        self.status == TrainingStatus::Converged
    }

    /// True if any cycle fell back to the degenerate distance.
    pub fn had_degenerate_cycle(&self) -> bool {
        self.cycles.iter().any(|c| c.degenerate)
    }
}

/// Learns a directed cost table from word pairs.
#[derive(Debug)]
pub struct PmiTrainer {
    weights: CostTable,
    pairs: FrequencyMap,
    alignments: PairAlignments,
    config: TrainerConfig,
}

impl Default for PmiTrainer {
    fn default() -> Self {
        PmiTrainer::new()
    }
}

impl PmiTrainer {
    pub fn new() -> Self {
        PmiTrainer::with_config(TrainerConfig::default())
    }

    pub fn with_config(config: TrainerConfig) -> Self {
        PmiTrainer {
            weights: CostTable::new(CostMode::Directed),
            pairs: FrequencyMap::new(),
            alignments: PairAlignments::new(),
            config,
        }
    }

    /// Starts training from an existing table instead of the unit defaults.
    pub fn with_weights(mut self, weights: CostTable) -> Self {
        self.weights = weights;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Records one observation of `source` normalised as `target`.
    pub fn add_pair(&mut self, source: &str, target: &str) {
        *self
            .pairs
            .entry((source.to_string(), target.to_string()))
            .or_insert(0) += 1;
    }

    /// Total observations, counting repeats.
    pub fn pair_count(&self) -> u64 {
        self.pairs.values().sum()
    }

    pub fn distinct_pairs(&self) -> usize {
        self.pairs.len()
    }

    pub fn pairs(&self) -> &FrequencyMap {
        &self.pairs
    }

    pub fn weights(&self) -> &CostTable {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut CostTable {
        &mut self.weights
    }

    pub fn into_weights(self) -> CostTable {
        self.weights
    }

    pub fn get_weight(&self, source: &str, target: &str) -> f64 {
        self.weights.get(source, target)
    }

    pub fn set_weight(&mut self, source: &str, target: &str, cost: f64) {
        self.weights.set(source, target, cost);
    }

    /// Final alignments published by the last [`train`](Self::train) call.
    pub fn alignments(&self) -> &PairAlignments {
        &self.alignments
    }

    fn aligner(&self) -> Aligner<'_> {
        Aligner::new(&self.weights).with_max_rule_sets(self.config.max_rule_sets)
    }

    /// Aligns every distinct pair with the current weights.
    ///
    /// Pairs are aligned in parallel; the weights are only read.
    pub fn perform_alignments(&self) -> PairAlignments {
        let aligner = self.aligner();
        let pairs: Vec<&RuleKey> = self.pairs.keys().collect();
        pairs
            .into_par_iter()
            .map(|pair| (pair.clone(), aligner.align(&pair.0, &pair.1)))
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }

    /// Sums pair counts over the rules of every tied alignment.
    pub fn collect_rules_by_freq(&self, alignments: &PairAlignments) -> FrequencyMap {
        let order = self.config.ngram_order;
        let entries: Vec<(&RuleKey, &Vec<RuleSet>)> = alignments.iter().collect();
        entries
            .into_par_iter()
            .fold(FrequencyMap::new, |mut rules, (pair, rule_sets)| {
                let count = self.pairs.get(pair).copied().unwrap_or(0);
                accumulate_rules(&mut rules, rule_sets, count, order);
                rules
            })
            .reduce(FrequencyMap::new, merge_frequencies)
    }

    /// Runs training cycles until convergence or the cycle cap, then
    /// publishes one final alignment pass under the settled weights.
    pub fn train(&mut self) -> TrainingReport {
        let mut cycles = Vec::new();
        let mut status = TrainingStatus::IterationCapReached;

        for cycle in 1..=self.config.max_cycles {
            let alignments = self.perform_alignments();
            let rules = self.collect_rules_by_freq(&alignments);
            if rules.is_empty() {
                warn!(
                    "[PMI] No edit rules in {} training pairs; nothing to train",
                    self.pairs.len()
                );
                status = TrainingStatus::EmptyCorpus;
                break;
            }

            let probabilities = calculate_probabilities(&rules);
            let distances = calculate_distances(&rules, &probabilities);
            if distances.degenerate {
                warn!(
                    "[PMI] Cycle {:2}: all {} rules share one PMI value; using sentinel distance",
                    cycle,
                    rules.len()
                );
            }

            let deltas = self.adjust_weights(&distances.distances);
            let avg_delta = deltas.iter().sum::<f64>() / deltas.len() as f64;
            info!(
                "[PMI] Cycle {:2}: {} rules, avg delta: {:.4}",
                cycle,
                rules.len(),
                avg_delta
            );
            cycles.push(CycleReport {
                cycle,
                rules: rules.len(),
                avg_delta,
                degenerate: distances.degenerate,
            });

            if avg_delta <= self.config.convergence_quota {
                info!("[PMI] Convergence reached.  Stopping.");
                status = TrainingStatus::Converged;
                break;
            }
        }

        if status == TrainingStatus::IterationCapReached {
            warn!(
                "[PMI] Maximum number of iterations ({}) reached.  Stopping.",
                self.config.max_cycles
            );
        }

        self.alignments = self.perform_alignments();
        info!(
            "[PMI] Generated final alignments for {} pairs",
            self.alignments.len()
        );

        TrainingReport { status, cycles }
    }

    /// Blends each distance into the stored weight and returns the absolute
    /// change per rule. Rules without a distance keep their weight.
    fn adjust_weights(&mut self, distances: &RuleCostMap) -> Vec<f64> {
        let factor = self.config.learning_rate;
        let mut deltas = Vec::with_capacity(distances.len());
        for ((source, target), &distance) in distances {
            let old_weight = self.weights.get(source, target);
            let new_weight = old_weight * (1.0 - factor) + distance * factor;
            deltas.push((old_weight - new_weight).abs());
            self.weights.set(source, target, new_weight);
        }
        deltas
    }

    /// Estimator over this trainer's pairs and published alignments.
    pub fn ngram_estimator(&self) -> NgramWeightEstimator<'_> {
        NgramWeightEstimator::new(&self.pairs, &self.alignments, &self.config.ngram)
    }

    /// Smoothed conditional-probability weights over rules of up to `order`
    /// operations, as an independent cost table.
    pub fn estimate_ngram_weights(&self, order: usize) -> CostTable {
        self.ngram_estimator().estimate(order)
    }

    /// Same as [`estimate_ngram_weights`](Self::estimate_ngram_weights) at
    /// the configured n-gram order.
    pub fn estimate_default_ngram_weights(&self) -> CostTable {
        self.estimate_ngram_weights(self.config.ngram.order)
    }
}

fn merge_frequencies(mut left: FrequencyMap, right: FrequencyMap) -> FrequencyMap {
    if left.len() < right.len() {
        return merge_frequencies(right, left);
    }
    for (rule, count) in right {
        *left.entry(rule).or_insert(0) += count;
    }
    left
}

/// Joint probability of each rule and the marginals of its two sides.
pub fn calculate_probabilities(rules: &FrequencyMap) -> RuleProbabilities {
    let mut freq_source: AHashMap<String, u64> = AHashMap::new();
    let mut freq_target: AHashMap<String, u64> = AHashMap::new();
    let total: u64 = rules.values().sum();

    let mut probabilities = RuleProbabilities::default();
    for ((source, target), &freq) in rules {
        probabilities
            .rule
            .insert((source.clone(), target.clone()), freq as f64 / total as f64);
        *freq_source.entry(source.clone()).or_insert(0) += freq;
        *freq_target.entry(target.clone()).or_insert(0) += freq;
    }

    let total_source: u64 = freq_source.values().sum();
    probabilities.source = freq_source
        .into_iter()
        .map(|(source, freq)| (source, freq as f64 / total_source as f64))
        .collect();

    let total_target: u64 = freq_target.values().sum();
    probabilities.target = freq_target
        .into_iter()
        .map(|(target, freq)| (target, freq as f64 / total_target as f64))
        .collect();

    probabilities
}

/// Normalised PMI distance: `(max_pmi - pmi) / (max_pmi - min_pmi)`.
///
/// Strongly associated rules end up near 0, the weakest near 1.
pub fn calculate_distances(rules: &FrequencyMap, p: &RuleProbabilities) -> RuleDistances {
    let pmi: Vec<(&RuleKey, f64)> = rules
        .keys()
        .map(|rule| {
            let joint = p.rule[rule];
            let marginal = p.source[&rule.0] * p.target[&rule.1];
            (rule, (joint / marginal).log2())
        })
        .collect();

    let max_pmi = pmi
        .iter()
        .map(|&(_, v)| v)
        .fold(f64::NEG_INFINITY, f64::max);
    let min_pmi = pmi.iter().map(|&(_, v)| v).fold(f64::INFINITY, f64::min);
    let spread = max_pmi - min_pmi;
    let degenerate = spread == 0.0;

    let distances = pmi
        .into_iter()
        .map(|(rule, value)| {
            let distance = if degenerate {
                DEGENERATE_DISTANCE
            } else {
                (max_pmi - value) / spread
            };
            (rule.clone(), distance)
        })
        .collect();

    RuleDistances {
        distances,
        degenerate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EPSILON;

    fn assert_approx_eq(a: f64, b: f64, epsilon: f64) {
        assert!(
            (a - b).abs() < epsilon,
            "Assertion failed: {} != {} within epsilon {}",
            a,
            b,
            epsilon
        );
    }

    fn key(source: &str, target: &str) -> RuleKey {
        (source.to_string(), target.to_string())
    }

    fn spelling_corpus() -> PmiTrainer {
        let mut trainer = PmiTrainer::new();
        for (source, target) in [
            ("vnd", "und"),
            ("vns", "uns"),
            ("vnter", "unter"),
            ("jn", "in"),
            ("jnn", "inn"),
            ("vnnd", "und"),
            ("thun", "tun"),
            ("thier", "tier"),
            ("und", "und"),
            ("in", "in"),
            ("tun", "tun"),
            ("vnd", "und"),
        ] {
            trainer.add_pair(source, target);
        }
        trainer
    }

    #[test]
    fn test_add_pair_counts_repeats() {
        let trainer = spelling_corpus();
        assert_eq!(trainer.pair_count(), 12);
        assert_eq!(trainer.distinct_pairs(), 11);
        assert_eq!(trainer.pairs().get(&key("vnd", "und")), Some(&2));
    }

    #[test]
    fn test_instances_do_not_share_pairs() {
        let mut first = PmiTrainer::new();
        first.add_pair("a", "b");
        let second = PmiTrainer::new();
        assert_eq!(second.distinct_pairs(), 0);
    }

    #[test]
    fn test_collect_rules_weights_by_pair_count() {
        let mut trainer = PmiTrainer::new();
        trainer.add_pair("ab", "ab");
        trainer.add_pair("ab", "ab");
        trainer.add_pair("a", "b");
        let rules = trainer.collect_rules_by_freq(&trainer.perform_alignments());
        assert_eq!(rules.get(&key("a", "a")), Some(&2));
        assert_eq!(rules.get(&key("b", "b")), Some(&2));
        // "a" -> "b" has a single optimal alignment under unit costs.
        assert_eq!(rules.get(&key("a", "b")), Some(&1));
        assert_eq!(rules.get(&key("a", EPSILON)), None);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let mut rules = FrequencyMap::new();
        rules.insert(key("a", "a"), 3);
        rules.insert(key("a", "b"), 1);
        rules.insert(key("c", "b"), 4);
        let p = calculate_probabilities(&rules);
        assert_approx_eq(p.rule.values().sum(), 1.0, 1e-12);
        assert_approx_eq(p.source["a"], 0.5, 1e-12);
        assert_approx_eq(p.source["c"], 0.5, 1e-12);
        assert_approx_eq(p.target["b"], 5.0 / 8.0, 1e-12);
    }

    #[test]
    fn test_distances_are_normalised() {
        let mut rules = FrequencyMap::new();
        rules.insert(key("a", "a"), 3);
        rules.insert(key("a", "b"), 1);
        rules.insert(key("c", "b"), 4);
        let p = calculate_probabilities(&rules);
        let d = calculate_distances(&rules, &p);
        assert!(!d.degenerate);
        let values: Vec<f64> = d.distances.values().copied().collect();
        assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(values.iter().any(|&v| v == 0.0));
        assert!(values.iter().any(|&v| v == 1.0));
        // The rare a->b mapping is the least informative one.
        assert_approx_eq(d.distances[&key("a", "b")], 1.0, 1e-12);
    }

    #[test]
    fn test_degenerate_distances_use_sentinel() {
        let mut rules = FrequencyMap::new();
        rules.insert(key("a", "a"), 2);
        rules.insert(key("b", "b"), 2);
        let p = calculate_probabilities(&rules);
        let d = calculate_distances(&rules, &p);
        assert!(d.degenerate);
        assert!(d.distances.values().all(|&v| v == DEGENERATE_DISTANCE));
    }

    #[test]
    fn test_training_terminates_within_cap() {
        let mut trainer = spelling_corpus();
        let report = trainer.train();
        assert!(report.cycles.len() <= 19);
        assert!(!report.cycles.is_empty());
        if report.status == TrainingStatus::IterationCapReached {
            assert_eq!(report.cycles.len(), 19);
        }
        // Every pair gets a published alignment.
        assert_eq!(trainer.alignments().len(), trainer.distinct_pairs());
    }

    #[test]
    fn test_training_learns_cheap_v_to_u() {
        let mut trainer = spelling_corpus();
        trainer.train();
        let v_u = trainer.get_weight("v", "u");
        assert!(v_u < 1.0, "v->u should beat the default, got {v_u}");
        assert!(v_u < trainer.get_weight("v", "t"));
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let config = TrainerConfig {
            max_cycles: 1,
            convergence_quota: 0.0,
            ..TrainerConfig::default()
        };
        let mut trainer = PmiTrainer::with_config(config);
        trainer.add_pair("vnd", "und");
        trainer.add_pair("und", "und");
        let report = trainer.train();
        assert_eq!(report.status, TrainingStatus::IterationCapReached);
        assert_eq!(report.cycles.len(), 1);
        assert!(!report.converged());
    }

    #[test]
    fn test_empty_corpus_is_not_fatal() {
        let mut trainer = PmiTrainer::new();
        let report = trainer.train();
        assert_eq!(report.status, TrainingStatus::EmptyCorpus);
        assert!(report.cycles.is_empty());
        assert!(trainer.weights().is_empty());
    }

    #[test]
    fn test_single_pair_corpus_is_degenerate() {
        let mut trainer = PmiTrainer::new();
        trainer.add_pair("a", "a");
        let report = trainer.train();
        assert!(report.had_degenerate_cycle());
        assert!(trainer.get_weight("a", "a") > 1.0);
    }

    #[test]
    fn test_weights_only_change_for_observed_rules() {
        let mut trainer = spelling_corpus();
        trainer.set_weight("x", "y", 0.42);
        trainer.train();
        assert_eq!(trainer.get_weight("x", "y"), 0.42);
    }
}
