use ahash::AHashMap;

use crate::config::NgramConfig;
use crate::cost_table::{CostMode, CostTable};
use crate::ngrams::accumulate_rules;
use crate::pmi::PairAlignments;
use crate::types::{FrequencyMap, RuleCostMap, EPSILON};

/// Derives edit costs from smoothed conditional probabilities of n-gram
/// rules, `-ln p(target | source)`, over a fixed set of alignments.
///
/// Independent of the PMI loop: it only reads the pair counts and the
/// alignments they were given.
#[derive(Clone, Copy, Debug)]
pub struct NgramWeightEstimator<'a> {
    pairs: &'a FrequencyMap,
    alignments: &'a PairAlignments,
    config: &'a NgramConfig,
}

impl<'a> NgramWeightEstimator<'a> {
    pub fn new(
        pairs: &'a FrequencyMap,
        alignments: &'a PairAlignments,
        config: &'a NgramConfig,
    ) -> Self {
        NgramWeightEstimator {
            pairs,
            alignments,
            config,
        }
    }

    /// Order used when the caller does not name one.
    pub fn default_order(&self) -> usize {
        self.config.order
    }

    /// Rule frequencies over n-grams of 1..=`order` operations.
    pub fn rule_frequencies(&self, order: usize) -> FrequencyMap {
        let mut rules = FrequencyMap::new();
        for (pair, rule_sets) in self.alignments {
            let count = self.pairs.get(pair).copied().unwrap_or(0);
            accumulate_rules(&mut rules, rule_sets, count, order);
        }
        rules
    }

    /// Raw `-ln p(target | source)` for every observed rule, identity rules included.
    pub fn ngram_weights(&self, order: usize) -> RuleCostMap {
        let a = self.config.smoothing;
        let rules = self.rule_frequencies(order);

        let mut source_totals: AHashMap<&str, u64> = AHashMap::new();
        let mut source_targets: AHashMap<&str, usize> = AHashMap::new();
        for ((source, _), &freq) in &rules {
            *source_totals.entry(source.as_str()).or_insert(0) += freq;
            *source_targets.entry(source.as_str()).or_insert(0) += 1;
        }

        // Rare source sides are treated as if seen at least this often.
        let total_pairs: u64 = self.pairs.values().sum();
        let min_level = total_pairs as f64 / self.config.min_freq_divisor;

        rules
            .iter()
            .map(|((source, target), &freq)| {
                let base = (source_totals[source.as_str()] as f64).max(min_level);
                let distinct = source_targets[source.as_str()] as f64;
                let prob = (freq as f64 + a) / (base + a * distinct);
                ((source.clone(), target.clone()), -prob.ln())
            })
            .collect()
    }

    /// Directed cost table of the estimated weights.
    ///
    /// Identity rules are left out; they fall back to the zero identity default.
    pub fn estimate(&self, order: usize) -> CostTable {
        let mut table = CostTable::new(CostMode::Directed);
        for ((source, target), weight) in self.ngram_weights(order) {
            if source != target {
                table.set(&source, &target, weight);
            }
        }
        table
    }

    /// Estimated weights scaled for publishing.
    ///
    /// Rules inserting from nothing are dropped, as are rules costlier than
    /// `divisor` per source symbol; the rest are divided by `divisor` and
    /// floored at `min_weight`.
    pub fn scaled_cost_table(&self, order: usize) -> CostTable {
        let divisor = self.config.divisor;
        let mut table = CostTable::new(CostMode::Directed);
        for ((source, target), weight) in self.ngram_weights(order) {
            if source == EPSILON || source == target {
                continue;
            }
            if weight > source.chars().count() as f64 * divisor {
                continue;
            }
            let cost = (weight / divisor).max(self.config.min_weight);
            table.set(&source, &target, cost);
        }
        table
    }
}
