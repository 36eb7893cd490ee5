use rayon::prelude::*;
use tracing::warn;

use crate::cost_table::CostTable;
use crate::explanation::{AlignmentResult, EditOperation, RuleSet};
use crate::types::EPSILON;

/// Default cap on the number of tied rule sets materialised per pair.
pub const DEFAULT_MAX_RULE_SETS: usize = 1000;

/// Set of moves that reach a DP cell at its minimal cost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Moves(u8);

impl Moves {
    const INSERT: u8 = 1;
    const DELETE: u8 = 2;
    const SUBSTITUTE: u8 = 4;
    /// Enumeration order; decides which rule set comes first.
    const ORDER: [u8; 3] = [Moves::INSERT, Moves::DELETE, Moves::SUBSTITUTE];

    fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// Filled DP grid: per-cell minimal cost and the moves achieving it.
///
/// Rule sets are not stored in the grid; they are produced on demand by
/// walking the recorded moves back from the bottom-right cell.
#[derive(Debug)]
pub struct AlignmentLattice {
    source: Vec<char>,
    target: Vec<char>,
    width: usize,
    costs: Vec<f64>,
    moves: Vec<Moves>,
}

impl AlignmentLattice {
    /// Fills the grid for `source` → `target` under `weights`.
    pub fn build(source: &str, target: &str, weights: &CostTable) -> Self {
        let source: Vec<char> = source.chars().collect();
        let target: Vec<char> = target.chars().collect();
        let (n, m) = (source.len(), target.len());
        let width = m + 1;

        // Per-symbol lookups once, not once per cell.
        let source_keys: Vec<String> = source.iter().map(|c| c.to_string()).collect();
        let target_keys: Vec<String> = target.iter().map(|c| c.to_string()).collect();
        let insertion: Vec<f64> = target_keys
            .iter()
            .map(|t| weights.get(EPSILON, t))
            .collect();
        let deletion: Vec<f64> = source_keys
            .iter()
            .map(|s| weights.get(s, EPSILON))
            .collect();

        let mut costs = vec![0.0; (n + 1) * width];
        let mut moves = vec![Moves::default(); (n + 1) * width];

        // Top row and left column extend the single trivial path.
        for j in 0..m {
            costs[j + 1] = costs[j] + insertion[j];
            moves[j + 1] = Moves(Moves::INSERT);
        }
        for i in 0..n {
            costs[(i + 1) * width] = costs[i * width] + deletion[i];
            moves[(i + 1) * width] = Moves(Moves::DELETE);
        }

        for i in 0..n {
            for j in 0..m {
                let here = (i + 1) * width + (j + 1);
                let ins_cost = costs[here - 1] + insertion[j];
                let del_cost = costs[here - width] + deletion[i];
                let substitution = weights.get(&source_keys[i], &target_keys[j]);
                let sub_cost = costs[here - width - 1] + substitution;

                let best_cost = ins_cost.min(del_cost).min(sub_cost);
                costs[here] = best_cost;

                // Every candidate reaching the minimum is kept, not just one.
                let mut bits = 0;
                if ins_cost <= best_cost {
                    bits |= Moves::INSERT;
                }
                if del_cost <= best_cost {
                    bits |= Moves::DELETE;
                }
                if sub_cost <= best_cost {
                    bits |= Moves::SUBSTITUTE;
                }
                moves[here] = Moves(bits);
            }
        }

        AlignmentLattice {
            source,
            target,
            width,
            costs,
            moves,
        }
    }

    /// Minimal total cost (bottom-right cell).
    pub fn cost(&self) -> f64 {
        self.costs[self.source.len() * self.width + self.target.len()]
    }

    /// Lazily enumerates all tied rule sets. Each call starts a fresh walk.
    pub fn rule_sets(&self) -> RuleSets<'_> {
        RuleSets {
            lattice: self,
            stack: vec![Frame {
                row: self.source.len(),
                col: self.target.len(),
                next: 0,
            }],
            ops: Vec::new(),
        }
    }

    fn step(&self, row: usize, col: usize, bit: u8) -> (EditOperation, usize, usize) {
        match bit {
            Moves::INSERT => (
                EditOperation::Insert {
                    target: self.target[col - 1],
                },
                row,
                col - 1,
            ),
            Moves::DELETE => (
                EditOperation::Delete {
                    source: self.source[row - 1],
                },
                row - 1,
                col,
            ),
            _ => (
                EditOperation::Substitute {
                    source: self.source[row - 1],
                    target: self.target[col - 1],
                },
                row - 1,
                col - 1,
            ),
        }
    }
}

#[derive(Debug)]
struct Frame {
    row: usize,
    col: usize,
    /// Index into `Moves::ORDER` of the next move to try.
    next: usize,
}

/// Depth-first walk over the recorded moves of an [`AlignmentLattice`].
///
/// Yields rule sets in the order an eager cell-by-cell construction would
/// list them: all paths whose last step is an insertion, then deletion,
/// then substitution, recursively.
pub struct RuleSets<'a> {
    lattice: &'a AlignmentLattice,
    stack: Vec<Frame>,
    /// Operations of the current partial path, last step first.
    ops: Vec<EditOperation>,
}

impl Iterator for RuleSets<'_> {
    type Item = RuleSet;

    fn next(&mut self) -> Option<RuleSet> {
        while let Some(frame) = self.stack.last_mut() {
            if frame.row == 0 && frame.col == 0 {
                let rule_set: RuleSet = self.ops.iter().rev().copied().collect();
                self.stack.pop();
                self.ops.truncate(self.stack.len().saturating_sub(1));
                return Some(rule_set);
            }

            let moves = self.lattice.moves[frame.row * self.lattice.width + frame.col];
            let found = (frame.next..Moves::ORDER.len())
                .find(|&k| moves.contains(Moves::ORDER[k]));
            match found {
                Some(k) => {
                    frame.next = k + 1;
                    let (op, row, col) = self.lattice.step(frame.row, frame.col, Moves::ORDER[k]);
                    self.ops.push(op);
                    self.stack.push(Frame { row, col, next: 0 });
                }
                None => {
                    self.stack.pop();
                    self.ops.truncate(self.stack.len().saturating_sub(1));
                }
            }
        }
        None
    }
}

/// Weighted Levenshtein aligner returning every optimal alignment.
#[derive(Clone, Copy, Debug)]
pub struct Aligner<'w> {
    weights: &'w CostTable,
    max_rule_sets: usize,
}

impl<'w> Aligner<'w> {
    pub fn new(weights: &'w CostTable) -> Self {
        Aligner {
            weights,
            max_rule_sets: DEFAULT_MAX_RULE_SETS,
        }
    }

    /// Keeps at most `max_rule_sets` tied rule sets per pair (the first ones
    /// in enumeration order). Zero is treated as one.
    pub fn with_max_rule_sets(mut self, max_rule_sets: usize) -> Self {
        self.max_rule_sets = max_rule_sets.max(1);
        self
    }

    pub fn weights(&self) -> &'w CostTable {
        self.weights
    }

    pub fn lattice(&self, source: &str, target: &str) -> AlignmentLattice {
        AlignmentLattice::build(source, target, self.weights)
    }

    /// Minimal cost plus all tied rule sets, capped.
    pub fn compute_alignments(&self, source: &str, target: &str) -> AlignmentResult {
        let lattice = self.lattice(source, target);
        let mut walk = lattice.rule_sets();
        let rule_sets: Vec<RuleSet> = walk.by_ref().take(self.max_rule_sets).collect();
        let truncated = walk.next().is_some();
        if truncated {
            warn!(
                "Alignment of {:?} -- {:?} truncated to {} rule sets",
                source, target, self.max_rule_sets
            );
        }

        AlignmentResult {
            source: source.to_string(),
            target: target.to_string(),
            cost: lattice.cost(),
            rule_sets,
            truncated,
        }
    }

    /// Tied rule sets only, cost discarded.
    pub fn align(&self, source: &str, target: &str) -> Vec<RuleSet> {
        self.compute_alignments(source, target).rule_sets
    }

    pub fn distance(&self, source: &str, target: &str) -> f64 {
        self.lattice(source, target).cost()
    }

    /// Distances from `source` to each candidate, computed in parallel.
    pub fn batch_distance(&self, source: &str, candidates: &[String]) -> Vec<f64> {
        candidates
            .par_iter()
            .map(|candidate| self.distance(source, candidate))
            .collect()
    }

    /// True when some weighted alignment is not also an optimal alignment
    /// under plain unit-cost Levenshtein.
    pub fn differs_from_plain(&self, source: &str, target: &str) -> bool {
        let plain_weights = CostTable::default();
        let plain = Aligner::new(&plain_weights).with_max_rule_sets(self.max_rule_sets);
        let plain_sets = plain.align(source, target);
        self.align(source, target)
            .iter()
            .any(|rule_set| !plain_sets.contains(rule_set))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cost_table::CostMode;

    fn assert_approx_eq(a: f64, b: f64, epsilon: f64) {
        assert!(
            (a - b).abs() < epsilon,
            "Assertion failed: {} != {} within epsilon {}",
            a,
            b,
            epsilon
        );
    }

    fn sub(source: char, target: char) -> EditOperation {
        EditOperation::Substitute { source, target }
    }

    #[test]
    fn test_identical_strings_cost_zero() {
        let weights = CostTable::default();
        let result = Aligner::new(&weights).compute_alignments("hello", "hello");
        assert_approx_eq(result.cost, 0.0, 1e-9);
        let identity: RuleSet = "hello".chars().map(|c| sub(c, c)).collect();
        assert!(result.rule_sets.contains(&identity));
        assert!(!result.truncated);
    }

    #[test]
    fn test_kitten_sitting() {
        let weights = CostTable::default();
        let result = Aligner::new(&weights).compute_alignments("kitten", "sitting");
        assert_approx_eq(result.cost, 3.0, 1e-9);
        for rule_set in &result.rule_sets {
            assert_eq!(rule_set.source(), "kitten");
            assert_eq!(rule_set.target(), "sitting");
        }
    }

    #[test]
    fn test_deletion_alignment_among_ties() {
        let weights = CostTable::default();
        let result = Aligner::new(&weights).compute_alignments("ab", "b");
        assert_approx_eq(result.cost, 1.0, 1e-9);
        let expected: RuleSet = [EditOperation::Delete { source: 'a' }, sub('b', 'b')]
            .into_iter()
            .collect();
        assert!(result.rule_sets.contains(&expected));
    }

    #[test]
    fn test_ties_are_all_kept() {
        let weights = CostTable::default();
        // "ab" -> "ba": swap via two substitutions, or delete+insert at either end.
        let result = Aligner::new(&weights).compute_alignments("ab", "ba");
        assert_approx_eq(result.cost, 2.0, 1e-9);
        assert!(result.rule_sets.len() > 1);
        let mut unique = result.rule_sets.clone();
        unique.dedup();
        assert_eq!(unique.len(), result.rule_sets.len());
        assert!(result
            .rule_sets
            .contains(&[sub('a', 'b'), sub('b', 'a')].into_iter().collect()));
    }

    #[test]
    fn test_enumeration_order_matches_eager_construction() {
        let mut weights = CostTable::default();
        weights.set("a", "b", 2.0);
        // Cell (1,1) for "a"->"b": insertion path, deletion path, substitution.
        let sets = Aligner::new(&weights).align("a", "b");
        assert_eq!(sets.len(), 3);
        assert_eq!(
            sets[0].operations(),
            &[
                EditOperation::Delete { source: 'a' },
                EditOperation::Insert { target: 'b' },
            ]
        );
        assert_eq!(
            sets[1].operations(),
            &[
                EditOperation::Insert { target: 'b' },
                EditOperation::Delete { source: 'a' },
            ]
        );
        assert_eq!(sets[2].operations(), &[sub('a', 'b')]);
    }

    #[test]
    fn test_custom_weights_change_alignment() {
        let mut weights = CostTable::default();
        weights.set("a", "b", 0.1);
        let result = Aligner::new(&weights).compute_alignments("abc", "bbc");
        assert_approx_eq(result.cost, 0.1, 1e-9);
        assert_eq!(result.rule_sets.len(), 1);
    }

    #[test]
    fn test_asymmetric_costs() {
        let mut weights = CostTable::new(CostMode::Directed);
        weights.set("0", "O", 0.1);
        weights.set("O", "0", 0.5);
        let aligner = Aligner::new(&weights);
        assert_approx_eq(aligner.distance("R0AD", "ROAD"), 0.1, 1e-9);
        assert_approx_eq(aligner.distance("rOad", "r0ad"), 0.5, 1e-9);
    }

    #[test]
    fn test_empty_inputs() {
        let weights = CostTable::default();
        let aligner = Aligner::new(&weights);

        let both = aligner.compute_alignments("", "");
        assert_approx_eq(both.cost, 0.0, 1e-9);
        assert_eq!(both.rule_sets, vec![RuleSet::new()]);

        let insert_only = aligner.compute_alignments("", "ab");
        assert_approx_eq(insert_only.cost, 2.0, 1e-9);
        assert_eq!(insert_only.rule_sets.len(), 1);
        assert_eq!(insert_only.rule_sets[0].target(), "ab");

        let delete_only = aligner.compute_alignments("ab", "");
        assert_approx_eq(delete_only.cost, 2.0, 1e-9);
        assert_eq!(delete_only.rule_sets.len(), 1);
    }

    #[test]
    fn test_non_ascii() {
        let weights = CostTable::default();
        assert_approx_eq(Aligner::new(&weights).distance("café", "coffee"), 4.0, 1e-9);
    }

    #[test]
    fn test_cap_truncates_rule_sets() {
        // Substitution costs as much as deletion plus insertion: every path ties.
        let weights = CostTable::with_defaults(CostMode::Directed, 2.0, 1.0, 1.0);
        let full = Aligner::new(&weights).compute_alignments("abcd", "wxyz");
        assert_eq!(full.rule_sets.len(), 321);

        let capped = Aligner::new(&weights)
            .with_max_rule_sets(2)
            .compute_alignments("abcd", "wxyz");
        assert!(capped.truncated);
        assert_eq!(capped.rule_sets, full.rule_sets[..2].to_vec());
        assert_approx_eq(capped.cost, full.cost, 1e-9);
    }

    #[test]
    fn test_every_rule_set_has_minimal_cost() {
        let mut weights = CostTable::default();
        weights.set("e", "i", 0.4);
        weights.set(EPSILON, "g", 0.6);
        let result = Aligner::new(&weights).compute_alignments("kitten", "sitting");
        for rule_set in &result.rule_sets {
            let total: f64 = rule_set
                .iter()
                .map(|op| weights.get(&op.source_key(), &op.target_key()))
                .sum();
            assert_approx_eq(total, result.cost, 1e-9);
        }
    }

    #[test]
    fn test_batch_distance() {
        let weights = CostTable::default();
        let candidates = vec!["kitten".to_string(), "sitting".to_string(), String::new()];
        let distances = Aligner::new(&weights).batch_distance("kitten", &candidates);
        assert_eq!(distances, vec![0.0, 3.0, 6.0]);
    }

    #[test]
    fn test_differs_from_plain() {
        let mut weights = CostTable::default();
        assert!(!Aligner::new(&weights).differs_from_plain("ab", "ba"));
        // Cheap deletion+insertion makes a path that plain Levenshtein never prefers.
        weights.set("u", EPSILON, 0.1);
        weights.set(EPSILON, "v", 0.1);
        assert!(Aligner::new(&weights).differs_from_plain("u", "v"));
    }
}
