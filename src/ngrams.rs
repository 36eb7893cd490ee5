use crate::explanation::{EditOperation, RuleSet};
use crate::types::{FrequencyMap, RuleKey, EPSILON};

/// All runs of 1..=`order` consecutive operations of a rule set.
///
/// Unigrams come first, then bigrams, and so on, each in left-to-right order.
pub fn rule_set_ngrams(rule_set: &RuleSet, order: usize) -> impl Iterator<Item = &[EditOperation]> {
    let ops = rule_set.operations();
    (1..=order.max(1)).flat_map(move |n| ops.windows(n))
}

/// Flattens an n-gram of operations into a `(source, target)` rule key.
///
/// Epsilon sides contribute nothing; a side that is epsilon throughout
/// becomes [`EPSILON`] itself.
pub fn ngram_key(ngram: &[EditOperation]) -> RuleKey {
    (
        flatten_side(ngram.iter().map(EditOperation::source)),
        flatten_side(ngram.iter().map(EditOperation::target)),
    )
}

fn flatten_side(symbols: impl Iterator<Item = Option<char>>) -> String {
    let side: String = symbols.flatten().collect();
    if side.is_empty() {
        EPSILON.to_string()
    } else {
        side
    }
}

/// Adds `count` to every n-gram rule of every rule set.
///
/// Tied rule sets are not down-weighted: each one receives the full count.
pub fn accumulate_rules<'a>(
    rules: &mut FrequencyMap,
    rule_sets: impl IntoIterator<Item = &'a RuleSet>,
    count: u64,
    order: usize,
) {
    for rule_set in rule_sets {
        for ngram in rule_set_ngrams(rule_set, order) {
            *rules.entry(ngram_key(ngram)).or_insert(0) += count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_set() -> RuleSet {
        [
            EditOperation::Substitute {
                source: 'v',
                target: 'u',
            },
            EditOperation::Delete { source: 'n' },
            EditOperation::Delete { source: 'd' },
            EditOperation::Insert { target: 't' },
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_unigrams_only_for_order_one() {
        let rs = rule_set();
        let grams: Vec<_> = rule_set_ngrams(&rs, 1).collect();
        assert_eq!(grams.len(), 4);
        assert!(grams.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn test_ngram_counts_for_higher_orders() {
        let rs = rule_set();
        // 4 unigrams + 3 bigrams + 2 trigrams
        assert_eq!(rule_set_ngrams(&rs, 3).count(), 9);
        // Order larger than the rule set stops at its length.
        assert_eq!(rule_set_ngrams(&rs, 10).count(), 10);
        assert_eq!(rule_set_ngrams(&rs, 0).count(), 4);
    }

    fn key(source: &str, target: &str) -> RuleKey {
        (source.to_string(), target.to_string())
    }

    #[test]
    fn test_keys_strip_epsilon() {
        let rs = rule_set();
        let ops = rs.operations();
        assert_eq!(ngram_key(&ops[0..1]), key("v", "u"));
        assert_eq!(ngram_key(&ops[1..2]), key("n", EPSILON));
        assert_eq!(ngram_key(&ops[0..2]), key("vn", "u"));
        assert_eq!(ngram_key(&ops[1..3]), key("nd", EPSILON));
        assert_eq!(ngram_key(&ops[2..4]), key("d", "t"));
    }

    #[test]
    fn test_accumulate_counts_every_tie_fully() {
        let mut rules = FrequencyMap::new();
        let a: RuleSet = std::iter::once(EditOperation::Substitute {
            source: 'a',
            target: 'b',
        })
        .collect();
        let b: RuleSet = [
            EditOperation::Delete { source: 'a' },
            EditOperation::Insert { target: 'b' },
        ]
        .into_iter()
        .collect();
        accumulate_rules(&mut rules, [&a, &b], 3, 1);
        assert_eq!(rules.get(&key("a", "b")), Some(&3));
        assert_eq!(rules.get(&key("a", EPSILON)), Some(&3));
        assert_eq!(rules.get(&key(EPSILON, "b")), Some(&3));
        assert_eq!(rules.len(), 3);
    }
}
