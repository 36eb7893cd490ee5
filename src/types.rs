use ahash::AHashMap;

/// Reserved symbol denoting "no symbol" on one side of an edit rule.
pub const EPSILON: &str = "<eps>";

/// Type alias for a rule key: (source side, target side), either may be [`EPSILON`]
pub type RuleKey = (String, String);

/// Type alias for a map of costs between pairs of strings
pub type RuleCostMap = AHashMap<RuleKey, f64>;

/// Type alias for a map of observation counts, used for both pairs and rules
pub type FrequencyMap = AHashMap<RuleKey, u64>;
