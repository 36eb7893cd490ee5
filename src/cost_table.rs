use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;

use crate::error::WeightsError;
use crate::types::{RuleCostMap, EPSILON};

/// Whether a stored cost applies to one direction only or to both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CostMode {
    #[default]
    Directed,
    Undirected,
}

impl CostMode {
    pub const ACCEPTED: [&'static str; 2] = ["directed", "undirected"];

    pub fn as_str(self) -> &'static str {
        match self {
            CostMode::Directed => "directed",
            CostMode::Undirected => "undirected",
        }
    }
}

impl fmt::Display for CostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostMode {
    type Err = WeightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "directed" => Ok(CostMode::Directed),
            "undirected" => Ok(CostMode::Undirected),
            other => Err(WeightsError::UnrecognizedType {
                found: other.to_string(),
                expected: CostMode::ACCEPTED.join("|"),
            }),
        }
    }
}

/// Symbol-pair edit costs with default fallbacks.
///
/// Keys are strings so that multi-symbol n-gram rules fit the same table;
/// [`EPSILON`] on either side marks an insertion or deletion.
#[derive(Clone, Debug)]
pub struct CostTable {
    mode: CostMode,
    /// Stored costs keyed by source, then target, exactly as set.
    costs: AHashMap<String, AHashMap<String, f64>>,
    len: usize,
    default_identity_cost: f64,
    default_substitution_cost: f64,
    default_insertion_cost: f64,
    default_deletion_cost: f64,
}

impl Default for CostTable {
    fn default() -> Self {
        CostTable::new(CostMode::Directed)
    }
}

impl CostTable {
    /// Creates an empty table with the classic unit defaults.
    pub fn new(mode: CostMode) -> Self {
        CostTable::with_defaults(mode, 1.0, 1.0, 1.0)
    }

    pub fn with_defaults(
        mode: CostMode,
        default_substitution_cost: f64,
        default_insertion_cost: f64,
        default_deletion_cost: f64,
    ) -> Self {
        CostTable {
            mode,
            costs: AHashMap::new(),
            len: 0,
            default_identity_cost: 0.0,
            default_substitution_cost,
            default_insertion_cost,
            default_deletion_cost,
        }
    }

    /// Builds a table from a prepared map of costs.
    pub fn from_costs(costs: RuleCostMap, mode: CostMode) -> Self {
        let mut table = CostTable::new(mode);
        for ((source, target), cost) in costs {
            table.set(&source, &target, cost);
        }
        table
    }

    pub fn mode(&self) -> CostMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CostMode) {
        self.mode = mode;
    }

    pub fn is_directed(&self) -> bool {
        self.mode == CostMode::Directed
    }

    /// Gets the cost of rewriting `source` as `target`.
    ///
    /// Checks the stored entries first (in undirected mode also the mirrored
    /// entry), then falls back to the identity, insertion, deletion or
    /// substitution default, in that order.
    pub fn get(&self, source: &str, target: &str) -> f64 {
        if let Some(cost) = self.stored(source, target) {
            return cost;
        }
        if self.mode == CostMode::Undirected {
            if let Some(cost) = self.stored(target, source) {
                return cost;
            }
        }

        if source == target {
            self.default_identity_cost
        } else if source == EPSILON {
            self.default_insertion_cost
        } else if target == EPSILON {
            self.default_deletion_cost
        } else {
            self.default_substitution_cost
        }
    }

    /// Stores exactly the directed entry `(source, target)`, whatever the mode.
    pub fn set(&mut self, source: &str, target: &str, cost: f64) {
        let targets = self.costs.entry(source.to_string()).or_default();
        if targets.insert(target.to_string(), cost).is_none() {
            self.len += 1;
        }
    }

    /// Looks up a stored entry without any fallback.
    pub fn stored(&self, source: &str, target: &str) -> Option<f64> {
        self.costs.get(source)?.get(target).copied()
    }

    pub fn contains(&self, source: &str, target: &str) -> bool {
        self.stored(source, target).is_some()
    }

    /// Clears all stored entries; the defaults remain.
    pub fn reset_all(&mut self) {
        self.costs.clear();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn iter_stored(&self) -> impl Iterator<Item = (&str, &str, f64)> + '_ {
        self.costs.iter().flat_map(|(source, targets)| {
            let source = source.as_str();
            targets
                .iter()
                .map(move |(target, &cost)| (source, target.as_str(), cost))
        })
    }

    /// Stored entries as they were set, sorted by key for stable output.
    pub fn stored_entries(&self) -> Vec<((&str, &str), f64)> {
        let mut entries: Vec<_> = self
            .iter_stored()
            .map(|(source, target, cost)| ((source, target), cost))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Iterates the logical table: in undirected mode every stored pair
    /// yields both directions (identity pairs only once).
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, f64)> + '_ {
        let undirected = self.mode == CostMode::Undirected;
        self.iter_stored().flat_map(move |(a, b, cost)| {
            let forward = Some((a, b, cost));
            let backward = (undirected && a != b).then_some((b, a, cost));
            forward.into_iter().chain(backward)
        })
    }

    pub fn default_identity_cost(&self) -> f64 {
        self.default_identity_cost
    }

    pub fn default_substitution_cost(&self) -> f64 {
        self.default_substitution_cost
    }

    pub fn default_insertion_cost(&self) -> f64 {
        self.default_insertion_cost
    }

    pub fn default_deletion_cost(&self) -> f64 {
        self.default_deletion_cost
    }
}
