use std::fmt;

use smallvec::SmallVec;

use crate::types::EPSILON;

/// A single edit step between one source and one target symbol.
///
/// A substitution whose two sides are equal is an identity step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EditOperation {
    Substitute { source: char, target: char },
    Insert { target: char },
    Delete { source: char },
}

impl EditOperation {
    pub fn source(&self) -> Option<char> {
        match *self {
            EditOperation::Substitute { source, .. } | EditOperation::Delete { source } => {
                Some(source)
            }
            EditOperation::Insert { .. } => None,
        }
    }

    pub fn target(&self) -> Option<char> {
        match *self {
            EditOperation::Substitute { target, .. } | EditOperation::Insert { target } => {
                Some(target)
            }
            EditOperation::Delete { .. } => None,
        }
    }

    pub fn is_identity(&self) -> bool {
        match self {
            EditOperation::Substitute { source, target } => source == target,
            _ => false,
        }
    }

    /// Source side as a cost-table key, [`EPSILON`] for insertions.
    pub fn source_key(&self) -> String {
        symbol_key(self.source())
    }

    /// Target side as a cost-table key, [`EPSILON`] for deletions.
    pub fn target_key(&self) -> String {
        symbol_key(self.target())
    }
}

fn symbol_key(symbol: Option<char>) -> String {
    symbol.map_or_else(|| EPSILON.to_string(), String::from)
}

impl fmt::Display for EditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.source_key(), self.target_key())
    }
}

/// One complete alignment path: the source sides of its operations spell the
/// source string and the target sides spell the target string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RuleSet {
    ops: SmallVec<[EditOperation; 16]>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet::default()
    }

    pub fn push(&mut self, op: EditOperation) {
        self.ops.push(op);
    }

    pub fn operations(&self) -> &[EditOperation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EditOperation> {
        self.ops.iter()
    }

    /// Concatenated source sides.
    pub fn source(&self) -> String {
        self.ops.iter().filter_map(EditOperation::source).collect()
    }

    /// Concatenated target sides.
    pub fn target(&self) -> String {
        self.ops.iter().filter_map(EditOperation::target).collect()
    }

    /// Two space-joined rows, epsilon shown as a blank.
    pub fn render_rows(&self) -> (String, String) {
        let row = |side: fn(&EditOperation) -> Option<char>| {
            self.ops
                .iter()
                .map(|op| side(op).unwrap_or(' ').to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        (row(EditOperation::source), row(EditOperation::target))
    }

    /// `|s=t|s=t|` with epsilon stripped.
    pub fn render_linear(&self) -> String {
        let mut out = String::from("|");
        for op in &self.ops {
            if let Some(s) = op.source() {
                out.push(s);
            }
            out.push('=');
            if let Some(t) = op.target() {
                out.push(t);
            }
            out.push('|');
        }
        out
    }
}

impl FromIterator<EditOperation> for RuleSet {
    fn from_iter<I: IntoIterator<Item = EditOperation>>(iter: I) -> Self {
        RuleSet {
            ops: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a EditOperation;
    type IntoIter = std::slice::Iter<'a, EditOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

/// All cost-minimal alignments of one (source, target) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignmentResult {
    pub source: String,
    pub target: String,
    pub cost: f64,
    /// Tied rule sets in enumeration order; never empty.
    pub rule_sets: Vec<RuleSet>,
    /// Set when enumeration stopped at the configured cap.
    pub truncated: bool,
}

impl AlignmentResult {
    pub fn first(&self) -> Option<&RuleSet> {
        self.rule_sets.first()
    }

    /// Per-rule-set two-row listing for diagnostics.
    pub fn render_verbose(&self) -> String {
        let mut out = format!(
            "Pair:  {} -- {}  / Distance: {:.6}\n",
            self.source, self.target, self.cost
        );
        for rule_set in &self.rule_sets {
            let (top, bottom) = rule_set.render_rows();
            out.push('\n');
            out.push_str(&top);
            out.push('\n');
            out.push_str(&bottom);
            out.push('\n');
        }
        out.push_str(&"-".repeat(62));
        out.push('\n');
        out
    }

    /// Single-line rendering of the first rule set only.
    pub fn render_linear(&self) -> String {
        self.first()
            .map(RuleSet::render_linear)
            .unwrap_or_else(|| "|".to_string())
    }
}
