//! Word-level to character-level normalisation tokens and back.
//!
//! An alignment of `source` → `target` becomes one `(input, output)` token
//! per source symbol, preceded by a begin token. Insertions have no source
//! symbol of their own, so they are merged into the output of the token
//! before them; insertions at the very start go to the begin token.
//!
//! An output that would read back as a label (or that starts with
//! [`ESCAPE_MARK`]) is written with one leading [`ESCAPE_MARK`].

use std::mem;

use crate::explanation::{EditOperation, RuleSet};

pub const BEGIN_TOKEN: &str = "__BEGIN__";
pub const KEEP_LABEL: &str = "__KEEP__";
pub const EPSILON_LABEL: &str = "__EPS__";
/// Control character marking an output that is to be read literally.
pub const ESCAPE_MARK: char = '\u{10}';

/// One character-level normalisation token: `(input, output)`.
pub type Token = (String, String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Label written for an empty input or output.
    pub epsilon: String,
    /// Replace identity outputs with [`KEEP_LABEL`].
    pub keep: bool,
    /// Follow every source symbol with an epsilon input slot that collects
    /// the insertions after it. `keep` has no effect in this mode.
    pub interspersed: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        ConversionOptions {
            epsilon: EPSILON_LABEL.to_string(),
            keep: false,
            interspersed: false,
        }
    }
}

impl ConversionOptions {
    fn keeps_identity(&self) -> bool {
        self.keep && !self.interspersed
    }

    fn escape(&self, output: String) -> String {
        if output == self.epsilon || output == KEEP_LABEL || output.starts_with(ESCAPE_MARK) {
            format!("{ESCAPE_MARK}{output}")
        } else {
            output
        }
    }
}

/// Lazily converts one rule set into character-level tokens.
pub fn merge_insertions<'a>(
    rule_set: &'a RuleSet,
    options: &'a ConversionOptions,
) -> MergedTokens<'a> {
    MergedTokens {
        ops: rule_set.iter(),
        options,
        input: BEGIN_TOKEN.to_string(),
        output: None,
        queued: None,
        finished: false,
    }
}

/// Iterator returned by [`merge_insertions`].
pub struct MergedTokens<'a> {
    ops: std::slice::Iter<'a, EditOperation>,
    options: &'a ConversionOptions,
    input: String,
    /// `None` until something is written to the current token's output.
    output: Option<String>,
    /// Symbol token emitted right after the pending one in interspersed mode.
    queued: Option<(String, Option<String>)>,
    finished: bool,
}

impl MergedTokens<'_> {
    fn label(&self, symbol: Option<char>) -> String {
        match symbol {
            Some(symbol) => symbol.to_string(),
            None => self.options.epsilon.clone(),
        }
    }

    fn finish_output(&self, input: &str, output: Option<String>) -> String {
        match output {
            None => self.options.epsilon.clone(),
            Some(output) if self.options.keeps_identity() && output == input => {
                KEEP_LABEL.to_string()
            }
            Some(output) => self.options.escape(output),
        }
    }

    /// Emits the pending token and starts the next one.
    fn flush(&mut self, next_input: String, next_output: Option<String>) -> Token {
        let input = mem::replace(&mut self.input, next_input);
        let output = mem::replace(&mut self.output, next_output);
        let output = self.finish_output(&input, output);
        (input, output)
    }
}

impl Iterator for MergedTokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some((input, output)) = self.queued.take() {
            let output = self.finish_output(&input, output);
            return Some((input, output));
        }
        if self.finished {
            return None;
        }

        while let Some(op) = self.ops.next() {
            match *op {
                EditOperation::Insert { target } => {
                    self.output.get_or_insert_with(String::new).push(target);
                }
                _ => {
                    let source = self.label(op.source());
                    let output = op.target().map(String::from);
                    if self.options.interspersed {
                        let token = self.flush(self.options.epsilon.clone(), None);
                        self.queued = Some((source, output));
                        return Some(token);
                    }
                    return Some(self.flush(source, output));
                }
            }
        }

        self.finished = true;
        Some(self.flush(String::new(), None))
    }
}

/// Lazily rebuilds `(source, target)` word pairs from a token stream
/// produced with the same `options`.
///
/// A begin token (in any letter case) starts a new word. Words with an
/// empty source are not emitted.
pub fn revert_conversion<I>(
    tokens: I,
    options: &ConversionOptions,
) -> RevertedPairs<'_, I::IntoIter>
where
    I: IntoIterator<Item = Token>,
{
    RevertedPairs {
        tokens: tokens.into_iter(),
        options,
        current: None,
    }
}

/// Iterator returned by [`revert_conversion`].
pub struct RevertedPairs<'o, I> {
    tokens: I,
    options: &'o ConversionOptions,
    current: Option<(String, String)>,
}

impl<I> RevertedPairs<'_, I> {
    fn output_of<'t>(&self, input: &'t str, output: &'t str) -> &'t str {
        if let Some(literal) = output.strip_prefix(ESCAPE_MARK) {
            literal
        } else if output == self.options.epsilon {
            ""
        } else if self.options.keeps_identity() && output == KEEP_LABEL {
            input
        } else {
            output
        }
    }
}

impl<I: Iterator<Item = Token>> Iterator for RevertedPairs<'_, I> {
    type Item = (String, String);

    fn next(&mut self) -> Option<(String, String)> {
        while let Some((input, output)) = self.tokens.next() {
            let piece = self.output_of(&input, &output).to_string();
            if input.eq_ignore_ascii_case(BEGIN_TOKEN) {
                let done = self.current.replace((String::new(), piece));
                if let Some(pair) = done.filter(|(source, _)| !source.is_empty()) {
                    return Some(pair);
                }
            } else if let Some((source, target)) = self.current.as_mut() {
                if input != self.options.epsilon {
                    source.push_str(&input);
                }
                target.push_str(&piece);
            }
        }
        self.current.take().filter(|(source, _)| !source.is_empty())
    }
}
