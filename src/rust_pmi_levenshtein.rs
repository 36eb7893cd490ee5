use std::collections::HashMap;

use crate::config::TrainerConfig;
use crate::cost_table::{CostMode, CostTable};
use crate::explanation::EditOperation;
use crate::pmi::PmiTrainer;
use crate::types::EPSILON;
use crate::weighted_levenshtein::{Aligner, DEFAULT_MAX_RULE_SETS};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyNone;

/// Rule key as seen from Python: `None` stands for epsilon.
type PyRuleKey = (Option<String>, Option<String>);

impl<'py> IntoPyObject<'py> for EditOperation {
    type Target = PyAny;
    type Output = Bound<'py, Self::Target>;
    type Error = pyo3::PyErr;

    fn into_pyobject(self, py: Python<'py>) -> Result<Self::Output, Self::Error> {
        match self {
            EditOperation::Substitute { source, target } => ("substitute", source, target)
                .into_pyobject(py)
                .map(|tuple| tuple.into_any()),
            EditOperation::Insert { target } => ("insert", PyNone::get(py), target)
                .into_pyobject(py)
                .map(|tuple| tuple.into_any()),
            EditOperation::Delete { source } => ("delete", source, PyNone::get(py))
                .into_pyobject(py)
                .map(|tuple| tuple.into_any()),
        }
    }
}

/// Validates that the default cost is non-negative
fn validate_default_cost(default_cost: f64) -> PyResult<()> {
    if default_cost < 0.0 {
        return Err(PyValueError::new_err(format!(
            "Default cost must be non-negative, got value: {default_cost}"
        )));
    }
    Ok(())
}

fn validate_learning_rate(learning_rate: f64) -> PyResult<()> {
    if !(0.0..=1.0).contains(&learning_rate) {
        return Err(PyValueError::new_err(format!(
            "Learning rate must be within [0, 1], got value: {learning_rate}"
        )));
    }
    Ok(())
}

fn side_from_py(side: Option<String>) -> String {
    side.unwrap_or_else(|| EPSILON.to_string())
}

fn side_to_py(side: &str) -> Option<String> {
    (side != EPSILON).then(|| side.to_string())
}

fn table_to_py(table: &CostTable) -> HashMap<PyRuleKey, f64> {
    table
        .stored_entries()
        .into_iter()
        .map(|((source, target), cost)| {
            ((side_to_py(source), side_to_py(target)), cost)
        })
        .collect()
}

fn trainer_from_pairs(pairs: Vec<(String, String)>, config: TrainerConfig) -> PmiTrainer {
    let mut trainer = PmiTrainer::with_config(config);
    for (source, target) in &pairs {
        trainer.add_pair(source, target);
    }
    trainer
}

// Computes the minimal cost and every optimal alignment under a custom cost map.
#[pyfunction]
#[pyo3(signature = (
    a,
    b,
    costs,
    directed = true,
    default_substitution_cost = 1.0,
    default_insertion_cost = 1.0,
    default_deletion_cost = 1.0,
    max_rule_sets = DEFAULT_MAX_RULE_SETS,
))]
fn _weighted_alignments(
    a: &str,
    b: &str,
    costs: HashMap<PyRuleKey, f64>,
    directed: bool,
    default_substitution_cost: f64,
    default_insertion_cost: f64,
    default_deletion_cost: f64,
    max_rule_sets: usize,
) -> PyResult<(f64, Vec<Vec<EditOperation>>)> {
    validate_default_cost(default_substitution_cost)?;
    validate_default_cost(default_insertion_cost)?;
    validate_default_cost(default_deletion_cost)?;

    let mode = if directed {
        CostMode::Directed
    } else {
        CostMode::Undirected
    };
    let mut table = CostTable::with_defaults(
        mode,
        default_substitution_cost,
        default_insertion_cost,
        default_deletion_cost,
    );
    for ((source, target), cost) in costs {
        validate_default_cost(cost)?;
        table.set(&side_from_py(source), &side_from_py(target), cost);
    }

    let result = Aligner::new(&table)
        .with_max_rule_sets(max_rule_sets)
        .compute_alignments(a, b);
    let rule_sets = result
        .rule_sets
        .iter()
        .map(|rule_set| rule_set.operations().to_vec())
        .collect();
    Ok((result.cost, rule_sets))
}

// Trains PMI weights on a list of (source, target) pairs.
#[pyfunction]
#[pyo3(signature = (
    pairs,
    learning_rate = 0.2,
    convergence_quota = 0.01,
    max_cycles = 19,
))]
fn _train_pmi_weights(
    py: Python,
    pairs: Vec<(String, String)>,
    learning_rate: f64,
    convergence_quota: f64,
    max_cycles: usize,
) -> PyResult<(bool, HashMap<PyRuleKey, f64>)> {
    validate_learning_rate(learning_rate)?;
    let config = TrainerConfig {
        learning_rate,
        convergence_quota,
        max_cycles,
        ..TrainerConfig::default()
    };
    let mut trainer = trainer_from_pairs(pairs, config);
    let report = py.allow_threads(|| trainer.train());
    Ok((report.converged(), table_to_py(trainer.weights())))
}

// Trains PMI alignments, then derives smoothed n-gram weights from them.
#[pyfunction]
#[pyo3(signature = (
    pairs,
    order = None,
    learning_rate = 0.2,
    scaled = true,
))]
fn _estimate_ngram_weights(
    py: Python,
    pairs: Vec<(String, String)>,
    order: Option<usize>,
    learning_rate: f64,
    scaled: bool,
) -> PyResult<HashMap<PyRuleKey, f64>> {
    validate_learning_rate(learning_rate)?;
    let config = TrainerConfig {
        learning_rate,
        ..TrainerConfig::default()
    };
    let mut trainer = trainer_from_pairs(pairs, config);
    py.allow_threads(|| {
        trainer.train();
    });

    let estimator = trainer.ngram_estimator();
    let order = order.unwrap_or_else(|| estimator.default_order());
    let table = if scaled {
        estimator.scaled_cost_table(order)
    } else {
        estimator.estimate(order)
    };
    Ok(table_to_py(&table))
}

/// A Python module implemented in Rust.
#[pymodule]
pub fn _rust_pmi_levenshtein(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(_weighted_alignments, m)?)?;
    m.add_function(wrap_pyfunction!(_train_pmi_weights, m)?)?;
    m.add_function(wrap_pyfunction!(_estimate_ngram_weights, m)?)?;
    Ok(())
}
