//! Weighted Levenshtein alignment that keeps every optimal path, plus
//! iterative PMI training of the edit costs it runs on.
//!
//! ```
//! use pmi_levenshtein::{Aligner, CostMode, CostTable};
//!
//! let mut weights = CostTable::new(CostMode::Directed);
//! weights.set("v", "u", 0.1);
//! let result = Aligner::new(&weights).compute_alignments("vnd", "und");
//! assert!((result.cost - 0.1).abs() < 1e-12);
//! assert_eq!(result.rule_sets.len(), 1);
//! ```

pub mod config;
pub mod conversion;
pub mod cost_table;
pub mod error;
pub mod explanation;
pub mod ngram_weights;
pub mod ngrams;
pub mod persistence;
pub mod pmi;
pub mod types;
pub mod weighted_levenshtein;

#[cfg(feature = "python")]
mod rust_pmi_levenshtein;

pub use config::{NgramConfig, TrainerConfig};
pub use conversion::{merge_insertions, revert_conversion, ConversionOptions, Token};
pub use cost_table::{CostMode, CostTable};
pub use error::{Result, WeightsError};
pub use explanation::{AlignmentResult, EditOperation, RuleSet};
pub use ngram_weights::NgramWeightEstimator;
pub use persistence::WeightFormat;
pub use pmi::{CycleReport, PmiTrainer, TrainingReport, TrainingStatus, DEGENERATE_DISTANCE};
pub use types::{RuleKey, EPSILON};
pub use weighted_levenshtein::{Aligner, DEFAULT_MAX_RULE_SETS};

#[cfg(feature = "python")]
pub use rust_pmi_levenshtein::_rust_pmi_levenshtein;
