//! Training and estimation parameters.
//!
//! Both structs deserialize from TOML with every field optional:
//!
//! ```toml
//! learning_rate = 0.2
//! convergence_quota = 0.01
//! max_cycles = 19
//!
//! [ngram]
//! order = 3
//! divisor = 7.0
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::weighted_levenshtein::DEFAULT_MAX_RULE_SETS;

/// Parameters of the PMI training loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// How fast weights move towards the freshly computed distance.
    pub learning_rate: f64,
    /// Training stops once the average weight change is at or below this.
    pub convergence_quota: f64,
    /// Hard cap on training cycles.
    pub max_cycles: usize,
    /// Longest run of edit operations counted as one rule while training.
    pub ngram_order: usize,
    /// Tied rule sets kept per pair and cycle.
    pub max_rule_sets: usize,
    pub ngram: NgramConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            learning_rate: 0.2,
            convergence_quota: 0.01,
            max_cycles: 19,
            ngram_order: 1,
            max_rule_sets: DEFAULT_MAX_RULE_SETS,
            ngram: NgramConfig::default(),
        }
    }
}

impl TrainerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Parameters of the smoothed n-gram weight estimator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NgramConfig {
    pub order: usize,
    /// Additive smoothing constant.
    pub smoothing: f64,
    /// Total pair observations divided by this gives the minimum frequency
    /// assumed for any source side.
    pub min_freq_divisor: f64,
    /// Published weights are divided by this factor.
    pub divisor: f64,
    /// Floor for published weights.
    pub min_weight: f64,
}

impl Default for NgramConfig {
    fn default() -> Self {
        NgramConfig {
            order: 3,
            smoothing: 0.5,
            min_freq_divisor: 6.293,
            divisor: 7.0,
            min_weight: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WeightsError;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = TrainerConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrainerConfig::default());
        assert_eq!(config.max_cycles, 19);
        assert_eq!(config.ngram.min_freq_divisor, 6.293);
    }

    #[test]
    fn test_partial_override() {
        let config = TrainerConfig::from_toml_str(
            "learning_rate = 0.5\n[ngram]\norder = 2\n",
        )
        .unwrap();
        assert_eq!(config.learning_rate, 0.5);
        assert_eq!(config.convergence_quota, 0.01);
        assert_eq!(config.ngram.order, 2);
        assert_eq!(config.ngram.divisor, 7.0);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = TrainerConfig::from_toml_str("learning_rate = \"fast\"").unwrap_err();
        assert!(matches!(err, WeightsError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trainer.toml");
        std::fs::write(&path, "max_cycles = 5\n").unwrap();
        assert_eq!(TrainerConfig::load(&path).unwrap().max_cycles, 5);
    }
}
