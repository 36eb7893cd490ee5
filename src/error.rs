use std::num::ParseFloatError;

use thiserror::Error;

/// Errors raised while loading, saving or configuring weight tables.
///
/// Alignment and training never fail; every variant here comes from
/// reading something a caller handed in.
#[derive(Error, Debug)]
pub enum WeightsError {
    #[error("Found tag \"{found}\", expected: {expected}")]
    UnexpectedTag { found: String, expected: String },

    #[error("Found WeightSet[type={found}], expected: WeightSet[type={{{expected}}}]")]
    UnrecognizedType { found: String, expected: String },

    #[error("Missing tag \"{tag}\"")]
    MissingTag { tag: String },

    #[error("Missing attribute \"{attribute}\" on tag \"{tag}\"")]
    MissingAttribute { tag: String, attribute: String },

    #[error("Invalid cost \"{value}\": {source}")]
    InvalidCost {
        value: String,
        source: ParseFloatError,
    },

    #[error("Negative cost {0} is not allowed")]
    NegativeCost(f64),

    #[error("Cost {0} is not a finite number")]
    NonFiniteCost(f64),

    #[error("Malformed line {line_number}: expected three tab-separated fields, got {line:?}")]
    MalformedLine { line_number: usize, line: String },

    #[error("Unrecognized file format: {0}")]
    UnrecognizedFormat(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, WeightsError>;
