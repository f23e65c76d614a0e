//! Error taxonomy of the scoring core.
//!
//! Construction problems are [`ConfigurationError`]s and are never retried.
//! Data problems found while evaluating a dataset are [`ValidationError`]s;
//! they reject that one dataset and leave the rest of the model's pass alone.

use thiserror::Error;

use crate::scoring::RawValue;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("{what}: range {low}..{high} has zero width")]
    ZeroWidthRange {
        what: String,
        low: String,
        high: String,
    },

    #[error("{what}: range {low}..{high} is inverted (low must not exceed high)")]
    InvertedRange {
        what: String,
        low: String,
        high: String,
    },

    #[error("uniform normalizer value {0} is outside 0..=100")]
    UniformOutOfBounds(f64),

    #[error("{field}: value {value} is not a finite number")]
    NotFinite { field: String, value: f64 },

    #[error("parameter '{parameter}': normalizer '{normalizer}' cannot score {kind} values")]
    IncompatibleNormalizer {
        parameter: String,
        normalizer: String,
        kind: String,
    },

    #[error("parameter '{0}': enum parameters need at least one label")]
    EmptyLabels(String),

    #[error("parameter name must not be empty")]
    EmptyName,

    #[error("parameter '{0}' already exists in the model")]
    DuplicateParameter(String),

    #[error("parameter '{0}' does not exist in the model")]
    UnknownParameter(String),

    #[error("invalid reorder {order:?}: expected a permutation of 0..{len}")]
    InvalidPermutation { order: Vec<usize>, len: usize },

    #[error("model '{0}' has a total parameter weight of zero and cannot be evaluated")]
    ZeroTotalWeight(String),

    #[error("unknown {family} variant '{tag}'")]
    UnknownVariant { family: &'static str, tag: String },

    #[error("invalid fields for '{tag}': {message}")]
    InvalidFields { tag: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error(
        "dataset '{dataset}', data point '{data_point}': datapoint cardinality mismatch \
         (model has {expected} parameters, data point has {found} entries)"
    )]
    CardinalityMismatch {
        dataset: String,
        data_point: String,
        expected: usize,
        found: usize,
    },

    #[error("dataset '{dataset}', data point '{data_point}': unknown parameter '{parameter}'")]
    UnknownParameter {
        dataset: String,
        data_point: String,
        parameter: String,
    },

    #[error("dataset '{dataset}', data point '{data_point}': parameter '{parameter}' appears more than once")]
    DuplicateEntry {
        dataset: String,
        data_point: String,
        parameter: String,
    },

    #[error(
        "dataset '{dataset}', data point '{data_point}': invalid value for parameter \
         '{parameter}': {value}"
    )]
    InvalidValue {
        dataset: String,
        data_point: String,
        parameter: String,
        value: String,
    },

    #[error("{context}parameter '{parameter}' expects a {expected} value, got {found}")]
    TypeMismatch {
        context: String,
        parameter: String,
        expected: &'static str,
        found: String,
    },
}

impl ValidationError {
    /// Type mismatch raised below the model, without dataset context yet.
    pub fn type_mismatch(parameter: &str, expected: &'static str, found: &RawValue) -> Self {
        ValidationError::TypeMismatch {
            context: String::new(),
            parameter: parameter.to_string(),
            expected,
            found: format!("{} ({})", found, found.type_name()),
        }
    }

    /// Attach the dataset and data point a type mismatch was found in.
    pub fn in_data_point(self, dataset: &str, data_point: &str) -> Self {
        match self {
            ValidationError::TypeMismatch {
                parameter,
                expected,
                found,
                ..
            } => ValidationError::TypeMismatch {
                context: format!("dataset '{}', data point '{}': ", dataset, data_point),
                parameter,
                expected,
                found,
            },
            other => other,
        }
    }
}

/// Any failure of a single evaluation step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
