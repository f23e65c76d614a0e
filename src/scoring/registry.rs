//! Enumerable catalogue of normalizer and parameter variants.
//!
//! Front ends list these to present choices, then build the chosen variant
//! from its tag plus a field map.

use serde_json::{Map, Value};

use super::normalizer::Normalizer;
use super::parameter::ParameterKind;
use crate::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantInfo {
    pub tag: &'static str,
    pub description: &'static str,
    /// Value types the variant applies to
    pub applies_to: &'static str,
    pub fields: &'static [FieldInfo],
}

const LOW_HIGH: &[FieldInfo] = &[
    FieldInfo {
        name: "low",
        description: "Value mapped to a score of 0",
    },
    FieldInfo {
        name: "high",
        description: "Value mapped to a score of 100",
    },
];

const STEP_LOW_HIGH: &[FieldInfo] = &[
    FieldInfo {
        name: "low",
        description: "Start of the interpolated interval (must be below high)",
    },
    FieldInfo {
        name: "high",
        description: "End of the interpolated interval",
    },
];

static NORMALIZERS: &[VariantInfo] = &[
    VariantInfo {
        tag: "identity",
        description: "Returns the value without any changes.",
        applies_to: "number",
        fields: &[],
    },
    VariantInfo {
        tag: "linear_positive",
        description: "Maps low..high linearly onto 0..100. Values outside the range are not clipped.",
        applies_to: "number",
        fields: LOW_HIGH,
    },
    VariantInfo {
        tag: "linear_negative",
        description: "100 minus linear_positive: low scores 100, high scores 0. Not clipped.",
        applies_to: "number",
        fields: LOW_HIGH,
    },
    VariantInfo {
        tag: "step",
        description: "0 below the threshold, 100 at or above it.",
        applies_to: "number",
        fields: &[FieldInfo {
            name: "threshold",
            description: "Smallest value that scores 100",
        }],
    },
    VariantInfo {
        tag: "step_linear_positive",
        description: "0 below low, 100 at or above high, linearly interpolated in between.",
        applies_to: "number",
        fields: STEP_LOW_HIGH,
    },
    VariantInfo {
        tag: "step_linear_negative",
        description: "100 below low, 0 at or above high, linearly interpolated in between.",
        applies_to: "number",
        fields: STEP_LOW_HIGH,
    },
    VariantInfo {
        tag: "boolean",
        description: "0 if the value is false or zero, 100 otherwise.",
        applies_to: "boolean, number",
        fields: &[],
    },
    VariantInfo {
        tag: "uniform",
        description: "Returns the same score for every input.",
        applies_to: "any",
        fields: &[FieldInfo {
            name: "value",
            description: "Score given to every value (0..100)",
        }],
    },
    VariantInfo {
        tag: "relative_ascending",
        description: "Rank of the value among all candidates: the smallest scores 0, the largest 100.",
        applies_to: "number",
        fields: &[],
    },
    VariantInfo {
        tag: "step_absolute_time",
        description: "0 before start, 100 after end, proportional to elapsed time in between.",
        applies_to: "timestamp",
        fields: &[
            FieldInfo {
                name: "start",
                description: "RFC 3339 timestamp scoring 0",
            },
            FieldInfo {
                name: "end",
                description: "RFC 3339 timestamp scoring 100",
            },
        ],
    },
    VariantInfo {
        tag: "relative_time",
        description: "Rank of the timestamp among all candidates: the earliest scores 0, the latest 100.",
        applies_to: "timestamp",
        fields: &[],
    },
];

static PARAMETERS: &[VariantInfo] = &[
    VariantInfo {
        tag: "numerical",
        description: "Numeric values such as costs, quantities or ratings.",
        applies_to: "number",
        fields: &[FieldInfo {
            name: "value_range",
            description: "Optional { min, max } bounds a value must fall within",
        }],
    },
    VariantInfo {
        tag: "boolean",
        description: "Yes/no values such as availability or compatibility.",
        applies_to: "boolean",
        fields: &[],
    },
    VariantInfo {
        tag: "enum",
        description: "One of a set of predefined labels, each mapped to a score.",
        applies_to: "label",
        fields: &[FieldInfo {
            name: "labels",
            description: "Map of label to score",
        }],
    },
    VariantInfo {
        tag: "time",
        description: "Dates or timestamps such as deadlines or build dates.",
        applies_to: "timestamp",
        fields: &[FieldInfo {
            name: "range",
            description: "Optional { start, end } window a timestamp must fall within",
        }],
    },
];

pub fn normalizer_variants() -> &'static [VariantInfo] {
    NORMALIZERS
}

pub fn parameter_variants() -> &'static [VariantInfo] {
    PARAMETERS
}

pub fn find_normalizer(tag: &str) -> Option<&'static VariantInfo> {
    NORMALIZERS.iter().find(|v| v.tag == tag)
}

pub fn find_parameter(tag: &str) -> Option<&'static VariantInfo> {
    PARAMETERS.iter().find(|v| v.tag == tag)
}

fn tagged(tag: &str, fields: &Map<String, Value>) -> Value {
    let mut object = fields.clone();
    object.insert("type".to_string(), Value::String(tag.to_string()));
    Value::Object(object)
}

fn invalid_fields(tag: &str, err: serde_json::Error) -> ConfigurationError {
    ConfigurationError::InvalidFields {
        tag: tag.to_string(),
        message: err.to_string(),
    }
}

/// Build and validate a normalizer from its registry tag and fields.
pub fn build_normalizer(tag: &str, fields: &Map<String, Value>) -> Result<Normalizer, ConfigurationError> {
    if find_normalizer(tag).is_none() {
        return Err(ConfigurationError::UnknownVariant {
            family: "normalizer",
            tag: tag.to_string(),
        });
    }
    let normalizer: Normalizer =
        serde_json::from_value(tagged(tag, fields)).map_err(|e| invalid_fields(tag, e))?;
    normalizer.validate()?;
    Ok(normalizer)
}

/// Build a parameter kind from its registry tag and fields.
///
/// Range checks that need the parameter name happen in `Parameter::new`.
pub fn build_parameter_kind(
    tag: &str,
    fields: &Map<String, Value>,
) -> Result<ParameterKind, ConfigurationError> {
    if find_parameter(tag).is_none() {
        return Err(ConfigurationError::UnknownVariant {
            family: "parameter",
            tag: tag.to_string(),
        });
    }
    serde_json::from_value(tagged(tag, fields)).map_err(|e| invalid_fields(tag, e))
}
