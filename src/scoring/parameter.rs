use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::normalizer::{Normalizer, NormalizerFamily};
use super::value::RawValue;
use crate::error::{ConfigurationError, ValidationError};

fn default_weight() -> f64 {
    1.0
}

/// Inclusive numeric bounds for a numerical parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, x: f64) -> bool {
        self.min <= x && x <= self.max
    }
}

/// Inclusive time window for a time parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

/// The value domain a parameter accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterKind {
    Numerical {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value_range: Option<ValueRange>,
    },
    Boolean,
    /// Label to score lookup, in declared order
    Enum { labels: IndexMap<String, f64> },
    Time {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<TimeRange>,
    },
}

impl ParameterKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ParameterKind::Numerical { .. } => "numerical",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Enum { .. } => "enum",
            ParameterKind::Time { .. } => "time",
        }
    }

    /// Name of the raw value type this kind reads
    pub fn value_type(&self) -> &'static str {
        match self {
            ParameterKind::Numerical { .. } => "number",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Enum { .. } => "label",
            ParameterKind::Time { .. } => "timestamp",
        }
    }

    /// Normalizer family whose input matches what this kind hands over.
    /// Enum parameters pass the label's score, so they take numeric normalizers.
    pub fn family(&self) -> NormalizerFamily {
        match self {
            ParameterKind::Numerical { .. } | ParameterKind::Enum { .. } => {
                NormalizerFamily::Numeric
            }
            ParameterKind::Boolean => NormalizerFamily::Boolean,
            ParameterKind::Time { .. } => NormalizerFamily::Time,
        }
    }

    pub fn default_normalizer(&self) -> Normalizer {
        match self {
            ParameterKind::Numerical { .. } | ParameterKind::Enum { .. } => Normalizer::Identity,
            ParameterKind::Boolean => Normalizer::Boolean,
            ParameterKind::Time { .. } => Normalizer::RelativeTime,
        }
    }

    fn validate(&self, parameter: &str) -> Result<(), ConfigurationError> {
        match self {
            ParameterKind::Numerical {
                value_range: Some(range),
            } => {
                for (field, value) in [("value_range.min", range.min), ("value_range.max", range.max)] {
                    if !value.is_finite() {
                        return Err(ConfigurationError::NotFinite {
                            field: format!("{}.{}", parameter, field),
                            value,
                        });
                    }
                }
                if range.min > range.max {
                    return Err(ConfigurationError::InvertedRange {
                        what: format!("parameter '{}' value_range", parameter),
                        low: range.min.to_string(),
                        high: range.max.to_string(),
                    });
                }
                Ok(())
            }
            ParameterKind::Time { range: Some(range) } => {
                if range.start > range.end {
                    return Err(ConfigurationError::InvertedRange {
                        what: format!("parameter '{}' range", parameter),
                        low: range.start.to_rfc3339(),
                        high: range.end.to_rfc3339(),
                    });
                }
                Ok(())
            }
            ParameterKind::Enum { labels } => {
                if labels.is_empty() {
                    return Err(ConfigurationError::EmptyLabels(parameter.to_string()));
                }
                for (label, score) in labels {
                    if !score.is_finite() {
                        return Err(ConfigurationError::NotFinite {
                            field: format!("{}.labels.{}", parameter, label),
                            value: *score,
                        });
                    }
                }
                Ok(())
            }
            ParameterKind::Numerical { value_range: None }
            | ParameterKind::Time { range: None }
            | ParameterKind::Boolean => Ok(()),
        }
    }
}

/// On-disk shape of a parameter; the normalizer may be omitted and then
/// defaults by kind.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ParameterRecord {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_weight")]
    weight: f64,
    kind: ParameterKind,
    #[serde(default)]
    normalizer: Option<Normalizer>,
}

impl TryFrom<ParameterRecord> for Parameter {
    type Error = ConfigurationError;

    fn try_from(record: ParameterRecord) -> Result<Self, Self::Error> {
        let normalizer = record
            .normalizer
            .unwrap_or_else(|| record.kind.default_normalizer());
        let mut parameter = Parameter::new(record.name, record.kind, normalizer)?;
        parameter.description = record.description;
        parameter.weight = record.weight;
        Ok(parameter)
    }
}

/// One named decision criterion.
///
/// Example YAML:
/// ```yaml
/// name: price
/// weight: 2
/// kind:
///   type: numerical
///   value_range: { min: 0, max: 5000 }
/// normalizer:
///   type: linear_negative
///   low: 0
///   high: 5000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterRecord")]
pub struct Parameter {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    weight: f64,
    kind: ParameterKind,
    normalizer: Normalizer,
}

impl Parameter {
    /// Build a parameter, checking the kind, the normalizer and that the
    /// normalizer can read values of this kind.
    pub fn new(
        name: impl Into<String>,
        kind: ParameterKind,
        normalizer: Normalizer,
    ) -> Result<Self, ConfigurationError> {
        let parameter = Self {
            name: name.into(),
            description: None,
            weight: default_weight(),
            kind,
            normalizer,
        };
        parameter.validate()?;
        Ok(parameter)
    }

    pub fn with_default_normalizer(
        name: impl Into<String>,
        kind: ParameterKind,
    ) -> Result<Self, ConfigurationError> {
        let normalizer = kind.default_normalizer();
        Self::new(name, kind, normalizer)
    }

    pub fn numerical(
        name: impl Into<String>,
        value_range: Option<ValueRange>,
        normalizer: Normalizer,
    ) -> Result<Self, ConfigurationError> {
        Self::new(name, ParameterKind::Numerical { value_range }, normalizer)
    }

    pub fn boolean(name: impl Into<String>) -> Result<Self, ConfigurationError> {
        Self::new(name, ParameterKind::Boolean, Normalizer::Boolean)
    }

    pub fn enumeration<I, S>(
        name: impl Into<String>,
        labels: I,
        normalizer: Normalizer,
    ) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let labels = labels.into_iter().map(|(l, s)| (l.into(), s)).collect();
        Self::new(name, ParameterKind::Enum { labels }, normalizer)
    }

    pub fn time(
        name: impl Into<String>,
        range: Option<TimeRange>,
        normalizer: Normalizer,
    ) -> Result<Self, ConfigurationError> {
        Self::new(name, ParameterKind::Time { range }, normalizer)
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Weights are not bounded; only the model's total weight matters.
    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn set_normalizer(&mut self, normalizer: Normalizer) -> Result<(), ConfigurationError> {
        normalizer.validate()?;
        self.check_compatible(&normalizer)?;
        self.normalizer = normalizer;
        Ok(())
    }

    /// Only the owning model may rename, so its index stays in sync.
    pub(crate) fn rename(&mut self, name: String) {
        self.name = name;
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        self.kind.validate(&self.name)?;
        self.normalizer.validate()?;
        self.check_compatible(&self.normalizer)
    }

    fn check_compatible(&self, normalizer: &Normalizer) -> Result<(), ConfigurationError> {
        if normalizer.family().accepts(self.kind.family()) {
            Ok(())
        } else {
            Err(ConfigurationError::IncompatibleNormalizer {
                parameter: self.name.clone(),
                normalizer: normalizer.tag().to_string(),
                kind: self.kind.tag().to_string(),
            })
        }
    }

    fn mismatch(&self, raw: &RawValue) -> ValidationError {
        ValidationError::type_mismatch(&self.name, self.kind.value_type(), raw)
    }

    /// Check `raw` against the parameter's domain.
    ///
    /// A value of the wrong type is an error, not `false`.
    pub fn is_value_valid(&self, raw: &RawValue) -> Result<bool, ValidationError> {
        match (&self.kind, raw) {
            (ParameterKind::Numerical { value_range }, RawValue::Number(x)) => {
                Ok(value_range.map_or(true, |r| r.contains(*x)))
            }
            (ParameterKind::Boolean, RawValue::Bool(_)) => Ok(true),
            (ParameterKind::Enum { labels }, RawValue::Label(label)) => {
                Ok(labels.contains_key(label))
            }
            (ParameterKind::Time { range }, RawValue::Time(t)) => {
                Ok(range.map_or(true, |r| r.contains(*t)))
            }
            _ => Err(self.mismatch(raw)),
        }
    }

    /// Normalized score of `raw`; `peers` is the population for relative
    /// normalizers. The caller must have checked [`Self::is_value_valid`].
    pub fn evaluate_score(&self, raw: &RawValue, peers: &[RawValue]) -> Result<f64, ValidationError> {
        if let ParameterKind::Enum { labels } = &self.kind {
            let label_score = |v: &RawValue| v.as_label().and_then(|l| labels.get(l)).copied();
            let score = label_score(raw).ok_or_else(|| {
                ValidationError::type_mismatch(&self.name, "known label", raw)
            })?;
            let peer_scores: Vec<RawValue> = if self.normalizer.is_relative() {
                peers
                    .iter()
                    .filter_map(label_score)
                    .map(RawValue::Number)
                    .collect()
            } else {
                Vec::new()
            };
            return self
                .normalizer
                .normalize(&RawValue::Number(score), &peer_scores)
                .ok_or_else(|| self.mismatch(raw));
        }

        self.normalizer
            .normalize(raw, peers)
            .ok_or_else(|| self.mismatch(raw))
    }
}
