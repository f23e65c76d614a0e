use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::value::RawValue;
use crate::error::ConfigurationError;

/// Which kind of raw value a normalizer knows how to score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizerFamily {
    Numeric,
    Boolean,
    Time,
    /// Booleans and numbers, read by truthiness
    Truthy,
    /// Accepts any value (the constant normalizer)
    Any,
}

impl NormalizerFamily {
    pub fn accepts(self, wanted: NormalizerFamily) -> bool {
        match self {
            NormalizerFamily::Any => true,
            NormalizerFamily::Truthy => {
                matches!(wanted, NormalizerFamily::Numeric | NormalizerFamily::Boolean)
            }
            _ => self == wanted,
        }
    }
}

/// Maps a raw value onto the common 0-100 score scale.
///
/// Every variant is a pure function of its configuration, the raw value and,
/// for the relative variants, the peer population passed on each call.
///
/// Example YAML:
/// ```yaml
/// type: step_linear_positive
/// low: 30
/// high: 70
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Normalizer {
    /// Score is the raw value itself
    Identity,
    /// 0 at `low`, 100 at `high`, unclamped outside the range.
    /// `low > high` is allowed and gives a descending line.
    LinearPositive { low: f64, high: f64 },
    /// `100 - LinearPositive`
    LinearNegative { low: f64, high: f64 },
    /// 0 below the threshold, 100 at or above it
    Step { threshold: f64 },
    /// 0 below `low`, 100 at or above `high`, linear in between
    StepLinearPositive { low: f64, high: f64 },
    /// 100 below `low`, 0 at or above `high`, linear in between
    StepLinearNegative { low: f64, high: f64 },
    /// 0 for false or zero, 100 otherwise
    Boolean,
    /// Same score for every input
    Uniform { value: f64 },
    /// Rank among the peer population scaled to 0-100
    RelativeAscending,
    /// 0 before `start`, 100 after `end`, elapsed-time ratio in between
    StepAbsoluteTime {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Rank among the peer timestamps scaled to 0-100
    RelativeTime,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::Identity
    }
}

impl Normalizer {
    pub fn linear_positive(low: f64, high: f64) -> Result<Self, ConfigurationError> {
        Self::checked(Normalizer::LinearPositive { low, high })
    }

    pub fn linear_negative(low: f64, high: f64) -> Result<Self, ConfigurationError> {
        Self::checked(Normalizer::LinearNegative { low, high })
    }

    pub fn step(threshold: f64) -> Result<Self, ConfigurationError> {
        Self::checked(Normalizer::Step { threshold })
    }

    pub fn step_linear_positive(low: f64, high: f64) -> Result<Self, ConfigurationError> {
        Self::checked(Normalizer::StepLinearPositive { low, high })
    }

    pub fn step_linear_negative(low: f64, high: f64) -> Result<Self, ConfigurationError> {
        Self::checked(Normalizer::StepLinearNegative { low, high })
    }

    pub fn uniform(value: f64) -> Result<Self, ConfigurationError> {
        Self::checked(Normalizer::Uniform { value })
    }

    pub fn step_absolute_time(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, ConfigurationError> {
        Self::checked(Normalizer::StepAbsoluteTime { start, end })
    }

    fn checked(normalizer: Normalizer) -> Result<Self, ConfigurationError> {
        normalizer.validate()?;
        Ok(normalizer)
    }

    /// Check the construction rules of this variant.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let what = format!("{} normalizer", self.tag());
        match self {
            Normalizer::LinearPositive { low, high } | Normalizer::LinearNegative { low, high } => {
                finite("low", *low)?;
                finite("high", *high)?;
                if low == high {
                    return Err(zero_width(what, low, high));
                }
                Ok(())
            }
            Normalizer::StepLinearPositive { low, high }
            | Normalizer::StepLinearNegative { low, high } => {
                finite("low", *low)?;
                finite("high", *high)?;
                match low.partial_cmp(high) {
                    Some(Ordering::Equal) => Err(zero_width(what, low, high)),
                    Some(Ordering::Greater) => Err(inverted(what, low, high)),
                    _ => Ok(()),
                }
            }
            Normalizer::Step { threshold } => finite("threshold", *threshold),
            Normalizer::Uniform { value } => {
                finite("value", *value)?;
                if !(0.0..=100.0).contains(value) {
                    return Err(ConfigurationError::UniformOutOfBounds(*value));
                }
                Ok(())
            }
            Normalizer::StepAbsoluteTime { start, end } => match start.cmp(end) {
                Ordering::Equal => Err(zero_width(what, start, end)),
                Ordering::Greater => Err(inverted(what, start, end)),
                Ordering::Less => Ok(()),
            },
            Normalizer::Identity
            | Normalizer::Boolean
            | Normalizer::RelativeAscending
            | Normalizer::RelativeTime => Ok(()),
        }
    }

    /// Registry tag of the variant (matches the serialized `type`)
    pub fn tag(&self) -> &'static str {
        match self {
            Normalizer::Identity => "identity",
            Normalizer::LinearPositive { .. } => "linear_positive",
            Normalizer::LinearNegative { .. } => "linear_negative",
            Normalizer::Step { .. } => "step",
            Normalizer::StepLinearPositive { .. } => "step_linear_positive",
            Normalizer::StepLinearNegative { .. } => "step_linear_negative",
            Normalizer::Boolean => "boolean",
            Normalizer::Uniform { .. } => "uniform",
            Normalizer::RelativeAscending => "relative_ascending",
            Normalizer::StepAbsoluteTime { .. } => "step_absolute_time",
            Normalizer::RelativeTime => "relative_time",
        }
    }

    pub fn family(&self) -> NormalizerFamily {
        match self {
            Normalizer::Identity
            | Normalizer::LinearPositive { .. }
            | Normalizer::LinearNegative { .. }
            | Normalizer::Step { .. }
            | Normalizer::StepLinearPositive { .. }
            | Normalizer::StepLinearNegative { .. }
            | Normalizer::RelativeAscending => NormalizerFamily::Numeric,
            Normalizer::Boolean => NormalizerFamily::Truthy,
            Normalizer::StepAbsoluteTime { .. } | Normalizer::RelativeTime => {
                NormalizerFamily::Time
            }
            Normalizer::Uniform { .. } => NormalizerFamily::Any,
        }
    }

    /// Whether the score depends on the peer population
    pub fn is_relative(&self) -> bool {
        matches!(
            self,
            Normalizer::RelativeAscending | Normalizer::RelativeTime
        )
    }

    /// Score `raw` against `peers`.
    ///
    /// Returns `None` when `raw` is not a value this normalizer can read.
    /// Peers of another type are ignored.
    pub fn normalize(&self, raw: &RawValue, peers: &[RawValue]) -> Option<f64> {
        match self {
            Normalizer::Identity => raw.as_number().map(identity),
            Normalizer::LinearPositive { low, high } => {
                raw.as_number().map(|x| linear_positive(x, *low, *high))
            }
            Normalizer::LinearNegative { low, high } => {
                raw.as_number().map(|x| linear_negative(x, *low, *high))
            }
            Normalizer::Step { threshold } => raw.as_number().map(|x| step(x, *threshold)),
            Normalizer::StepLinearPositive { low, high } => {
                raw.as_number().map(|x| step_linear_positive(x, *low, *high))
            }
            Normalizer::StepLinearNegative { low, high } => {
                raw.as_number().map(|x| step_linear_negative(x, *low, *high))
            }
            Normalizer::Boolean => match raw {
                RawValue::Bool(_) | RawValue::Number(_) => Some(boolean(raw.is_truthy())),
                _ => None,
            },
            Normalizer::Uniform { value } => Some(*value),
            Normalizer::RelativeAscending => {
                let x = raw.as_number()?;
                let population: Vec<f64> = peers.iter().filter_map(RawValue::as_number).collect();
                Some(relative_ascending(x, &population))
            }
            Normalizer::StepAbsoluteTime { start, end } => {
                raw.as_time().map(|t| step_absolute_time(t, *start, *end))
            }
            Normalizer::RelativeTime => {
                let t = raw.as_time()?;
                let population: Vec<DateTime<Utc>> =
                    peers.iter().filter_map(RawValue::as_time).collect();
                Some(relative_time(t, &population))
            }
        }
    }
}

impl fmt::Display for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Normalizer::LinearPositive { low, high }
            | Normalizer::LinearNegative { low, high }
            | Normalizer::StepLinearPositive { low, high }
            | Normalizer::StepLinearNegative { low, high } => {
                write!(f, "{}({}..{})", self.tag(), low, high)
            }
            Normalizer::Step { threshold } => write!(f, "step({})", threshold),
            Normalizer::Uniform { value } => write!(f, "uniform({})", value),
            Normalizer::StepAbsoluteTime { start, end } => write!(
                f,
                "step_absolute_time({}..{})",
                start.to_rfc3339(),
                end.to_rfc3339()
            ),
            Normalizer::Identity
            | Normalizer::Boolean
            | Normalizer::RelativeAscending
            | Normalizer::RelativeTime => write!(f, "{}", self.tag()),
        }
    }
}

fn finite(field: &str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigurationError::NotFinite {
            field: field.to_string(),
            value,
        })
    }
}

fn zero_width(what: String, low: &impl fmt::Display, high: &impl fmt::Display) -> ConfigurationError {
    ConfigurationError::ZeroWidthRange {
        what,
        low: low.to_string(),
        high: high.to_string(),
    }
}

fn inverted(what: String, low: &impl fmt::Display, high: &impl fmt::Display) -> ConfigurationError {
    ConfigurationError::InvertedRange {
        what,
        low: low.to_string(),
        high: high.to_string(),
    }
}

pub fn identity(x: f64) -> f64 {
    x
}

pub fn linear_positive(x: f64, low: f64, high: f64) -> f64 {
    100.0 * (x - low) / (high - low)
}

pub fn linear_negative(x: f64, low: f64, high: f64) -> f64 {
    100.0 - linear_positive(x, low, high)
}

pub fn step(x: f64, threshold: f64) -> f64 {
    if x < threshold {
        0.0
    } else {
        100.0
    }
}

pub fn step_linear_positive(x: f64, low: f64, high: f64) -> f64 {
    if x < low {
        0.0
    } else if x < high {
        linear_positive(x, low, high)
    } else {
        100.0
    }
}

pub fn step_linear_negative(x: f64, low: f64, high: f64) -> f64 {
    if x >= high {
        0.0
    } else if x < low {
        100.0
    } else {
        100.0 * (x - high) / (low - high)
    }
}

pub fn boolean(truthy: bool) -> f64 {
    if truthy {
        100.0
    } else {
        0.0
    }
}

pub fn step_absolute_time(t: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    if t < start {
        0.0
    } else if t > end {
        100.0
    } else {
        let elapsed = (t - start).num_milliseconds() as f64;
        let width = (end - start).num_milliseconds() as f64;
        elapsed / width * 100.0
    }
}

pub fn relative_ascending(x: f64, peers: &[f64]) -> f64 {
    relative_rank(&x, peers, f64::total_cmp)
}

pub fn relative_time(t: DateTime<Utc>, peers: &[DateTime<Utc>]) -> f64 {
    relative_rank(&t, peers, |a, b| a.cmp(b))
}

/// Rank of `x` in the ascending (stable) sort of `peers`, scaled to 0-100.
///
/// Ties resolve to the first matching position, so equal values share the
/// lowest rank of their group. A value absent from `peers` scores 0; a
/// single-element population scores 100.
fn relative_rank<T, F>(x: &T, peers: &[T], compare: F) -> f64
where
    T: PartialEq + Clone,
    F: FnMut(&T, &T) -> Ordering,
{
    let mut sorted = peers.to_vec();
    sorted.sort_by(compare);
    match sorted.iter().position(|v| v == x) {
        None => 0.0,
        Some(_) if sorted.len() == 1 => 100.0,
        Some(index) => index as f64 / (sorted.len() - 1) as f64 * 100.0,
    }
}
