use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A raw, un-normalized value collected for one parameter of one candidate.
///
/// Serialized untagged: booleans and numbers map to themselves, strings that
/// parse as RFC 3339 timestamps become [`RawValue::Time`], any other string
/// is a [`RawValue::Label`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
    Time(DateTime<Utc>),
    Label(String),
}

impl RawValue {
    pub fn label(s: impl Into<String>) -> Self {
        RawValue::Label(s.into())
    }

    /// Human name of the value's type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::Bool(_) => "boolean",
            RawValue::Number(_) => "number",
            RawValue::Time(_) => "timestamp",
            RawValue::Label(_) => "label",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            RawValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            RawValue::Label(s) => Some(s),
            _ => None,
        }
    }

    /// Falsy values are `false` and numeric zero; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            RawValue::Bool(b) => *b,
            RawValue::Number(n) => *n != 0.0,
            RawValue::Time(_) => true,
            RawValue::Label(s) => !s.is_empty(),
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            RawValue::Bool(_) => 0,
            RawValue::Number(_) => 1,
            RawValue::Time(_) => 2,
            RawValue::Label(_) => 3,
        }
    }

    /// Total ordering for sorting mixed columns.
    /// Same-variant values compare naturally; across variants
    /// Bool < Number < Time < Label.
    pub fn total_cmp(&self, other: &RawValue) -> Ordering {
        match (self, other) {
            (RawValue::Bool(a), RawValue::Bool(b)) => a.cmp(b),
            (RawValue::Number(a), RawValue::Number(b)) => a.total_cmp(b),
            (RawValue::Time(a), RawValue::Time(b)) => a.cmp(b),
            (RawValue::Label(a), RawValue::Label(b)) => a.cmp(b),
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Bool(b) => write!(f, "{}", b),
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
            RawValue::Label(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        RawValue::Number(f64::from(n))
    }
}

impl From<DateTime<Utc>> for RawValue {
    fn from(t: DateTime<Utc>) -> Self {
        RawValue::Time(t)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Label(s.to_string())
    }
}
