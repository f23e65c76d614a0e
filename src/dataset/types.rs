use serde::{Deserialize, Serialize};

use crate::scoring::RawValue;

/// One `(parameter, raw value, score)` entry of a data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterData {
    pub name: String,
    pub value: RawValue,
    /// Computed by evaluation; 0 until scored
    #[serde(default)]
    pub score: f64,
}

impl ParameterData {
    pub fn new(name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            score: 0.0,
        }
    }
}

/// One candidate: its raw values and, once evaluated, its total score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataPoint {
    pub name: String,
    #[serde(default)]
    pub parameter_datas: Vec<ParameterData>,
    /// `None` until the point has been scored
    #[serde(default)]
    pub total_score: Option<f64>,
}

impl DataPoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameter_datas: Vec::new(),
            total_score: None,
        }
    }

    pub fn with_value(mut self, parameter: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.parameter_datas.push(ParameterData::new(parameter, value));
        self
    }

    pub fn entry(&self, parameter: &str) -> Option<&ParameterData> {
        self.parameter_datas.iter().find(|p| p.name == parameter)
    }

    pub fn is_scored(&self) -> bool {
        self.total_score.is_some()
    }
}

/// A named collection of candidates, collected independently of any model.
///
/// Points are not validated on insertion; a dataset may be evaluated
/// against several models over its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dataset {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub data_points: Vec<DataPoint>,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            data_points: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_point(mut self, data_point: DataPoint) -> Self {
        self.add_data_point(data_point);
        self
    }

    pub fn add_data_point(&mut self, data_point: DataPoint) {
        self.data_points.push(data_point);
    }

    /// Remove every point named `name`.
    /// Returns how many were removed; zero is not an error.
    pub fn delete_data_point(&mut self, name: &str) -> usize {
        let before = self.data_points.len();
        self.data_points.retain(|dp| dp.name != name);
        before - self.data_points.len()
    }

    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }
}
