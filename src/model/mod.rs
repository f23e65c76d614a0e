pub mod evaluation;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::ConfigurationError;
use crate::scoring::{Normalizer, Parameter};

pub use evaluation::{DatasetOutcome, DatasetSummary, EvaluationReport};

/// On-disk shape of a model. The parameter index is derived, never stored.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelRecord {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Vec<Parameter>,
    #[serde(default)]
    datasets: Vec<Dataset>,
}

impl TryFrom<ModelRecord> for Model {
    type Error = ConfigurationError;

    fn try_from(record: ModelRecord) -> Result<Self, Self::Error> {
        let mut model = Model {
            name: record.name,
            description: record.description,
            parameters: record.parameters,
            datasets: record.datasets,
            index: HashMap::new(),
        };
        model.rebuild_index()?;
        Ok(model)
    }
}

/// A weighted scoring model: ordered parameters plus the datasets it scores.
///
/// Parameters are looked up by name during evaluation through an index that
/// every structural mutation rebuilds, so it can never drift from the list.
/// Order matters only for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModelRecord")]
pub struct Model {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    parameters: Vec<Parameter>,
    pub datasets: Vec<Dataset>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
            datasets: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checked rebuild for parameter lists that come from outside.
    fn rebuild_index(&mut self) -> Result<(), ConfigurationError> {
        let mut index = HashMap::with_capacity(self.parameters.len());
        for (i, parameter) in self.parameters.iter().enumerate() {
            if index.insert(parameter.name().to_string(), i).is_some() {
                return Err(ConfigurationError::DuplicateParameter(
                    parameter.name().to_string(),
                ));
            }
        }
        self.index = index;
        Ok(())
    }

    /// Rebuild after a mutation that keeps names unique.
    fn reindex(&mut self) {
        self.index = self
            .parameters
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name().to_string(), i))
            .collect();
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.parameters[i])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn parameter_mut(&mut self, name: &str) -> Result<&mut Parameter, ConfigurationError> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.parameters[i]),
            None => Err(ConfigurationError::UnknownParameter(name.to_string())),
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.parameters.iter().map(Parameter::weight).sum()
    }

    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<(), ConfigurationError> {
        if self.index.contains_key(parameter.name()) {
            return Err(ConfigurationError::DuplicateParameter(
                parameter.name().to_string(),
            ));
        }
        self.index
            .insert(parameter.name().to_string(), self.parameters.len());
        self.parameters.push(parameter);
        Ok(())
    }

    pub fn delete_parameter(&mut self, name: &str) -> Option<Parameter> {
        let position = self.index.get(name).copied()?;
        let removed = self.parameters.remove(position);
        self.reindex();
        Some(removed)
    }

    pub fn rename_parameter(&mut self, old: &str, new: &str) -> Result<(), ConfigurationError> {
        if new.trim().is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        let position = self
            .position(old)
            .ok_or_else(|| ConfigurationError::UnknownParameter(old.to_string()))?;
        if old == new {
            return Ok(());
        }
        if self.index.contains_key(new) {
            return Err(ConfigurationError::DuplicateParameter(new.to_string()));
        }
        self.parameters[position].rename(new.to_string());
        self.index.remove(old);
        self.index.insert(new.to_string(), position);
        Ok(())
    }

    /// Reorder parameters so that new position `i` holds old position `order[i]`.
    pub fn reorder_parameters(&mut self, order: &[usize]) -> Result<(), ConfigurationError> {
        let len = self.parameters.len();
        let mut seen = vec![false; len];
        let is_permutation = order.len() == len
            && order.iter().all(|&i| i < len && !std::mem::replace(&mut seen[i], true));
        if !is_permutation {
            return Err(ConfigurationError::InvalidPermutation {
                order: order.to_vec(),
                len,
            });
        }

        let mut old: Vec<Option<Parameter>> = self.parameters.drain(..).map(Some).collect();
        self.parameters = order.iter().filter_map(|&i| old[i].take()).collect();
        self.reindex();
        Ok(())
    }

    pub fn set_weight(&mut self, name: &str, weight: f64) -> Result<(), ConfigurationError> {
        if !weight.is_finite() {
            return Err(ConfigurationError::NotFinite {
                field: format!("{}.weight", name),
                value: weight,
            });
        }
        self.parameter_mut(name)?.set_weight(weight);
        Ok(())
    }

    pub fn set_normalizer(&mut self, name: &str, normalizer: Normalizer) -> Result<(), ConfigurationError> {
        self.parameter_mut(name)?.set_normalizer(normalizer)
    }

    /// Attach a dataset, replacing any existing dataset of the same name.
    pub fn add_dataset(&mut self, dataset: Dataset) -> Option<Dataset> {
        match self.datasets.iter_mut().find(|d| d.name == dataset.name) {
            Some(existing) => Some(std::mem::replace(existing, dataset)),
            None => {
                self.datasets.push(dataset);
                None
            }
        }
    }

    /// Returns how many datasets were removed; zero is not an error.
    pub fn delete_dataset(&mut self, name: &str) -> usize {
        let before = self.datasets.len();
        self.datasets.retain(|d| d.name != name);
        before - self.datasets.len()
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        crate::scoring::validate_model(self)
    }
}
