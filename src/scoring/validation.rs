use std::collections::HashSet;

use crate::model::Model;

/// Validate a model before it is stored or evaluated.
/// Returns all validation errors at once (not just the first).
pub fn validate_model(model: &Model) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if model.name.trim().is_empty() {
        errors.push("model.name: must not be empty".to_string());
    }

    if model.parameters().is_empty() {
        errors.push("model.parameters: at least one parameter is required".to_string());
    }

    let mut names = HashSet::new();
    for (i, parameter) in model.parameters().iter().enumerate() {
        if let Err(e) = parameter.validate() {
            errors.push(format!("model.parameters[{}] '{}': {}", i, parameter.name(), e));
        }
        if !parameter.weight().is_finite() {
            errors.push(format!(
                "model.parameters[{}] '{}': weight {} is not a finite number",
                i,
                parameter.name(),
                parameter.weight()
            ));
        }
        if !names.insert(parameter.name()) {
            errors.push(format!(
                "model.parameters[{}]: duplicate parameter name '{}'",
                i,
                parameter.name()
            ));
        }
    }

    // An empty model already reported above
    if !model.parameters().is_empty() && model.total_weight() == 0.0 {
        errors.push("model.parameters: weights sum to zero".to_string());
    }

    let mut datasets = HashSet::new();
    for (i, dataset) in model.datasets.iter().enumerate() {
        if !datasets.insert(dataset.name.as_str()) {
            errors.push(format!(
                "model.datasets[{}]: duplicate dataset name '{}'",
                i, dataset.name
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
