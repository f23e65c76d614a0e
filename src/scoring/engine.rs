use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::value::RawValue;
use crate::dataset::{DataPoint, Dataset};
use crate::error::{ConfigurationError, ScoringError, ValidationError};
use crate::model::Model;

/// How one parameter contributed to a candidate's total.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub parameter: String,
    pub raw: RawValue,
    pub score: f64,
    pub weight: f64,
}

impl Contribution {
    pub fn weighted(&self) -> f64 {
        self.score * self.weight
    }
}

/// Scores computed for one data point, aligned with its entries.
#[derive(Debug, Clone, PartialEq)]
pub struct PointScore {
    pub name: String,
    pub total: f64,
    pub contributions: Vec<Contribution>,
}

/// Result of scoring a whole dataset, not yet written back.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDataset {
    pub dataset: String,
    pub points: Vec<PointScore>,
}

impl ScoredDataset {
    /// Write the computed scores into `dataset`. Raw values are untouched.
    ///
    /// `dataset` must be the one these scores were computed from.
    pub fn apply_to(&self, dataset: &mut Dataset) {
        debug_assert_eq!(dataset.data_points.len(), self.points.len());
        for (point, scored) in dataset.data_points.iter_mut().zip(&self.points) {
            for (entry, contribution) in point.parameter_datas.iter_mut().zip(&scored.contributions) {
                entry.score = contribution.score;
            }
            point.total_score = Some(scored.total);
        }
    }

    /// Point scores best first; ties keep dataset order
    pub fn ranked(&self) -> Vec<&PointScore> {
        let mut points: Vec<&PointScore> = self.points.iter().collect();
        points.sort_by(|a, b| b.total.total_cmp(&a.total));
        points
    }
}

/// `Σ(score·weight) / Σ(weight)`, or `None` when the weights sum to zero.
pub fn weighted_mean(pairs: impl IntoIterator<Item = (f64, f64)>) -> Option<f64> {
    let (weighted, total_weight) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(ws, tw), (score, weight)| (ws + score * weight, tw + weight));
    if total_weight == 0.0 {
        None
    } else {
        Some(weighted / total_weight)
    }
}

/// Check one data point against the model: entry count, parameter names,
/// and each raw value's domain.
fn validate_point(model: &Model, dataset: &str, point: &DataPoint) -> Result<(), ValidationError> {
    let expected = model.parameters().len();
    if point.parameter_datas.len() != expected {
        return Err(ValidationError::CardinalityMismatch {
            dataset: dataset.to_string(),
            data_point: point.name.clone(),
            expected,
            found: point.parameter_datas.len(),
        });
    }

    let mut seen = HashSet::new();
    for entry in &point.parameter_datas {
        let parameter =
            model
                .parameter(&entry.name)
                .ok_or_else(|| ValidationError::UnknownParameter {
                    dataset: dataset.to_string(),
                    data_point: point.name.clone(),
                    parameter: entry.name.clone(),
                })?;

        if !seen.insert(entry.name.as_str()) {
            return Err(ValidationError::DuplicateEntry {
                dataset: dataset.to_string(),
                data_point: point.name.clone(),
                parameter: entry.name.clone(),
            });
        }

        let valid = parameter
            .is_value_valid(&entry.value)
            .map_err(|e| e.in_data_point(dataset, &point.name))?;
        if !valid {
            return Err(ValidationError::InvalidValue {
                dataset: dataset.to_string(),
                data_point: point.name.clone(),
                parameter: entry.name.clone(),
                value: entry.value.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate and score every point of `dataset` against `model`.
///
/// Nothing is mutated: either every point passes and the full set of scores
/// is returned, or the first failure is. Write the result back with
/// [`ScoredDataset::apply_to`].
pub fn score_dataset(model: &Model, dataset: &Dataset) -> Result<ScoredDataset, ScoringError> {
    if model.total_weight() == 0.0 {
        return Err(ConfigurationError::ZeroTotalWeight(model.name.clone()).into());
    }

    for point in &dataset.data_points {
        validate_point(model, &dataset.name, point)?;
    }

    // Peer populations, gathered once per relative parameter
    let populations: HashMap<&str, Vec<RawValue>> = model
        .parameters()
        .iter()
        .filter(|p| p.normalizer().is_relative())
        .map(|p| (p.name(), dataset.values_for(p.name())))
        .collect();

    let mut points = Vec::with_capacity(dataset.data_points.len());
    for point in &dataset.data_points {
        let mut contributions = Vec::with_capacity(point.parameter_datas.len());
        for entry in &point.parameter_datas {
            // validate_point guarantees the lookup
            let Some(parameter) = model.parameter(&entry.name) else {
                continue;
            };
            let peers = populations
                .get(parameter.name())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let score = parameter
                .evaluate_score(&entry.value, peers)
                .map_err(|e| e.in_data_point(&dataset.name, &point.name))?;
            contributions.push(Contribution {
                parameter: entry.name.clone(),
                raw: entry.value.clone(),
                score,
                weight: parameter.weight(),
            });
        }

        let total = weighted_mean(contributions.iter().map(|c| (c.score, c.weight)))
            .ok_or_else(|| ConfigurationError::ZeroTotalWeight(model.name.clone()))?;
        points.push(PointScore {
            name: point.name.clone(),
            total,
            contributions,
        });
    }

    debug!(
        dataset = %dataset.name,
        model = %model.name,
        points = points.len(),
        "scored dataset"
    );

    Ok(ScoredDataset {
        dataset: dataset.name.clone(),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{Normalizer, Parameter, ValueRange};

    fn model() -> Model {
        let mut model = Model::new("guitar-picker");
        model
            .add_parameter(
                Parameter::numerical("p1", Some(ValueRange::new(0.0, 100.0)), Normalizer::Identity)
                    .unwrap(),
            )
            .unwrap();
        model
            .add_parameter(
                Parameter::numerical("p2", None, Normalizer::Identity)
                    .unwrap()
                    .with_weight(3.0),
            )
            .unwrap();
        model
    }

    #[test]
    fn test_weighted_mean() {
        assert_eq!(weighted_mean([(40.0, 1.0), (80.0, 3.0)]), Some(70.0));
        assert_eq!(weighted_mean([(40.0, 0.0)]), None);
        assert_eq!(weighted_mean(std::iter::empty()), None);
    }

    #[test]
    fn test_total_is_weighted_mean() {
        let ds = Dataset::new("d").with_point(DataPoint::new("a").with_value("p1", 40).with_value("p2", 80));
        let scored = score_dataset(&model(), &ds).unwrap();
        assert_eq!(scored.points[0].total, 70.0);
        assert_eq!(scored.points[0].contributions[1].weighted(), 240.0);

        let pairs = scored.points[0].contributions.iter().map(|c| (c.score, c.weight));
        assert_eq!(weighted_mean(pairs), Some(scored.points[0].total));
    }

    #[test]
    fn test_negative_weights_use_the_same_mean() {
        let mut m = model();
        m.set_weight("p1", -1.0).unwrap();
        let ds = Dataset::new("d").with_point(DataPoint::new("a").with_value("p1", 40).with_value("p2", 80));
        let scored = score_dataset(&m, &ds).unwrap();
        // (-40 + 240) / 2
        assert_eq!(scored.points[0].total, 100.0);
    }

    #[test]
    fn test_entry_order_does_not_matter() {
        let ds = Dataset::new("d").with_point(DataPoint::new("a").with_value("p2", 80).with_value("p1", 40));
        let scored = score_dataset(&model(), &ds).unwrap();
        assert_eq!(scored.points[0].total, 70.0);
        assert_eq!(scored.points[0].contributions[0].parameter, "p2");
    }

    #[test]
    fn test_cardinality_mismatch() {
        let ds = Dataset::new("d").with_point(DataPoint::new("short").with_value("p1", 40));
        let err = score_dataset(&model(), &ds).unwrap_err();
        assert_eq!(
            err,
            ScoringError::Validation(ValidationError::CardinalityMismatch {
                dataset: "d".to_string(),
                data_point: "short".to_string(),
                expected: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn test_unknown_parameter() {
        let ds = Dataset::new("d").with_point(DataPoint::new("a").with_value("p1", 1).with_value("p3", 2));
        let err = score_dataset(&model(), &ds).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::UnknownParameter { ref parameter, .. }) if parameter == "p3"
        ));
    }

    #[test]
    fn test_duplicate_entry() {
        let ds = Dataset::new("d").with_point(DataPoint::new("a").with_value("p1", 1).with_value("p1", 2));
        let err = score_dataset(&model(), &ds).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::DuplicateEntry { .. })
        ));
    }

    #[test]
    fn test_out_of_domain_value() {
        let ds = Dataset::new("d").with_point(DataPoint::new("a").with_value("p1", 101).with_value("p2", 2));
        let err = score_dataset(&model(), &ds).unwrap_err();
        match err {
            ScoringError::Validation(ValidationError::InvalidValue {
                dataset,
                parameter,
                value,
                ..
            }) => {
                assert_eq!(dataset, "d");
                assert_eq!(parameter, "p1");
                assert_eq!(value, "101");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_carries_context() {
        let ds = Dataset::new("d").with_point(DataPoint::new("a").with_value("p1", true).with_value("p2", 2));
        let err = score_dataset(&model(), &ds).unwrap_err();
        assert!(err.to_string().contains("dataset 'd', data point 'a'"));
    }

    #[test]
    fn test_zero_total_weight() {
        let mut m = model();
        m.set_weight("p1", 0.0).unwrap();
        m.set_weight("p2", 0.0).unwrap();
        let ds = Dataset::new("d");
        assert!(matches!(
            score_dataset(&m, &ds),
            Err(ScoringError::Configuration(ConfigurationError::ZeroTotalWeight(_)))
        ));
    }

    #[test]
    fn test_relative_population_is_the_dataset() {
        let mut m = Model::new("m");
        m.add_parameter(Parameter::numerical("x", None, Normalizer::RelativeAscending).unwrap())
            .unwrap();
        let ds = Dataset::new("d")
            .with_point(DataPoint::new("a").with_value("x", 0))
            .with_point(DataPoint::new("b").with_value("x", 30))
            .with_point(DataPoint::new("c").with_value("x", 10));
        let scored = score_dataset(&m, &ds).unwrap();
        let totals: Vec<f64> = scored.points.iter().map(|p| p.total).collect();
        assert_eq!(totals, vec![0.0, 100.0, 50.0]);
        let ranked: Vec<&str> = scored.ranked().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(ranked, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_apply_to_writes_scores_not_values() {
        let mut ds = Dataset::new("d").with_point(DataPoint::new("a").with_value("p1", 40).with_value("p2", 80));
        let scored = score_dataset(&model(), &ds).unwrap();
        scored.apply_to(&mut ds);
        let point = &ds.data_points[0];
        assert_eq!(point.total_score, Some(70.0));
        assert_eq!(point.parameter_datas[1].score, 80.0);
        assert_eq!(point.parameter_datas[1].value, RawValue::Number(80.0));
    }
}
