use tracing::{info, warn};

use super::Model;
use crate::dataset::Dataset;
use crate::error::{ConfigurationError, ScoringError};
use crate::scoring::{self, ScoredDataset};

/// What a successful dataset pass produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub points: usize,
    /// Name and total of the best-scoring point, if any
    pub best: Option<(String, f64)>,
}

impl DatasetSummary {
    fn from_scored(scored: &ScoredDataset) -> Self {
        Self {
            points: scored.points.len(),
            best: scored
                .ranked()
                .first()
                .map(|p| (p.name.clone(), p.total)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetOutcome {
    pub dataset: String,
    pub result: Result<DatasetSummary, ScoringError>,
}

/// Per-dataset results of one `evaluate_datasets` call, in dataset order.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub model: String,
    pub outcomes: Vec<DatasetOutcome>,
}

impl EvaluationReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ScoringError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.dataset.as_str(), e)))
    }

    pub fn scored(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}

impl Model {
    /// Score `dataset` without touching it.
    pub fn score_dataset(&self, dataset: &Dataset) -> Result<ScoredDataset, ScoringError> {
        scoring::score_dataset(self, dataset)
    }

    /// Score every owned dataset and write the scores back.
    ///
    /// A dataset is written only once all of its points pass; a rejected
    /// dataset keeps its previous scores and the remaining datasets still run.
    /// A zero total weight fails the whole call before any dataset is touched.
    pub fn evaluate_datasets(&mut self) -> Result<EvaluationReport, ConfigurationError> {
        if self.total_weight() == 0.0 {
            return Err(ConfigurationError::ZeroTotalWeight(self.name.clone()));
        }

        let mut outcomes = Vec::with_capacity(self.datasets.len());
        for i in 0..self.datasets.len() {
            let result = scoring::score_dataset(self, &self.datasets[i]);
            let dataset = &mut self.datasets[i];
            let result = match result {
                Ok(scored) => {
                    scored.apply_to(dataset);
                    Ok(DatasetSummary::from_scored(&scored))
                }
                Err(e) => {
                    warn!(dataset = %dataset.name, error = %e, "dataset rejected");
                    Err(e)
                }
            };
            outcomes.push(DatasetOutcome {
                dataset: dataset.name.clone(),
                result,
            });
        }

        let report = EvaluationReport {
            model: self.name.clone(),
            outcomes,
        };
        info!(
            model = %self.name,
            scored = report.scored(),
            total = report.outcomes.len(),
            "evaluation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataPoint;
    use crate::error::ValidationError;
    use crate::scoring::{Normalizer, Parameter, RawValue, ValueRange};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn guitar_model() -> Model {
        let mut m = Model::new("guitar-picker");
        m.add_parameter(
            Parameter::numerical(
                "price",
                Some(ValueRange::new(0.0, 5000.0)),
                Normalizer::linear_negative(0.0, 5000.0).unwrap(),
            )
            .unwrap()
            .with_weight(2.0),
        )
        .unwrap();
        m.add_parameter(
            Parameter::enumeration(
                "condition",
                [("As new", 100.0), ("Used", 60.0), ("Damaged", 0.0)],
                Normalizer::Identity,
            )
            .unwrap(),
        )
        .unwrap();
        m.add_parameter(Parameter::boolean("case").unwrap()).unwrap();
        m.add_parameter(
            Parameter::time("built", None, Normalizer::RelativeTime).unwrap(),
        )
        .unwrap();
        m
    }

    fn year(y: i32) -> RawValue {
        RawValue::Time(Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0).unwrap())
    }

    fn guitar(name: &str, price: f64, condition: &str, case: bool, built: i32) -> DataPoint {
        DataPoint::new(name)
            .with_value("price", price)
            .with_value("condition", condition)
            .with_value("case", case)
            .with_value("built", year(built))
    }

    fn guitars() -> Dataset {
        Dataset::new("guitars")
            .with_point(guitar("Les Paul", 2500.0, "Used", true, 2016))
            .with_point(guitar("Telecaster", 1000.0, "As new", false, 2020))
            .with_point(guitar("Mtm", 500.0, "Damaged", true, 1990))
    }

    #[test]
    fn test_weighted_mean_of_two_parameters() {
        let mut m = Model::new("m");
        m.add_parameter(Parameter::numerical("p1", None, Normalizer::Identity).unwrap())
            .unwrap();
        m.add_parameter(
            Parameter::numerical("p2", None, Normalizer::Identity)
                .unwrap()
                .with_weight(3.0),
        )
        .unwrap();
        m.add_dataset(Dataset::new("d").with_point(DataPoint::new("x").with_value("p1", 40).with_value("p2", 80)));

        let report = m.evaluate_datasets().unwrap();
        assert!(report.is_success());
        assert_eq!(m.datasets[0].data_points[0].total_score, Some(70.0));
    }

    #[test]
    fn test_full_evaluation() {
        let mut m = guitar_model();
        m.add_dataset(guitars());
        let report = m.evaluate_datasets().unwrap();
        assert_eq!(report.scored(), 1);

        let ds = &m.datasets[0];
        // Les Paul: price 50 x2, condition 60, case 100, built rank 50
        assert_eq!(ds.data_points[0].total_score, Some((100.0 + 60.0 + 100.0 + 50.0) / 5.0));
        // Telecaster: 80 x2, 100, 0, 100
        assert_eq!(ds.data_points[1].total_score, Some((160.0 + 100.0 + 0.0 + 100.0) / 5.0));
        // Mtm: 90 x2, 0, 100, 0
        assert_eq!(ds.data_points[2].total_score, Some((180.0 + 0.0 + 100.0 + 0.0) / 5.0));

        let ranked: Vec<&str> = ds.ranked().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(ranked, vec!["Telecaster", "Les Paul", "Mtm"]);

        let summary = report.outcomes[0].result.as_ref().unwrap();
        assert_eq!(summary.points, 3);
        assert_eq!(summary.best.as_ref().unwrap().0, "Telecaster");
    }

    #[test]
    fn test_rejected_dataset_is_untouched_and_others_proceed() {
        let mut m = guitar_model();
        let mut broken = guitars();
        broken.name = "broken".to_string();
        broken.data_points[1].parameter_datas.pop();
        let before = broken.clone();

        m.add_dataset(broken);
        m.add_dataset(guitars());
        let report = m.evaluate_datasets().unwrap();

        assert!(!report.is_success());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "broken");
        assert!(matches!(
            failures[0].1,
            ScoringError::Validation(ValidationError::CardinalityMismatch { .. })
        ));

        // First point passed the checks but must not have been written
        assert_eq!(m.datasets[0], before);
        assert!(m.datasets[1].data_points.iter().all(DataPoint::is_scored));
    }

    #[test]
    fn test_rerun_after_fix_matches_fresh_evaluation() {
        let mut m = guitar_model();
        let mut ds = guitars();
        ds.data_points[0].parameter_datas[0].value = RawValue::Number(9000.0);
        m.add_dataset(ds);
        assert!(!m.evaluate_datasets().unwrap().is_success());

        m.datasets[0].data_points[0].parameter_datas[0].value = RawValue::Number(2500.0);
        assert!(m.evaluate_datasets().unwrap().is_success());
        let fixed = m.datasets[0].clone();

        let mut fresh = guitar_model();
        fresh.add_dataset(guitars());
        fresh.evaluate_datasets().unwrap();
        assert_eq!(fixed, fresh.datasets[0]);

        // Evaluating again is idempotent
        m.evaluate_datasets().unwrap();
        assert_eq!(m.datasets[0], fixed);
    }

    #[test]
    fn test_zero_total_weight_touches_nothing() {
        let mut m = guitar_model();
        for name in ["price", "condition", "case", "built"] {
            m.set_weight(name, 0.0).unwrap();
        }
        m.add_dataset(guitars());
        let err = m.evaluate_datasets().unwrap_err();
        assert_eq!(err, ConfigurationError::ZeroTotalWeight("guitar-picker".to_string()));
        assert_eq!(m.datasets[0], guitars());
    }

    #[test]
    fn test_reorder_does_not_change_scores() {
        let mut a = guitar_model();
        a.add_dataset(guitars());
        a.evaluate_datasets().unwrap();

        let mut b = guitar_model();
        b.reorder_parameters(&[3, 1, 0, 2]).unwrap();
        b.add_dataset(guitars());
        b.evaluate_datasets().unwrap();

        assert_eq!(a.datasets, b.datasets);
    }

    #[test]
    fn test_renamed_parameter_requires_renamed_entries() {
        let mut m = guitar_model();
        m.rename_parameter("case", "gig_bag").unwrap();
        m.add_dataset(guitars());
        let report = m.evaluate_datasets().unwrap();
        let (_, err) = report.failures().next().unwrap();
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::UnknownParameter { parameter, .. }) if parameter == "case"
        ));
    }

    #[test]
    fn test_score_dataset_is_pure() {
        let m = guitar_model();
        let ds = guitars();
        let scored = m.score_dataset(&ds).unwrap();
        assert_eq!(scored.points.len(), 3);
        assert!(ds.data_points.iter().all(|p| !p.is_scored()));
    }
}
