use std::cmp::Ordering;

use super::types::{DataPoint, Dataset};
use crate::scoring::RawValue;

/// Compare two optional keys, keeping missing keys last regardless of direction.
fn missing_last<T>(a: Option<T>, b: Option<T>, ascending: bool, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = cmp(&x, &y);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl Dataset {
    /// Points by total score, best first. Unscored points come last and
    /// ties keep insertion order.
    pub fn ranked(&self) -> Vec<&DataPoint> {
        let mut points: Vec<&DataPoint> = self.data_points.iter().collect();
        points.sort_by(|a, b| missing_last(a.total_score, b.total_score, false, f64::total_cmp));
        points
    }

    /// Points sorted by the raw value of one parameter.
    pub fn order_by_parameter_value(&self, parameter: &str, ascending: bool) -> Vec<&DataPoint> {
        let mut points: Vec<&DataPoint> = self.data_points.iter().collect();
        points.sort_by(|a, b| {
            missing_last(
                a.entry(parameter).map(|e| &e.value),
                b.entry(parameter).map(|e| &e.value),
                ascending,
                |x, y| x.total_cmp(y),
            )
        });
        points
    }

    /// Points sorted by the computed score of one parameter.
    pub fn order_by_parameter_score(&self, parameter: &str, ascending: bool) -> Vec<&DataPoint> {
        let mut points: Vec<&DataPoint> = self.data_points.iter().collect();
        points.sort_by(|a, b| {
            missing_last(
                a.entry(parameter).map(|e| e.score),
                b.entry(parameter).map(|e| e.score),
                ascending,
                f64::total_cmp,
            )
        });
        points
    }

    /// Column order of the dataset, taken from its first point
    pub fn parameter_names(&self) -> Vec<&str> {
        self.data_points
            .first()
            .map(|dp| dp.parameter_datas.iter().map(|p| p.name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Raw values of one parameter across all points, in point order.
    /// This is the peer population relative normalizers rank against.
    pub fn values_for(&self, parameter: &str) -> Vec<RawValue> {
        self.data_points
            .iter()
            .filter_map(|dp| dp.entry(parameter))
            .map(|e| e.value.clone())
            .collect()
    }
}
