pub mod ordering;
pub mod types;

pub use types::{DataPoint, Dataset, ParameterData};
