pub mod engine;
pub mod normalizer;
pub mod parameter;
pub mod registry;
pub mod validation;
pub mod value;

pub use engine::{score_dataset, weighted_mean, Contribution, PointScore, ScoredDataset};
pub use normalizer::{Normalizer, NormalizerFamily};
pub use parameter::{Parameter, ParameterKind, TimeRange, ValueRange};
pub use validation::validate_model;
pub use value::RawValue;
