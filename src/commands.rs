//! Command handlers behind the CLI.
//!
//! Each handler works against any [`Store`] and returns the text to print,
//! so the binary only parses arguments and writes output.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::dataset::{DataPoint, Dataset};
use crate::error::ConfigurationError;
use crate::model::Model;
use crate::output;
use crate::scoring::{registry, Parameter};
use crate::store::{EntityKind, Storable, Store};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_STORE: i32 = 2;
pub const EXIT_VALIDATION: i32 = 3;
pub const EXIT_CONFIG: i32 = 4;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("invalid model '{model}':\n  - {}", .errors.join("\n  - "))]
    InvalidModel { model: String, errors: Vec<String> },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },

    /// An input file that could not be read or parsed
    #[error(transparent)]
    Input(anyhow::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl CommandError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Configuration(_) | CommandError::InvalidModel { .. } | CommandError::Input(_) => {
                EXIT_CONFIG
            }
            CommandError::NotFound { .. } | CommandError::Store(_) => EXIT_STORE,
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// What a command produced. `report` goes to stderr.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    pub text: String,
    pub report: Option<String>,
    /// Some dataset was rejected during evaluation
    pub rejected: bool,
}

impl Output {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.rejected {
            EXIT_VALIDATION
        } else {
            EXIT_SUCCESS
        }
    }
}

/// Display settings shared by every command
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Display {
    pub colors: bool,
    pub limit: Option<usize>,
}

/// Read a definition file; `.yaml`/`.yml` is YAML, anything else JSON.
pub fn read_definition<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))
        .map_err(CommandError::Input)?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let parsed = if is_yaml {
        serde_saphyr::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON in {}", path.display()))
    };
    parsed.map_err(CommandError::Input)
}

fn load_existing<T: Storable>(store: &impl Store, name: &str) -> Result<T> {
    if !store.exists(T::KIND, name)? {
        return Err(CommandError::NotFound {
            kind: T::KIND,
            name: name.to_string(),
        });
    }
    Ok(store.load(name)?)
}

fn check_model(model: &Model) -> Result<()> {
    model.validate().map_err(|errors| CommandError::InvalidModel {
        model: model.name.clone(),
        errors,
    })
}

/// Parse `key=value` pairs into a field map. Values are read as JSON when
/// possible (`low=10`, `flag=true`), otherwise kept as strings.
pub fn parse_fields(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut fields = Map::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').ok_or_else(|| {
            CommandError::Input(anyhow::anyhow!("Invalid field '{}': expected key=value", pair))
        })?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        fields.insert(key.trim().to_string(), value);
    }
    Ok(fields)
}

pub fn list_normalizers(display: &Display) -> Output {
    Output::text(output::format_variants(registry::normalizer_variants(), display.colors))
}

pub fn list_parameter_kinds(display: &Display) -> Output {
    Output::text(output::format_variants(registry::parameter_variants(), display.colors))
}

pub fn list(store: &impl Store, kind: EntityKind) -> Result<Output> {
    let names = store.list(kind)?;
    Ok(Output::text(output::format_names(
        &names,
        &format!("No {}s stored.", kind),
    )))
}

pub fn delete(store: &mut impl Store, kind: EntityKind, name: &str) -> Result<Output> {
    if !store.delete(kind, name)? {
        return Err(CommandError::NotFound {
            kind,
            name: name.to_string(),
        });
    }
    Ok(Output::text(format!("Deleted {} '{}'", kind, name)))
}

pub fn import_model(store: &mut impl Store, path: &Path) -> Result<Output> {
    let model: Model = read_definition(path)?;
    check_model(&model)?;
    store.save(&model)?;
    debug!(model = %model.name, "imported model");
    Ok(Output::text(format!(
        "Imported model '{}' ({} parameters, {} datasets)",
        model.name,
        model.parameters().len(),
        model.datasets.len()
    )))
}

pub fn show_model(store: &impl Store, name: &str, display: &Display) -> Result<Output> {
    let model: Model = load_existing(store, name)?;
    Ok(Output::text(output::format_model(&model, display.colors)))
}

/// Load a model, apply `edit`, and save it back.
fn edit_model<F>(store: &mut impl Store, name: &str, edit: F) -> Result<Model>
where
    F: FnOnce(&mut Model) -> Result<()>,
{
    let mut model: Model = load_existing(store, name)?;
    edit(&mut model)?;
    store.save(&model)?;
    Ok(model)
}

pub fn model_add_parameter(store: &mut impl Store, model: &str, parameter: &str) -> Result<Output> {
    let parameter: Parameter = load_existing(store, parameter)?;
    let name = parameter.name().to_string();
    edit_model(store, model, |m| Ok(m.add_parameter(parameter)?))?;
    Ok(Output::text(format!("Added parameter '{}' to model '{}'", name, model)))
}

pub fn model_delete_parameter(store: &mut impl Store, model: &str, parameter: &str) -> Result<Output> {
    edit_model(store, model, |m| {
        m.delete_parameter(parameter)
            .map(|_| ())
            .ok_or_else(|| ConfigurationError::UnknownParameter(parameter.to_string()).into())
    })?;
    Ok(Output::text(format!("Deleted parameter '{}' from model '{}'", parameter, model)))
}

pub fn model_rename_parameter(store: &mut impl Store, model: &str, old: &str, new: &str) -> Result<Output> {
    edit_model(store, model, |m| Ok(m.rename_parameter(old, new)?))?;
    Ok(Output::text(format!("Renamed parameter '{}' to '{}'", old, new)))
}

pub fn model_set_weight(store: &mut impl Store, model: &str, parameter: &str, weight: f64) -> Result<Output> {
    edit_model(store, model, |m| Ok(m.set_weight(parameter, weight)?))?;
    Ok(Output::text(format!("Set weight of '{}' to {}", parameter, weight)))
}

pub fn model_set_normalizer(
    store: &mut impl Store,
    model: &str,
    parameter: &str,
    tag: &str,
    fields: &[String],
) -> Result<Output> {
    let fields = parse_fields(fields)?;
    let normalizer = registry::build_normalizer(tag, &fields)?;
    let shown = normalizer.to_string();
    edit_model(store, model, |m| Ok(m.set_normalizer(parameter, normalizer)?))?;
    Ok(Output::text(format!("Set normalizer of '{}' to {}", parameter, shown)))
}

pub fn model_reorder(store: &mut impl Store, model: &str, order: &[usize]) -> Result<Output> {
    let model = edit_model(store, model, |m| Ok(m.reorder_parameters(order)?))?;
    let names: Vec<&str> = model.parameters().iter().map(Parameter::name).collect();
    Ok(Output::text(format!("Parameter order: {}", names.join(", "))))
}

pub fn model_add_dataset(store: &mut impl Store, model: &str, dataset: &str) -> Result<Output> {
    let dataset: Dataset = load_existing(store, dataset)?;
    let name = dataset.name.clone();
    let mut replaced = false;
    edit_model(store, model, |m| {
        replaced = m.add_dataset(dataset).is_some();
        Ok(())
    })?;
    let verb = if replaced { "Replaced" } else { "Added" };
    Ok(Output::text(format!("{} dataset '{}' in model '{}'", verb, name, model)))
}

pub fn model_delete_dataset(store: &mut impl Store, model: &str, dataset: &str) -> Result<Output> {
    let mut removed = 0;
    edit_model(store, model, |m| {
        removed = m.delete_dataset(dataset);
        Ok(())
    })?;
    if removed == 0 {
        return Err(CommandError::NotFound {
            kind: EntityKind::Dataset,
            name: dataset.to_string(),
        });
    }
    Ok(Output::text(format!("Removed dataset '{}' from model '{}'", dataset, model)))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluateOptions {
    pub tsv: bool,
    pub explain: bool,
}

/// Evaluate every dataset of a model, persist the model and each scored
/// dataset, and render the rankings.
///
/// Rejected datasets are listed in the report and flag the output; their
/// stored scores are left as they were.
pub fn evaluate_model(
    store: &mut impl Store,
    name: &str,
    options: EvaluateOptions,
    display: &Display,
) -> Result<Output> {
    let mut model: Model = load_existing(store, name)?;
    check_model(&model)?;
    let attached = model.datasets.clone();
    let report = model.evaluate_datasets()?;

    store.save(&model)?;
    let mut notes = vec![output::format_report(&report, display.colors)];
    for (outcome, original) in report.outcomes.iter().zip(&attached) {
        let Some(dataset) = model.dataset(&outcome.dataset) else {
            continue;
        };
        if outcome.result.is_err() {
            continue;
        }
        if stored_copy_unchanged(&*store, original)? {
            store.save(dataset)?;
        } else {
            warn!(dataset = %dataset.name, "stored dataset changed since it was attached, not overwritten");
            notes.push(format!(
                "{}: stored dataset changed since it was added to the model; not overwritten (run `model add-dataset` to refresh)",
                dataset.name
            ));
        }
    }

    let mut sections = Vec::new();
    for outcome in report.outcomes.iter().filter(|o| o.result.is_ok()) {
        let Some(dataset) = model.dataset(&outcome.dataset) else {
            continue;
        };
        let ranked = dataset.ranked();
        if options.tsv {
            sections.push(output::format_tsv(&ranked));
        } else {
            let explain = options.explain.then_some(&model);
            sections.push(format!(
                "{}\n{}",
                dataset.name,
                output::format_ranked_table(&ranked, display.colors, display.limit, explain)
            ));
        }
    }

    Ok(Output {
        text: sections.join(if options.tsv { "\n" } else { "\n\n" }),
        report: Some(notes.join("\n")),
        rejected: !report.is_success(),
    })
}

/// Whether the stored dataset is still the copy the model holds, or gone.
fn stored_copy_unchanged(store: &impl Store, attached: &Dataset) -> Result<bool> {
    if !store.exists(EntityKind::Dataset, &attached.name)? {
        return Ok(true);
    }
    let stored: Dataset = store.load(&attached.name)?;
    Ok(&stored == attached)
}

pub fn import_dataset(store: &mut impl Store, path: &Path) -> Result<Output> {
    let dataset: Dataset = read_definition(path)?;
    store.save(&dataset)?;
    Ok(Output::text(format!(
        "Imported dataset {}",
        output::format_dataset_line(&dataset)
    )))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShowDatasetOptions {
    /// Sort by this parameter's raw value instead of total score
    pub sort_by: Option<String>,
    pub ascending: bool,
    pub tsv: bool,
}

pub fn show_dataset(
    store: &impl Store,
    name: &str,
    options: &ShowDatasetOptions,
    display: &Display,
) -> Result<Output> {
    let dataset: Dataset = load_existing(store, name)?;
    let points: Vec<&DataPoint> = match options.sort_by {
        Some(ref parameter) => dataset.order_by_parameter_value(parameter, options.ascending),
        None if options.ascending => {
            let mut points = dataset.ranked();
            points.reverse();
            points
        }
        None => dataset.ranked(),
    };

    if options.tsv {
        return Ok(Output::text(output::format_tsv(&points)));
    }
    Ok(Output::text(format!(
        "{}\n{}",
        output::format_dataset_line(&dataset),
        output::format_ranked_table(&points, display.colors, display.limit, None)
    )))
}

pub fn dataset_delete_point(store: &mut impl Store, dataset: &str, point: &str) -> Result<Output> {
    let mut ds: Dataset = load_existing(store, dataset)?;
    let removed = ds.delete_data_point(point);
    store.save(&ds)?;
    Ok(Output::text(format!(
        "Removed {} data point(s) named '{}' from '{}'",
        removed, point, dataset
    )))
}

pub fn import_parameter(store: &mut impl Store, path: &Path) -> Result<Output> {
    let parameter: Parameter = read_definition(path)?;
    store.save(&parameter)?;
    Ok(Output::text(format!(
        "Imported parameter {}",
        output::format_parameter(&parameter, false)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{Normalizer, RawValue};
    use crate::store::MemoryStore;
    use std::io::Write;

    const MODEL_YAML: &str = r#"
name: guitar-picker
parameters:
  - name: price
    weight: 2
    kind:
      type: numerical
      value_range: { min: 0, max: 5000 }
    normalizer:
      type: linear_negative
      low: 0
      high: 5000
  - name: case
    kind:
      type: boolean
"#;

    fn guitars() -> Dataset {
        Dataset::new("guitars")
            .with_point(DataPoint::new("Les Paul").with_value("price", 2500).with_value("case", true))
            .with_point(DataPoint::new("Telecaster").with_value("price", 1000).with_value("case", false))
    }

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        let file = write_file(".yaml", MODEL_YAML);
        import_model(&mut store, file.path()).unwrap();
        store.save(&guitars()).unwrap();
        store
    }

    #[test]
    fn test_import_model_yaml() {
        let store = seeded();
        let model: Model = store.load("guitar-picker").unwrap();
        assert_eq!(model.parameters().len(), 2);
        assert_eq!(model.parameter("case").unwrap().normalizer(), &Normalizer::Boolean);
    }

    #[test]
    fn test_import_rejects_invalid_model() {
        let mut store = MemoryStore::new();
        let file = write_file(".json", r#"{"name": "empty"}"#);
        let err = import_model(&mut store, file.path()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CONFIG);
        assert!(err.to_string().contains("at least one parameter"));
        assert!(!store.exists(EntityKind::Model, "empty").unwrap());
    }

    #[test]
    fn test_import_unparsable_file() {
        let mut store = MemoryStore::new();
        let file = write_file(".yaml", "name: [broken");
        let err = import_dataset(&mut store, file.path()).unwrap_err();
        assert!(matches!(err, CommandError::Input(_)));
    }

    #[test]
    fn test_evaluate_persists_scores() {
        let mut store = seeded();
        model_add_dataset(&mut store, "guitar-picker", "guitars").unwrap();
        let out = evaluate_model(
            &mut store,
            "guitar-picker",
            EvaluateOptions::default(),
            &Display::default(),
        )
        .unwrap();
        assert_eq!(out.exit_code(), EXIT_SUCCESS);
        // Les Paul: (50*2 + 100) / 3, Telecaster: (80*2 + 0) / 3
        let lines: Vec<&str> = out.text.lines().collect();
        assert_eq!(lines[0], "guitars");
        assert!(lines[1].contains("66.7") && lines[1].ends_with("Les Paul"));
        assert!(lines[2].contains("53.3") && lines[2].ends_with("Telecaster"));
        assert!(out.report.unwrap().contains("guitars: 2 points scored"));

        let stored: Dataset = store.load("guitars").unwrap();
        assert!(stored.data_points.iter().all(DataPoint::is_scored));
        let model: Model = store.load("guitar-picker").unwrap();
        assert_eq!(model.datasets[0], stored);
    }

    #[test]
    fn test_evaluate_reports_rejected_dataset() {
        let mut store = seeded();
        let mut bad = guitars();
        bad.name = "bad".to_string();
        bad.data_points[0].parameter_datas[1].value = RawValue::Number(1.0);
        store.save(&bad).unwrap();
        model_add_dataset(&mut store, "guitar-picker", "bad").unwrap();
        model_add_dataset(&mut store, "guitar-picker", "guitars").unwrap();

        let out = evaluate_model(
            &mut store,
            "guitar-picker",
            EvaluateOptions { tsv: true, explain: false },
            &Display::default(),
        )
        .unwrap();
        assert_eq!(out.exit_code(), EXIT_VALIDATION);
        assert!(out.report.unwrap().contains("bad: rejected: dataset 'bad', data point 'Les Paul'"));
        assert_eq!(out.text.lines().count(), 2);

        let stored: Dataset = store.load("bad").unwrap();
        assert_eq!(stored, bad);
    }

    #[test]
    fn test_evaluate_keeps_newer_stored_dataset() {
        let mut store = seeded();
        model_add_dataset(&mut store, "guitar-picker", "guitars").unwrap();
        let newer = guitars()
            .with_point(DataPoint::new("Strat").with_value("price", 1500).with_value("case", true));
        store.save(&newer).unwrap();

        let out = evaluate_model(
            &mut store,
            "guitar-picker",
            EvaluateOptions::default(),
            &Display::default(),
        )
        .unwrap();
        assert_eq!(out.exit_code(), EXIT_SUCCESS);
        let report = out.report.unwrap();
        assert!(report.contains("guitars: 2 points scored"));
        assert!(report.contains("guitars: stored dataset changed since it was added to the model; not overwritten"));

        let stored: Dataset = store.load("guitars").unwrap();
        assert_eq!(stored, newer);
        let model: Model = store.load("guitar-picker").unwrap();
        assert!(model.datasets[0].data_points.iter().all(DataPoint::is_scored));

        // Re-attaching picks up the new point and evaluation writes it back
        model_add_dataset(&mut store, "guitar-picker", "guitars").unwrap();
        evaluate_model(&mut store, "guitar-picker", EvaluateOptions::default(), &Display::default()).unwrap();
        let stored: Dataset = store.load("guitars").unwrap();
        assert_eq!(stored.data_points.len(), 3);
        assert!(stored.data_points.iter().all(DataPoint::is_scored));
    }

    #[test]
    fn test_evaluate_zero_weight_is_config_error() {
        let mut store = seeded();
        model_set_weight(&mut store, "guitar-picker", "price", 0.0).unwrap();
        model_set_weight(&mut store, "guitar-picker", "case", 0.0).unwrap();
        let err = evaluate_model(
            &mut store,
            "guitar-picker",
            EvaluateOptions::default(),
            &Display::default(),
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn test_model_editing() {
        let mut store = seeded();
        let year = Parameter::numerical("year", None, Normalizer::RelativeAscending).unwrap();
        store.save(&year).unwrap();

        model_add_parameter(&mut store, "guitar-picker", "year").unwrap();
        model_rename_parameter(&mut store, "guitar-picker", "case", "gig_bag").unwrap();
        let out = model_reorder(&mut store, "guitar-picker", &[2, 0, 1]).unwrap();
        assert_eq!(out.text, "Parameter order: year, price, gig_bag");

        model_set_normalizer(
            &mut store,
            "guitar-picker",
            "price",
            "step_linear_negative",
            &["low=500".to_string(), "high=3000".to_string()],
        )
        .unwrap();
        let model: Model = store.load("guitar-picker").unwrap();
        assert_eq!(
            model.parameter("price").unwrap().normalizer(),
            &Normalizer::StepLinearNegative { low: 500.0, high: 3000.0 }
        );

        model_delete_parameter(&mut store, "guitar-picker", "year").unwrap();
        let err = model_delete_parameter(&mut store, "guitar-picker", "year").unwrap_err();
        assert!(matches!(
            err,
            CommandError::Configuration(ConfigurationError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_incompatible_normalizer_not_saved() {
        let mut store = seeded();
        let err = model_set_normalizer(&mut store, "guitar-picker", "case", "identity", &[]).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CONFIG);
        let model: Model = store.load("guitar-picker").unwrap();
        assert_eq!(model.parameter("case").unwrap().normalizer(), &Normalizer::Boolean);
    }

    #[test]
    fn test_missing_entities() {
        let mut store = MemoryStore::new();
        let err = show_model(&store, "nope", &Display::default()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_STORE);
        assert_eq!(err.to_string(), "model 'nope' not found");
        assert!(delete(&mut store, EntityKind::Dataset, "nope").is_err());
    }

    #[test]
    fn test_show_dataset_sorted_by_value() {
        let store = seeded();
        let options = ShowDatasetOptions {
            sort_by: Some("price".to_string()),
            ascending: true,
            tsv: true,
        };
        let out = show_dataset(&store, "guitars", &options, &Display::default()).unwrap();
        assert_eq!(out.text, "\tTelecaster\t1000\tfalse\n\tLes Paul\t2500\ttrue");
    }

    #[test]
    fn test_delete_point() {
        let mut store = seeded();
        let out = dataset_delete_point(&mut store, "guitars", "Telecaster").unwrap();
        assert!(out.text.starts_with("Removed 1"));
        let ds: Dataset = store.load("guitars").unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_list_and_registry() {
        let store = seeded();
        assert_eq!(list(&store, EntityKind::Model).unwrap().text, "guitar-picker");
        assert_eq!(list(&store, EntityKind::Parameter).unwrap().text, "No parameters stored.");
        assert!(list_normalizers(&Display::default()).text.contains("relative_time"));
        assert!(list_parameter_kinds(&Display::default()).text.contains("enum (label)"));
    }

    #[test]
    fn test_parse_fields() {
        let fields = parse_fields(&["low=1.5".to_string(), "start=2020-01-01T00:00:00Z".to_string()]).unwrap();
        assert_eq!(fields["low"], serde_json::json!(1.5));
        assert_eq!(fields["start"], serde_json::json!("2020-01-01T00:00:00Z"));
        assert!(parse_fields(&["nokey".to_string()]).is_err());
    }
}
