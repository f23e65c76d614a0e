use std::path::PathBuf;

use choice_bro::commands::{self, CommandError, Display, EvaluateOptions, Output, ShowDatasetOptions};
use choice_bro::config::ColorMode;
use choice_bro::store::{EntityKind, JsonStore};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Subcommand, Debug)]
enum ModelCommand {
    /// Import a model definition from a YAML or JSON file
    Import { file: PathBuf },
    /// List stored models
    List,
    /// Show a model's parameters and datasets
    Show { name: String },
    /// Delete a stored model
    Delete { name: String },
    /// Add a stored parameter to a model
    AddParam { model: String, parameter: String },
    /// Remove a parameter from a model
    DeleteParam { model: String, parameter: String },
    /// Rename a parameter of a model
    RenameParam { model: String, old: String, new: String },
    /// Change a parameter's weight
    Weight {
        model: String,
        parameter: String,
        #[arg(allow_negative_numbers = true)]
        weight: f64,
    },
    /// Replace a parameter's normalizer (see `choice-bro normalizers`)
    Normalizer {
        model: String,
        parameter: String,
        /// Normalizer tag, e.g. linear_negative
        tag: String,
        /// Normalizer fields as key=value, e.g. --set low=0 --set high=100
        #[arg(long = "set", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Reorder parameters: new position i takes old position ORDER[i]
    Reorder {
        model: String,
        #[arg(value_delimiter = ',')]
        order: Vec<usize>,
    },
    /// Attach a copy of a stored dataset to a model
    AddDataset { model: String, dataset: String },
    /// Detach a dataset from a model
    DeleteDataset { model: String, dataset: String },
    /// Score every dataset of a model and print the rankings
    Evaluate {
        name: String,
        /// Tab-separated output for scripting
        #[arg(long)]
        tsv: bool,
        /// Show how each parameter contributed to a score
        #[arg(long)]
        explain: bool,
    },
}

#[derive(Subcommand, Debug)]
enum DatasetCommand {
    /// Import a dataset from a YAML or JSON file
    Import { file: PathBuf },
    /// List stored datasets
    List,
    /// Show a dataset's points, best first
    Show {
        name: String,
        /// Sort by this parameter's raw value
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long)]
        ascending: bool,
        #[arg(long)]
        tsv: bool,
    },
    /// Delete a stored dataset
    Delete { name: String },
    /// Remove every data point with this name
    DeletePoint { dataset: String, point: String },
}

#[derive(Subcommand, Debug)]
enum ParameterCommand {
    /// Import a parameter definition from a YAML or JSON file
    Import { file: PathBuf },
    /// List stored parameters
    List,
    /// Delete a stored parameter
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available normalizers
    Normalizers,
    /// List available parameter kinds
    Parameters,
    /// Manage and evaluate models
    #[command(subcommand)]
    Model(ModelCommand),
    /// Manage datasets
    #[command(subcommand)]
    Dataset(DatasetCommand),
    /// Manage stored parameters
    #[command(subcommand)]
    Parameter(ParameterCommand),
}

#[derive(Parser, Debug)]
#[command(name = "choice-bro")]
#[command(about = "Rank candidates with a weighted, normalized scoring model", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/choice-bro/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage directory, overrides storage_dir from the config
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "choice_bro=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands, store: &mut JsonStore, display: &Display) -> Result<Output, CommandError> {
    match command {
        Commands::Normalizers => Ok(commands::list_normalizers(display)),
        Commands::Parameters => Ok(commands::list_parameter_kinds(display)),
        Commands::Model(cmd) => match cmd {
            ModelCommand::Import { file } => commands::import_model(store, &file),
            ModelCommand::List => commands::list(&*store, EntityKind::Model),
            ModelCommand::Show { name } => commands::show_model(&*store, &name, display),
            ModelCommand::Delete { name } => commands::delete(store, EntityKind::Model, &name),
            ModelCommand::AddParam { model, parameter } => {
                commands::model_add_parameter(store, &model, &parameter)
            }
            ModelCommand::DeleteParam { model, parameter } => {
                commands::model_delete_parameter(store, &model, &parameter)
            }
            ModelCommand::RenameParam { model, old, new } => {
                commands::model_rename_parameter(store, &model, &old, &new)
            }
            ModelCommand::Weight {
                model,
                parameter,
                weight,
            } => commands::model_set_weight(store, &model, &parameter, weight),
            ModelCommand::Normalizer {
                model,
                parameter,
                tag,
                fields,
            } => commands::model_set_normalizer(store, &model, &parameter, &tag, &fields),
            ModelCommand::Reorder { model, order } => commands::model_reorder(store, &model, &order),
            ModelCommand::AddDataset { model, dataset } => {
                commands::model_add_dataset(store, &model, &dataset)
            }
            ModelCommand::DeleteDataset { model, dataset } => {
                commands::model_delete_dataset(store, &model, &dataset)
            }
            ModelCommand::Evaluate { name, tsv, explain } => {
                commands::evaluate_model(store, &name, EvaluateOptions { tsv, explain }, display)
            }
        },
        Commands::Dataset(cmd) => match cmd {
            DatasetCommand::Import { file } => commands::import_dataset(store, &file),
            DatasetCommand::List => commands::list(&*store, EntityKind::Dataset),
            DatasetCommand::Show {
                name,
                sort_by,
                ascending,
                tsv,
            } => {
                let options = ShowDatasetOptions {
                    sort_by,
                    ascending,
                    tsv,
                };
                commands::show_dataset(&*store, &name, &options, display)
            }
            DatasetCommand::Delete { name } => commands::delete(store, EntityKind::Dataset, &name),
            DatasetCommand::DeletePoint { dataset, point } => {
                commands::dataset_delete_point(store, &dataset, &point)
            }
        },
        Commands::Parameter(cmd) => match cmd {
            ParameterCommand::Import { file } => commands::import_parameter(store, &file),
            ParameterCommand::List => commands::list(&*store, EntityKind::Parameter),
            ParameterCommand::Delete { name } => commands::delete(store, EntityKind::Parameter, &name),
        },
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Load config
    let config = match choice_bro::config::load_config(cli.config.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(commands::EXIT_CONFIG);
        }
    };

    if let Err(errors) = choice_bro::config::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(commands::EXIT_CONFIG);
    }

    let storage_dir = match config.resolve_storage_dir(cli.storage.as_deref()) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(commands::EXIT_CONFIG);
        }
    };
    tracing::debug!(storage = %storage_dir.display(), "using storage directory");

    let color_mode = if cli.no_color {
        ColorMode::Never
    } else {
        config.output.colors
    };
    let display = Display {
        colors: choice_bro::output::use_colors(color_mode),
        limit: config.output.limit,
    };

    let mut store = JsonStore::new(storage_dir);
    match run(cli.command, &mut store, &display) {
        Ok(output) => {
            if !output.text.is_empty() {
                println!("{}", output.text);
            }
            if let Some(ref report) = output.report {
                eprintln!("{}", report);
            }
            std::process::exit(output.exit_code());
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(e.exit_code());
        }
    }
}
