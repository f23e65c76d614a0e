mod schema;

pub use schema::{ColorMode, Config, OutputConfig};

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path (~/.config/choice-bro/)
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("choice-bro"))
}

/// Get the default config file path (~/.config/choice-bro/config.yaml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.yaml"))
}

/// Default storage directory (<data dir>/choice-bro)
pub fn default_storage_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("choice-bro"))
}

/// Expand a leading `~/` against the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

impl Config {
    /// Storage directory to use, with `override_dir` (from the command line)
    /// taking precedence over the config file.
    pub fn resolve_storage_dir(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = override_dir {
            return Ok(expand_home(dir));
        }
        if let Some(ref dir) = self.storage_dir {
            return Ok(expand_home(dir));
        }
        default_storage_dir().context("Could not determine a data directory; set storage_dir in the config or pass --storage")
    }
}

/// Load configuration from a YAML file
///
/// # Arguments
///
/// * `path` - Optional path to config file. If None, uses default path (~/.config/choice-bro/config.yaml)
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given config file does not exist
/// - The config file cannot be read
/// - The YAML cannot be parsed
///
/// A missing default config file is not an error; defaults are used.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found at {}", path.display());
            }
            path
        }
        None => match get_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                tracing::debug!("no config file, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;

    let config: Config = serde_saphyr::from_str(&config_content)
        .with_context(|| format!("Failed to parse config: invalid YAML in {}", config_path.display()))?;

    tracing::debug!(path = %config_path.display(), "loaded config");
    Ok(config)
}

/// Validate configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Some(ref dir) = config.storage_dir {
        if dir.as_os_str().is_empty() {
            errors.push("storage_dir: must not be empty".to_string());
        } else if dir.is_file() {
            errors.push(format!("storage_dir: {} is a file, not a directory", dir.display()));
        }
    }

    if config.output.limit == Some(0) {
        errors.push("output.limit: must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
