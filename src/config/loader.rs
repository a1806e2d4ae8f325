//! Configuration loading and discovery for `slicepack.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::SlicepackConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file looked for on disk.
pub const CONFIG_FILE: &str = "slicepack.toml";

/// Configuration error; always raised before any slicing work starts
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse slicepack.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Structural validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
    /// Output mode outside the supported set
    #[error("unknown output mode '{0}' (expected sprited, data-url or mhtml)")]
    UnknownOutputMode(String),
    /// Options that cannot be used together
    #[error("inconsistent options: {0}")]
    Inconsistent(String),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override output directory
    pub out: Option<PathBuf>,
    /// Override output mode
    pub mode: Option<String>,
    /// Override retina mode
    pub retina: Option<bool>,
    /// Override theme
    pub theme: Option<String>,
}

/// Find slicepack.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find slicepack.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a slicepack.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the defaults.
///
/// # Example
/// ```ignore
/// let config = load_config(Some(Path::new("site/slicepack.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<SlicepackConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(SlicepackConfig::default()),
    }
}

fn load_config_file(path: &Path) -> Result<SlicepackConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: SlicepackConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut SlicepackConfig, overrides: &CliOverrides) {
    if let Some(ref out) = overrides.out {
        config.output.dir = out.clone();
    }

    if let Some(ref mode) = overrides.mode {
        config.engine.mode = mode.clone();
    }

    if let Some(retina) = overrides.retina {
        config.engine.retina = retina;
    }

    if let Some(ref theme) = overrides.theme {
        config.engine.theme = theme.clone();
    }
}

/// Resolve a path relative to the directory holding the config file.
///
/// If the path is absolute, returns it unchanged.
pub fn resolve_path(config_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_dir.join(path)
    }
}
