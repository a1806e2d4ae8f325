//! Configuration schema types for `slicepack.toml`
//!
//! Defines the structure and structural validation of the engine configuration.
//! Option combinations that depend on the chosen output mode are checked when
//! the configuration is turned into engine options.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[engine]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Opaque theme identifier used in output file names
    #[serde(default)]
    pub theme: String,
    /// Emit each rewritten token on a single line
    #[serde(default)]
    pub minify: bool,
    /// Prefer `@2x` source variants and name sprites accordingly
    #[serde(default)]
    pub retina: bool,
    /// Output mode: "sprited", "data-url" or "mhtml"
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Drop rendered sprite pixels after each delivery
    #[serde(default)]
    pub release_memory: bool,
    /// Pixels of LCM inflation tolerated before a wasted-area warning
    #[serde(default = "default_waste_threshold")]
    pub waste_threshold: u32,
    /// Pad slices and paint sprite backgrounds magenta
    #[serde(default)]
    pub debug_padding: bool,
    /// Enable the GIF/JPEG codec
    #[serde(default = "default_true")]
    pub raster_formats: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            theme: String::new(),
            minify: false,
            retina: false,
            mode: default_mode(),
            release_memory: false,
            waste_threshold: default_waste_threshold(),
            debug_padding: false,
            raster_formats: true,
        }
    }
}

fn default_mode() -> String {
    "sprited".to_string()
}

fn default_waste_threshold() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

/// `[output]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory generated files are written to
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Prefix prepended to sprite names in sprited CSS
    #[serde(default)]
    pub url_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: default_dir(), url_prefix: String::new() }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from("build")
}

/// Complete `slicepack.toml` configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlicepackConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// A structural problem in the configuration file
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "engine.theme")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slicepack.toml: '{}' {}", self.field, self.message)
    }
}

impl SlicepackConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        // Theme ends up in file names
        if self.engine.theme.contains(['/', '\\']) {
            errors.push(ConfigValidationError {
                field: "engine.theme".to_string(),
                message: "must not contain path separators".to_string(),
            });
        }

        if self.engine.mode.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "engine.mode".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        if self.output.dir.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "output.dir".to_string(),
                message: "must be a non-empty path".to_string(),
            });
        }

        errors
    }
}
