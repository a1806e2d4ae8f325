//! Stylesheet rewriting and delivery encodings.
//!
//! The directive parser leaves two kinds of placeholder in the stylesheet
//! text: an image token naming a slice, and an offset token naming a slice
//! plus a requested background position. Each output mode replaces both.

pub mod data_url;
pub mod mhtml;
pub mod preload;
pub mod sprited;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::config::ConfigError;

/// `_sc_chance: "slice-name";`
pub(crate) static IMAGE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"_sc_chance:\s*["']([^"']*)["']\s*;?"#).expect("BUG: invalid IMAGE_TOKEN regex literal")
});

/// `-chance-offset: "slice-name" <x> <y>`
pub(crate) static OFFSET_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"-chance-offset:\s?"([^"]*)" (-?[0-9]+) (-?[0-9]+)"#)
        .expect("BUG: invalid OFFSET_TOKEN regex literal")
});

/// How slices are delivered to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Slices packed into sprite sheets
    #[default]
    Sprited,
    /// Each slice inlined as a base64 data URL
    DataUrl,
    /// Sprites bundled into one multipart document
    Mhtml,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Sprited => "sprited",
            OutputMode::DataUrl => "data-url",
            OutputMode::Mhtml => "mhtml",
        }
    }

    /// Whether this mode delivers sprite sheets (as files or MHTML parts).
    pub fn uses_sprites(&self) -> bool {
        !matches!(self, OutputMode::DataUrl)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sprited" => Ok(OutputMode::Sprited),
            "data-url" | "dataurl" => Ok(OutputMode::DataUrl),
            "mhtml" => Ok(OutputMode::Mhtml),
            other => Err(ConfigError::UnknownOutputMode(other.to_string())),
        }
    }
}

/// Output file names for one theme.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputNames {
    theme: String,
}

impl OutputNames {
    /// `theme` is expected to be normalized already (empty or starting with `.`).
    pub fn new(theme: impl Into<String>) -> Self {
        Self { theme: theme.into() }
    }

    pub fn stylesheet(&self) -> String {
        format!("slices{}.css", self.theme)
    }

    pub fn preload(&self) -> String {
        format!("slices{}.js", self.theme)
    }

    pub fn mhtml(&self) -> String {
        format!("slices{}-mhtml.txt", self.theme)
    }
}

/// Turns a sprite file name into the URL written into CSS.
pub trait UrlResolver: Send + Sync {
    fn sprite_url(&self, sprite: &str) -> String;
}

/// Prepends a fixed prefix to sprite names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixUrls {
    pub prefix: String,
}

impl PrefixUrls {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl UrlResolver for PrefixUrls {
    fn sprite_url(&self, sprite: &str) -> String {
        format!("{}{}", self.prefix, sprite)
    }
}

/// Comment left in place of a token whose slice produced no output.
pub(crate) fn unavailable(slice: &str) -> String {
    format!("/* slicepack: slice '{}' is unavailable */", slice.replace("*/", "* /"))
}

/// Separator between declarations an encoder emits for one token.
pub(crate) fn separator(minify: bool) -> &'static str {
    if minify {
        ""
    } else {
        "\n"
    }
}
