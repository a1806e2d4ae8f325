//! Slice request and geometry types
//!
//! These are the records handed to the engine by the stylesheet directive
//! parser. Every crop edge is an explicit `Option` so the rectangle rules in
//! [`crate::slicing`] never have to guess at sentinel values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a slice's background tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Repeat {
    /// Painted once
    #[default]
    NoRepeat,
    /// Tiles horizontally
    RepeatX,
    /// Tiles vertically
    RepeatY,
    /// Tiles in both directions; always gets a sprite of its own
    #[serde(rename = "repeat", alias = "repeat-both")]
    Both,
}

impl Repeat {
    /// The CSS keyword for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Repeat::NoRepeat => "no-repeat",
            Repeat::RepeatX => "repeat-x",
            Repeat::RepeatY => "repeat-y",
            Repeat::Both => "repeat",
        }
    }

    /// Whether the slice tiles along any axis.
    pub fn is_repeating(&self) -> bool {
        !matches!(self, Repeat::NoRepeat)
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pixel rectangle inside a source image, in 1x coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self { left, top, width, height }
    }

    /// Multiply every coordinate by an integer scale.
    pub fn scaled(&self, factor: u32) -> Self {
        Self {
            left: self.left * factor,
            top: self.top * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Whether this rectangle covers an entire `width` x `height` image.
    pub fn covers(&self, width: u32, height: u32) -> bool {
        self.left == 0 && self.top == 0 && self.width == width && self.height == height
    }
}

/// Manual offset extremes seen for a slice, in 1x CSS pixels.
///
/// The parser folds every `offset` a stylesheet uses for the same slice into
/// these four values. Layout only looks at the axis it stacks along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Offsets {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

/// An instruction to extract a named region of an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceRequest {
    /// Key used by placeholder tokens in the stylesheet text
    pub name: String,
    /// Generated class name, used by the preload list and MHTML fallbacks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_name: Option<String>,
    /// Instance-relative path of the source image
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub repeat: Repeat,
    #[serde(default)]
    pub offsets: Offsets,
    /// Prefer an `@2x` variant when the engine runs in retina mode
    #[serde(default = "default_true")]
    pub retina: bool,
}

fn default_true() -> bool {
    true
}

impl SliceRequest {
    /// A whole-image, non-repeating request.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            css_name: None,
            path: path.into(),
            left: None,
            top: None,
            right: None,
            bottom: None,
            width: None,
            height: None,
            repeat: Repeat::NoRepeat,
            offsets: Offsets::default(),
            retina: true,
        }
    }

    pub fn with_left(mut self, left: u32) -> Self {
        self.left = Some(left);
        self
    }

    pub fn with_top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn with_right(mut self, right: u32) -> Self {
        self.right = Some(right);
        self
    }

    pub fn with_bottom(mut self, bottom: u32) -> Self {
        self.bottom = Some(bottom);
        self
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_offsets(mut self, offsets: Offsets) -> Self {
        self.offsets = offsets;
        self
    }

    pub fn with_css_name(mut self, css_name: impl Into<String>) -> Self {
        self.css_name = Some(css_name.into());
        self
    }

    pub fn with_retina(mut self, retina: bool) -> Self {
        self.retina = retina;
        self
    }

    /// Class name for this slice, falling back to the slice key.
    pub fn css_name(&self) -> &str {
        self.css_name.as_deref().unwrap_or(&self.name)
    }
}

/// Extension of `path` including the leading dot, or an empty string.
pub fn extension_of(path: &str) -> &str {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[file_start + dot..],
        _ => "",
    }
}

/// `path` without its extension.
pub fn strip_extension(path: &str) -> &str {
    &path[..path.len() - extension_of(path).len()]
}

/// The `@2x` sibling of an image path: `icons/a.png` becomes `icons/a@2x.png`.
pub fn retina_variant(path: &str) -> String {
    format!("{}@2x{}", strip_extension(path), extension_of(path))
}
