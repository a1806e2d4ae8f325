//! Pass diagnostics.
//!
//! Slice and sprite failures do not stop a pass. They are gathered here next
//! to non-fatal advisories so the caller can decide whether partial output is
//! good enough.

use serde::Serialize;
use std::fmt;

use crate::error::{SliceError, SpriteError};

/// A non-fatal observation about a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[non_exhaustive]
pub enum Advisory {
    /// LCM sizing made a sprite's cross axis much larger than its smallest pattern
    WastedArea { sprite: String, size: u32, smallest: u32, wasted_pixels: u64 },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::WastedArea { sprite, size, smallest, wasted_pixels } => write!(
                f,
                "sprite '{}': repeating slices need {} rows or columns, {} more than the smallest pattern; up to {} pixels wasted",
                sprite,
                size,
                size - smallest,
                wasted_pixels
            ),
        }
    }
}

/// Everything that went wrong (or nearly so) during one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Slices that resolved successfully
    pub slices: usize,
    /// Sprites that were laid out
    pub sprites: usize,
    pub slice_errors: Vec<SliceError>,
    pub sprite_errors: Vec<SpriteError>,
    pub advisories: Vec<Advisory>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// No errors and no advisories.
    pub fn is_clean(&self) -> bool {
        !self.has_errors() && self.advisories.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.slice_errors.len() + self.sprite_errors.len()
    }

    /// Record a sprite error unless the same one is already recorded.
    pub fn push_sprite_error(&mut self, error: SpriteError) {
        if !self.sprite_errors.contains(&error) {
            self.sprite_errors.push(error);
        }
    }

    /// Fold another set of diagnostics into this one.
    pub fn merge(&mut self, other: Diagnostics) {
        self.slices = self.slices.max(other.slices);
        self.sprites = self.sprites.max(other.sprites);
        for e in other.slice_errors {
            if !self.slice_errors.contains(&e) {
                self.slice_errors.push(e);
            }
        }
        for e in other.sprite_errors {
            self.push_sprite_error(e);
        }
        for a in other.advisories {
            if !self.advisories.contains(&a) {
                self.advisories.push(a);
            }
        }
    }

    /// Format a summary of the pass.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        if self.has_errors() {
            lines.push(format!(
                "Build finished with errors: {} slices, {} sprites, {} failed",
                self.slices,
                self.sprites,
                self.error_count()
            ));
            for error in &self.slice_errors {
                lines.push(format!("  - {}", error));
            }
            for error in &self.sprite_errors {
                lines.push(format!("  - {}", error));
            }
        } else {
            lines.push(format!("Build succeeded: {} slices, {} sprites", self.slices, self.sprites));
        }

        if !self.advisories.is_empty() {
            lines.push(format!("Warnings ({}): ", self.advisories.len()));
            for advisory in self.advisories.iter().take(5) {
                lines.push(format!("  - {}", advisory));
            }
            if self.advisories.len() > 5 {
                lines.push(format!("  ... and {} more", self.advisories.len() - 5));
            }
        }

        lines.join("\n")
    }
}
