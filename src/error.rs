//! Error types for slice resolution, sprite rendering and engine calls
//!
//! Slice and sprite errors are collected per pass rather than returned early,
//! so they carry owned messages and are `Clone`: the same failure can sit in
//! the engine's cache and in a [`crate::report::Diagnostics`] at once.

use std::path::PathBuf;
use thiserror::Error;

use crate::files::FileError;

/// A single slice could not be resolved or encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SliceError {
    /// The source path is not mapped or not registered
    #[error("slice '{slice}': source '{path}' is not available")]
    Unresolvable { slice: String, path: String },
    /// A crop is required but no codec handles the format
    #[error("slice '{slice}': cropping '{path}' needs a {format} codec, which is not enabled")]
    UnsupportedFormat { slice: String, path: String, format: String },
    /// The requested edges do not describe a rectangle inside the image
    #[error("slice '{slice}': rectangle {detail} does not fit the {image_width}x{image_height} image")]
    InvalidRect { slice: String, detail: String, image_width: u32, image_height: u32 },
    /// The source exists but could not be read or decoded
    #[error("slice '{slice}': {message}")]
    Read { slice: String, message: String },
    /// The cropped pixels could not be encoded for a data URL
    #[error("slice '{slice}': {message}")]
    Encode { slice: String, message: String },
}

impl SliceError {
    /// Name of the slice this error belongs to.
    pub fn slice(&self) -> &str {
        match self {
            SliceError::Unresolvable { slice, .. }
            | SliceError::UnsupportedFormat { slice, .. }
            | SliceError::InvalidRect { slice, .. }
            | SliceError::Read { slice, .. }
            | SliceError::Encode { slice, .. } => slice,
        }
    }
}

/// A sprite could not be laid out or rendered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SpriteError {
    /// A slice assigned to the sprite has no pixel buffer
    #[error("sprite '{sprite}': slice '{slice}' has no renderable pixels")]
    Unrenderable { sprite: String, slice: String },
    /// No codec can encode the sprite's format
    #[error("sprite '{sprite}': no {format} codec is enabled")]
    UnsupportedFormat { sprite: String, format: String },
    /// Repeat sizes multiplied past the maximum image dimension
    #[error("sprite '{sprite}': layout exceeds the maximum image size")]
    Oversized { sprite: String },
    /// Encoding the composited pixels failed
    #[error("sprite '{sprite}': {message}")]
    Encode { sprite: String, message: String },
    /// The pass produced no sprite by this name
    #[error("no sprite named '{0}'")]
    Unknown(String),
}

impl SpriteError {
    /// Name of the sprite this error belongs to.
    pub fn sprite(&self) -> &str {
        match self {
            SpriteError::Unrenderable { sprite, .. }
            | SpriteError::UnsupportedFormat { sprite, .. }
            | SpriteError::Oversized { sprite }
            | SpriteError::Encode { sprite, .. } => sprite,
            SpriteError::Unknown(name) => name,
        }
    }
}

/// Misuse of the engine API outside a pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Mapping a name to a path the file store does not hold
    #[error("cannot map '{name}': {} is not registered", path.display())]
    NotInStore { name: String, path: PathBuf },
    /// File store failure while assembling stylesheets
    #[error(transparent)]
    File(#[from] FileError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_error_messages_name_the_path() {
        let err = SliceError::Unresolvable { slice: "btn".into(), path: "images/btn.png".into() };
        assert_eq!(err.to_string(), "slice 'btn': source 'images/btn.png' is not available");
        assert_eq!(err.slice(), "btn");

        let err = SliceError::UnsupportedFormat {
            slice: "photo".into(),
            path: "photo.jpg".into(),
            format: "jpg".into(),
        };
        assert!(err.to_string().contains("needs a jpg codec"));
    }

    #[test]
    fn test_sprite_error_accessor() {
        let err = SpriteError::Unrenderable { sprite: "no-repeat.png".into(), slice: "a".into() };
        assert_eq!(err.sprite(), "no-repeat.png");
        assert_eq!(SpriteError::Unknown("x.png".into()).sprite(), "x.png");
    }
}
