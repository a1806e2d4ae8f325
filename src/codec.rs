//! Image backends
//!
//! Every raster operation the engine needs goes through [`ImageBackend`]:
//! decode, crop, composite-into and encode. A [`CodecRegistry`] maps file
//! extensions to backends and is assembled once from configuration, so a
//! missing codec shows up as a lookup miss rather than a failure halfway
//! through a pass.

use image::imageops;
use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbaImage};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;

use crate::models::Rect;

/// Error raised by an image backend
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Bytes could not be decoded
    #[error("failed to decode {format} image: {source}")]
    Decode {
        format: &'static str,
        #[source]
        source: image::ImageError,
    },
    /// Pixels could not be encoded
    #[error("failed to encode {format} image: {source}")]
    Encode {
        format: &'static str,
        #[source]
        source: image::ImageError,
    },
}

/// A codec able to decode, crop, composite and encode one family of formats.
pub trait ImageBackend: Send + Sync + fmt::Debug {
    /// Short format name used in messages (`"png"`, `"gif"`, ...).
    fn format_name(&self) -> &'static str;

    /// Decode raw file bytes into an RGBA buffer.
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, CodecError>;

    /// Copy `rect` (already in pixel coordinates) out of `image`.
    fn crop(&self, image: &RgbaImage, rect: Rect) -> RgbaImage {
        imageops::crop_imm(image, rect.left, rect.top, rect.width, rect.height).to_image()
    }

    /// Replace the pixels of `target` at (`x`, `y`) with `source`, clipped to
    /// the target bounds.
    fn composite_into(&self, target: &mut RgbaImage, source: &RgbaImage, x: u32, y: u32) {
        imageops::replace(target, source, x as i64, y as i64);
    }

    /// Encode an RGBA buffer into file bytes.
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, CodecError>;
}

/// PNG support; always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngBackend;

impl ImageBackend for PngBackend {
    fn format_name(&self) -> &'static str {
        "png"
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, CodecError> {
        image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map(|img| img.to_rgba8())
            .map_err(|source| CodecError::Decode { format: "png", source })
    }

    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, CodecError> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .map_err(|source| CodecError::Encode { format: "png", source })?;
        Ok(bytes)
    }
}

/// Secondary raster formats (GIF, JPEG).
#[derive(Debug, Clone, Copy)]
pub struct RasterBackend {
    format: ImageFormat,
}

impl RasterBackend {
    pub fn gif() -> Self {
        Self { format: ImageFormat::Gif }
    }

    pub fn jpeg() -> Self {
        Self { format: ImageFormat::Jpeg }
    }
}

impl ImageBackend for RasterBackend {
    fn format_name(&self) -> &'static str {
        match self.format {
            ImageFormat::Gif => "gif",
            _ => "jpeg",
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, CodecError> {
        image::load_from_memory_with_format(bytes, self.format)
            .map(|img| img.to_rgba8())
            .map_err(|source| CodecError::Decode { format: self.format_name(), source })
    }

    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, CodecError> {
        let mut bytes = Vec::new();
        let mut cursor = Cursor::new(&mut bytes);
        let result = match self.format {
            ImageFormat::Gif => image.write_to(&mut cursor, ImageOutputFormat::Gif),
            // JPEG has no alpha channel
            _ => DynamicImage::ImageRgba8(image.clone())
                .to_rgb8()
                .write_to(&mut cursor, ImageOutputFormat::Jpeg(90)),
        };
        result.map_err(|source| CodecError::Encode { format: self.format_name(), source })?;
        Ok(bytes)
    }
}

/// Extension-to-backend table, fixed at configuration time.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    backends: HashMap<String, Arc<dyn ImageBackend>>,
}

impl CodecRegistry {
    /// An empty registry; nothing can be decoded.
    pub fn empty() -> Self {
        Self { backends: HashMap::new() }
    }

    /// PNG only.
    pub fn png_only() -> Self {
        let mut registry = Self::empty();
        registry.register("png", Arc::new(PngBackend));
        registry
    }

    /// PNG plus the GIF/JPEG raster backend.
    pub fn with_raster() -> Self {
        let mut registry = Self::png_only();
        registry.register("gif", Arc::new(RasterBackend::gif()));
        let jpeg: Arc<dyn ImageBackend> = Arc::new(RasterBackend::jpeg());
        registry.register("jpg", Arc::clone(&jpeg));
        registry.register("jpeg", jpeg);
        registry
    }

    /// Build the registry a configuration asks for.
    pub fn from_flags(raster_formats: bool) -> Self {
        if raster_formats {
            Self::with_raster()
        } else {
            Self::png_only()
        }
    }

    /// Register (or replace) the backend for an extension, given without the dot.
    pub fn register(&mut self, extension: &str, backend: Arc<dyn ImageBackend>) {
        self.backends.insert(extension.to_ascii_lowercase(), backend);
    }

    /// Backend for a path, chosen by its extension.
    pub fn for_path(&self, path: &str) -> Option<&dyn ImageBackend> {
        let ext = image_extension(path)?;
        self.backends.get(ext.as_str()).map(|b| b.as_ref())
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_raster()
    }
}

/// Lowercase extension (without the dot) if the path names a raster image.
pub fn image_extension(path: &str) -> Option<String> {
    let ext = crate::models::extension_of(path).trim_start_matches('.').to_ascii_lowercase();
    match ext.as_str() {
        "png" | "gif" | "jpg" | "jpeg" => Some(ext),
        _ => None,
    }
}

/// MIME type for an image path, as used in data URLs.
pub fn mime_type(path: &str) -> &'static str {
    match image_extension(path).as_deref() {
        Some("gif") => "image/gif",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    }
}
