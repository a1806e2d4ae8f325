//! Slice resolution: pick the source variant and compute the crop rectangle.
//!
//! Resolution turns a [`SliceRequest`] into an immutable [`ResolvedSlice`].
//! Crop coordinates are always in 1x pixels; when an `@2x` variant is used
//! they are multiplied by the proportion only when pixels are copied.

use image::RgbaImage;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::codec::{image_extension, CodecRegistry};
use crate::error::SliceError;
use crate::files::{FileError, FileStore, SourceFile};
use crate::models::{retina_variant, Rect, SliceRequest};

/// A slice bound to concrete pixels and geometry.
#[derive(Debug)]
pub struct ResolvedSlice {
    pub request: SliceRequest,
    /// Instance name of the file actually used (original or `@2x`)
    pub source_name: String,
    pub source: Arc<SourceFile>,
    /// 1 for normal sources, 2 for `@2x` variants
    pub proportion: u32,
    /// Crop in 1x coordinates; `None` means the whole image
    pub crop: Option<Rect>,
    cropped: Option<RgbaImage>,
    /// Post-scale size in CSS pixels, when the image could be measured
    pub target_size: Option<(u32, u32)>,
}

impl ResolvedSlice {
    /// Pixels to place: the cropped copy, or the source buffer itself.
    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.cropped.as_ref().or_else(|| self.source.pixels())
    }

    /// Whether a new buffer was cut out of the source.
    pub fn is_cropped(&self) -> bool {
        self.cropped.is_some()
    }

    /// Size of [`ResolvedSlice::pixels`] in device pixels.
    pub fn pixel_size(&self) -> Option<(u32, u32)> {
        self.pixels().map(|p| p.dimensions())
    }

    pub fn name(&self) -> &str {
        &self.request.name
    }

    /// File bytes for this slice alone: the source bytes verbatim when
    /// uncropped, otherwise the cropped pixels re-encoded in the source format.
    pub fn file_bytes(&self, codecs: &CodecRegistry) -> Result<Cow<'_, [u8]>, SliceError> {
        let Some(cropped) = &self.cropped else {
            return Ok(Cow::Borrowed(&self.source.bytes));
        };
        let backend = codecs.for_path(&self.source_name).ok_or_else(|| {
            SliceError::UnsupportedFormat {
                slice: self.request.name.clone(),
                path: self.source_name.clone(),
                format: format_label(&self.source_name),
            }
        })?;
        backend
            .encode(cropped)
            .map(Cow::Owned)
            .map_err(|e| SliceError::Encode { slice: self.request.name.clone(), message: e.to_string() })
    }
}

/// Resolves slice requests against an engine's mapped files.
pub struct SliceResolver<'a> {
    store: &'a mut FileStore,
    mapped: &'a BTreeMap<String, PathBuf>,
    retina: bool,
    touched: Vec<String>,
}

impl<'a> SliceResolver<'a> {
    pub fn new(store: &'a mut FileStore, mapped: &'a BTreeMap<String, PathBuf>, retina: bool) -> Self {
        Self { store, mapped, retina, touched: Vec::new() }
    }

    /// Names looked up since the last call, including `@2x` candidates that
    /// turned out to be missing.
    pub fn take_touched(&mut self) -> Vec<String> {
        std::mem::take(&mut self.touched)
    }

    fn lookup(&mut self, name: &str) -> Option<Result<Arc<SourceFile>, FileError>> {
        self.touched.push(name.to_string());
        let path = self.mapped.get(name)?;
        Some(self.store.get(path))
    }

    /// Resolve one request.
    pub fn resolve(&mut self, request: &SliceRequest) -> Result<ResolvedSlice, SliceError> {
        let (source_name, source, proportion) = self.select_source(request)?;

        let Some(pixels) = source.pixels() else {
            // Undecodable: usable verbatim as long as no crop is asked for
            if implies_whole_image(request) {
                return Ok(ResolvedSlice {
                    request: request.clone(),
                    source_name,
                    source,
                    proportion,
                    crop: None,
                    cropped: None,
                    target_size: None,
                });
            }
            return Err(SliceError::UnsupportedFormat {
                slice: request.name.clone(),
                format: format_label(&source_name),
                path: source_name,
            });
        };

        let (image_width, image_height) =
            (pixels.width() / proportion, pixels.height() / proportion);
        let rect = slice_rect(request, image_width, image_height)?;

        if rect.covers(image_width, image_height) {
            return Ok(ResolvedSlice {
                request: request.clone(),
                source_name,
                source,
                proportion,
                crop: None,
                cropped: None,
                target_size: Some((image_width, image_height)),
            });
        }

        let backend = self.store.codecs().for_path(&source_name).ok_or_else(|| {
            SliceError::UnsupportedFormat {
                slice: request.name.clone(),
                path: source_name.clone(),
                format: format_label(&source_name),
            }
        })?;
        let cropped = backend.crop(pixels, rect.scaled(proportion));

        Ok(ResolvedSlice {
            request: request.clone(),
            source_name,
            proportion,
            crop: Some(rect),
            cropped: Some(cropped),
            target_size: Some((rect.width, rect.height)),
            source,
        })
    }

    fn select_source(
        &mut self,
        request: &SliceRequest,
    ) -> Result<(String, Arc<SourceFile>, u32), SliceError> {
        if self.retina && request.retina {
            let candidate = retina_variant(&request.path);
            match self.lookup(&candidate) {
                Some(Ok(file)) => return Ok((candidate, file, 2)),
                Some(Err(e)) => {
                    log::debug!("Ignoring {} for slice '{}': {}", candidate, request.name, e)
                }
                None => {}
            }
        }

        match self.lookup(&request.path) {
            Some(Ok(file)) => Ok((request.path.clone(), file, 1)),
            None | Some(Err(FileError::NotRegistered(_))) => Err(SliceError::Unresolvable {
                slice: request.name.clone(),
                path: request.path.clone(),
            }),
            Some(Err(e)) => Err(SliceError::Read { slice: request.name.clone(), message: e.to_string() }),
        }
    }
}

fn format_label(path: &str) -> String {
    image_extension(path).unwrap_or_else(|| "unknown".to_string())
}

/// Whether a request selects the whole image without knowing its size:
/// no sizes, and every given edge is zero.
fn implies_whole_image(request: &SliceRequest) -> bool {
    request.width.is_none()
        && request.height.is_none()
        && [request.left, request.top, request.right, request.bottom]
            .iter()
            .all(|edge| edge.unwrap_or(0) == 0)
}

/// One axis of the rectangle rules: returns `(position, extent)`.
///
/// A size given without either edge is anchored at the near edge.
fn axis_span(image: i64, near: Option<u32>, far: Option<u32>, size: Option<u32>) -> (i64, i64) {
    let (near, far, size) = (near.map(i64::from), far.map(i64::from), size.map(i64::from));
    match (near, far, size) {
        (Some(near), Some(far), _) => (near, image - far - near),
        (Some(near), None, Some(size)) => (near, size),
        (Some(near), None, None) => (near, image - near),
        (None, Some(far), Some(size)) => (image - size - far, size),
        (None, Some(far), None) => (image - far, far),
        (None, None, Some(size)) => (0, size),
        (None, None, None) => (0, image),
    }
}

/// Compute the 1x crop rectangle for a request against an image size.
pub fn slice_rect(request: &SliceRequest, image_width: u32, image_height: u32) -> Result<Rect, SliceError> {
    let (left, width) = axis_span(image_width.into(), request.left, request.right, request.width);
    let (top, height) = axis_span(image_height.into(), request.top, request.bottom, request.height);

    let fits = |pos: i64, extent: i64, image: u32| pos >= 0 && extent > 0 && pos + extent <= image as i64;
    if !fits(left, width, image_width) || !fits(top, height, image_height) {
        return Err(SliceError::InvalidRect {
            slice: request.name.clone(),
            detail: format!("({left}, {top}, {width}x{height})"),
            image_width,
            image_height,
        });
    }

    Ok(Rect::new(left as u32, top as u32, width as u32, height as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ImageBackend, PngBackend};
    use image::Rgba;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        PngBackend.encode(&image).unwrap()
    }

    fn setup(files: &[(&str, Vec<u8>)]) -> (FileStore, BTreeMap<String, PathBuf>) {
        let mut store = FileStore::new(CodecRegistry::png_only());
        let mut mapped = BTreeMap::new();
        for (name, bytes) in files {
            let path = PathBuf::from(format!("/src/{name}"));
            store.add_bytes(&path, bytes.clone());
            mapped.insert(name.to_string(), path);
        }
        (store, mapped)
    }

    #[test]
    fn test_rect_left_and_width() {
        let req = SliceRequest::new("a", "a.png").with_left(5).with_width(10);
        let rect = slice_rect(&req, 40, 20).unwrap();
        assert_eq!((rect.left, rect.width), (5, 10));
        assert_eq!((rect.top, rect.height), (0, 20));
    }

    #[test]
    fn test_rect_right_and_width() {
        let req = SliceRequest::new("a", "a.png").with_right(5).with_width(10);
        let rect = slice_rect(&req, 40, 20).unwrap();
        assert_eq!((rect.left, rect.width), (25, 10));
    }

    #[test]
    fn test_rect_left_and_right() {
        let req = SliceRequest::new("a", "a.png").with_left(3).with_right(7);
        let rect = slice_rect(&req, 40, 20).unwrap();
        assert_eq!((rect.left, rect.width), (3, 30));
    }

    #[test]
    fn test_rect_right_only_runs_to_edge() {
        let req = SliceRequest::new("a", "a.png").with_bottom(4);
        let rect = slice_rect(&req, 40, 20).unwrap();
        assert_eq!((rect.top, rect.height), (16, 4));
    }

    #[test]
    fn test_rect_left_only_runs_to_end() {
        let req = SliceRequest::new("a", "a.png").with_left(10).with_top(2);
        let rect = slice_rect(&req, 40, 20).unwrap();
        assert_eq!(rect, Rect::new(10, 2, 30, 18));
    }

    #[test]
    fn test_rect_out_of_bounds_is_error() {
        let req = SliceRequest::new("a", "a.png").with_left(35).with_width(10);
        assert!(matches!(slice_rect(&req, 40, 20), Err(SliceError::InvalidRect { .. })));

        let req = SliceRequest::new("a", "a.png").with_left(20).with_right(20);
        assert!(matches!(slice_rect(&req, 40, 20), Err(SliceError::InvalidRect { .. })));
    }

    #[test]
    fn test_no_edges_reuses_source_buffer() {
        let (mut store, mapped) = setup(&[("icon.png", png(8, 6))]);
        let mut resolver = SliceResolver::new(&mut store, &mapped, false);
        let slice = resolver.resolve(&SliceRequest::new("icon", "icon.png")).unwrap();

        assert!(slice.crop.is_none());
        assert!(!slice.is_cropped());
        assert!(std::ptr::eq(slice.pixels().unwrap(), slice.source.pixels().unwrap()));
        assert_eq!(slice.target_size, Some((8, 6)));
        assert_eq!(slice.proportion, 1);
    }

    #[test]
    fn test_zero_edges_count_as_whole_image() {
        let (mut store, mapped) = setup(&[("icon.png", png(8, 6))]);
        let mut resolver = SliceResolver::new(&mut store, &mapped, false);
        let req = SliceRequest::new("icon", "icon.png").with_left(0).with_top(0);
        let slice = resolver.resolve(&req).unwrap();
        assert!(slice.crop.is_none());
        assert!(!slice.is_cropped());
    }

    #[test]
    fn test_crop_copies_pixels() {
        let (mut store, mapped) = setup(&[("strip.png", png(12, 4))]);
        let mut resolver = SliceResolver::new(&mut store, &mapped, false);
        let req = SliceRequest::new("mid", "strip.png").with_left(4).with_width(3);
        let slice = resolver.resolve(&req).unwrap();

        assert_eq!(slice.crop, Some(Rect::new(4, 0, 3, 4)));
        let pixels = slice.pixels().unwrap();
        assert_eq!(pixels.dimensions(), (3, 4));
        assert_eq!(*pixels.get_pixel(0, 0), Rgba([4, 0, 0, 255]));
        assert_eq!(slice.target_size, Some((3, 4)));
    }

    #[test]
    fn test_retina_variant_scales_crop() {
        let (mut store, mapped) = setup(&[("btn.png", png(10, 10)), ("btn@2x.png", png(20, 20))]);
        let mut resolver = SliceResolver::new(&mut store, &mapped, true);
        let req = SliceRequest::new("btn", "btn.png").with_left(2).with_width(3);
        let slice = resolver.resolve(&req).unwrap();

        assert_eq!(slice.source_name, "btn@2x.png");
        assert_eq!(slice.proportion, 2);
        assert_eq!(slice.crop, Some(Rect::new(2, 0, 3, 10)));
        let pixels = slice.pixels().unwrap();
        assert_eq!(pixels.dimensions(), (6, 20));
        assert_eq!(*pixels.get_pixel(0, 0), Rgba([4, 0, 0, 255]));
        assert_eq!(slice.target_size, Some((3, 10)));
    }

    #[test]
    fn test_retina_falls_back_to_original() {
        let (mut store, mapped) = setup(&[("btn.png", png(10, 10))]);
        let mut resolver = SliceResolver::new(&mut store, &mapped, true);
        let slice = resolver.resolve(&SliceRequest::new("btn", "btn.png")).unwrap();
        assert_eq!(slice.proportion, 1);
        assert_eq!(slice.source_name, "btn.png");
    }

    #[test]
    fn test_retina_ignored_when_request_opts_out() {
        let (mut store, mapped) = setup(&[("btn.png", png(10, 10)), ("btn@2x.png", png(20, 20))]);
        let mut resolver = SliceResolver::new(&mut store, &mapped, true);
        let req = SliceRequest::new("btn", "btn.png").with_retina(false);
        assert_eq!(resolver.resolve(&req).unwrap().proportion, 1);
    }

    #[test]
    fn test_unmapped_source_is_unresolvable() {
        let (mut store, mapped) = setup(&[]);
        let mut resolver = SliceResolver::new(&mut store, &mapped, false);
        let err = resolver.resolve(&SliceRequest::new("gone", "gone.png")).unwrap_err();
        assert_eq!(
            err,
            SliceError::Unresolvable { slice: "gone".into(), path: "gone.png".into() }
        );
    }

    #[test]
    fn test_crop_without_codec_is_unsupported_format() {
        let (mut store, mapped) = setup(&[("photo.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0])]);
        let mut resolver = SliceResolver::new(&mut store, &mapped, false);

        let whole = resolver.resolve(&SliceRequest::new("p", "photo.jpg")).unwrap();
        assert!(whole.pixels().is_none());
        assert_eq!(whole.file_bytes(&CodecRegistry::png_only()).unwrap().as_ref(), &[0xFF, 0xD8, 0xFF, 0xE0]);

        let err = resolver.resolve(&SliceRequest::new("p2", "photo.jpg").with_left(3)).unwrap_err();
        assert!(matches!(err, SliceError::UnsupportedFormat { ref format, .. } if format == "jpg"));
    }

    #[test]
    fn test_touched_names_include_retina_candidates() {
        let (mut store, mapped) = setup(&[("btn.png", png(4, 4))]);
        let mut resolver = SliceResolver::new(&mut store, &mapped, true);
        resolver.resolve(&SliceRequest::new("btn", "btn.png")).unwrap();
        let touched = resolver.take_touched();
        assert_eq!(touched, vec!["btn@2x.png".to_string(), "btn.png".to_string()]);
        assert!(resolver.take_touched().is_empty());
    }

    #[test]
    fn test_file_bytes_encodes_cropped_copy() {
        let (mut store, mapped) = setup(&[("strip.png", png(12, 4))]);
        let mut resolver = SliceResolver::new(&mut store, &mapped, false);
        let slice = resolver.resolve(&SliceRequest::new("m", "strip.png").with_left(4)).unwrap();
        let bytes = slice.file_bytes(&CodecRegistry::png_only()).unwrap();
        let decoded = PngBackend.decode(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (8, 4));
    }
}
