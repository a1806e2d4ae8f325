//! Rasterizing a laid-out sprite.

use image::{Rgba, RgbaImage};

use super::{PositionedSlice, Sprite};
use crate::codec::{image_extension, CodecRegistry, ImageBackend};
use crate::error::SpriteError;
use crate::models::Rect;

/// Background painted behind padded slices so bad offsets stand out.
const DEBUG_BACKGROUND: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Transparent color for the sprite background
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// A sprite's encoded file bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSprite {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Composite every slice into a fresh canvas and encode it in the sprite's
/// format.
pub fn render_sprite(
    sprite: &Sprite,
    codecs: &CodecRegistry,
    debug_background: bool,
) -> Result<RenderedSprite, SpriteError> {
    let backend = codecs.for_path(&sprite.name).ok_or_else(|| SpriteError::UnsupportedFormat {
        sprite: sprite.name.clone(),
        format: image_extension(&sprite.name).unwrap_or_else(|| "unknown".to_string()),
    })?;

    let background = if debug_background { DEBUG_BACKGROUND } else { TRANSPARENT };
    let mut canvas = RgbaImage::from_pixel(sprite.width, sprite.height, background);

    for placed in &sprite.slices {
        let pixels = placed.slice.pixels().ok_or_else(|| SpriteError::Unrenderable {
            sprite: sprite.name.clone(),
            slice: placed.name.clone(),
        })?;
        tile_into(backend, &mut canvas, pixels, placed);
    }

    let bytes = backend
        .encode(&canvas)
        .map_err(|e| SpriteError::Encode { sprite: sprite.name.clone(), message: e.to_string() })?;
    log::debug!("Rendered sprite {} ({} bytes)", sprite.name, bytes.len());

    Ok(RenderedSprite { name: sprite.name.clone(), bytes })
}

/// Repeat whole copies of `pixels` across the slice's assigned area, cutting
/// the last row and column down so nothing spills outside it.
fn tile_into(backend: &dyn ImageBackend, canvas: &mut RgbaImage, pixels: &RgbaImage, placed: &PositionedSlice) {
    let (tile_width, tile_height) = pixels.dimensions();
    if tile_width == 0 || tile_height == 0 {
        return;
    }

    let mut top = 0;
    while top < placed.height {
        let mut left = 0;
        while left < placed.width {
            let width = tile_width.min(placed.width - left);
            let height = tile_height.min(placed.height - top);
            let (x, y) = (placed.x + left, placed.y + top);
            if width == tile_width && height == tile_height {
                backend.composite_into(canvas, pixels, x, y);
            } else {
                let partial = backend.crop(pixels, Rect::new(0, 0, width, height));
                backend.composite_into(canvas, &partial, x, y);
            }
            left += tile_width;
        }
        top += tile_height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PngBackend;
    use crate::models::{Repeat, SliceRequest};
    use crate::sprite::test_support::resolve_all;
    use crate::sprite::{plan_sprites, LayoutOptions};

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn decode(rendered: &RenderedSprite) -> RgbaImage {
        PngBackend.decode(&rendered.bytes).unwrap()
    }

    #[test]
    fn test_render_places_slices() {
        let slices = resolve_all(
            &[("a.png", 2, 2, RED), ("b.png", 4, 1, BLUE)],
            &[SliceRequest::new("a", "a.png"), SliceRequest::new("b", "b.png")],
            false,
        );
        let plan = plan_sprites(&slices, &LayoutOptions::default()).plan;
        let image = decode(&render_sprite(&plan.sprites[0], &CodecRegistry::png_only(), false).unwrap());

        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(*image.get_pixel(1, 1), Rgba(RED));
        assert_eq!(*image.get_pixel(3, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*image.get_pixel(3, 2), Rgba(BLUE));
    }

    #[test]
    fn test_repeat_x_tiles_across_full_width() {
        let slices = resolve_all(
            &[("dot.png", 2, 1, RED), ("bar.png", 3, 1, BLUE)],
            &[
                SliceRequest::new("dot", "dot.png").with_repeat(Repeat::RepeatX),
                SliceRequest::new("bar", "bar.png").with_repeat(Repeat::RepeatX),
            ],
            false,
        );
        let plan = plan_sprites(&slices, &LayoutOptions::default()).plan;
        let image = decode(&render_sprite(&plan.sprites[0], &CodecRegistry::png_only(), false).unwrap());

        assert_eq!(image.dimensions(), (6, 2));
        for x in 0..6 {
            assert_eq!(*image.get_pixel(x, 0), Rgba(RED), "dot row at x={x}");
            assert_eq!(*image.get_pixel(x, 1), Rgba(BLUE), "bar row at x={x}");
        }
    }

    #[test]
    fn test_tiles_clip_to_assigned_area() {
        let slices = resolve_all(&[("a.png", 3, 3, RED)], &[SliceRequest::new("a", "a.png")], false);
        let mut sprite = plan_sprites(&slices, &LayoutOptions::default()).plan.sprites.remove(0);
        sprite.width = 5;
        sprite.slices[0].width = 5;
        sprite.slices[0].height = 2;
        let image = decode(&render_sprite(&sprite, &CodecRegistry::png_only(), false).unwrap());
        assert_eq!(*image.get_pixel(4, 1), Rgba(RED));
        assert_eq!(*image.get_pixel(4, 2), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_debug_background_is_magenta() {
        let slices = resolve_all(&[("a.png", 2, 2, RED)], &[SliceRequest::new("a", "a.png")], false);
        let options = LayoutOptions::default().with_debug_padding(true);
        let plan = plan_sprites(&slices, &options).plan;
        let image = decode(&render_sprite(&plan.sprites[0], &CodecRegistry::png_only(), true).unwrap());
        assert_eq!(image.dimensions(), (6, 6));
        assert_eq!(*image.get_pixel(0, 0), DEBUG_BACKGROUND);
        assert_eq!(*image.get_pixel(2, 2), Rgba(RED));
    }

    #[test]
    fn test_render_is_idempotent() {
        let slices = resolve_all(
            &[("a.png", 5, 3, RED), ("b.png", 2, 7, BLUE)],
            &[SliceRequest::new("a", "a.png"), SliceRequest::new("b", "b.png")],
            false,
        );
        let plan = plan_sprites(&slices, &LayoutOptions::default()).plan;
        let codecs = CodecRegistry::png_only();
        let first = render_sprite(&plan.sprites[0], &codecs, false).unwrap();
        let second = render_sprite(&plan.sprites[0], &codecs, false).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_codec_is_unsupported_format() {
        let slices = resolve_all(&[("a.png", 2, 2, RED)], &[SliceRequest::new("a", "a.png")], false);
        let plan = plan_sprites(&slices, &LayoutOptions::default()).plan;
        let err = render_sprite(&plan.sprites[0], &CodecRegistry::empty(), false).unwrap_err();
        assert!(matches!(err, SpriteError::UnsupportedFormat { ref format, .. } if format == "png"));
    }
}
