//! Positioning slices inside a sprite.
//!
//! Slices are stacked along the layout axis (Y for vertical sprites, X for
//! horizontal ones) in the order they were grouped. The cross axis is sized
//! to the widest non-repeating slice, or to the least common multiple of the
//! repeating slices' extents so every pattern tiles without a seam.

use std::sync::Arc;

use super::{Orientation, PositionedSlice, Sprite, SpriteGroup};
use crate::error::SpriteError;
use crate::models::Repeat;
use crate::report::Advisory;
use crate::slicing::ResolvedSlice;

/// Largest width or height a sprite may have before it is rejected.
pub const MAX_SPRITE_SIZE: u64 = 32_768;

/// Debug padding on each non-repeating edge, in device pixels.
pub const DEBUG_PADDING: u32 = 2;

/// Knobs for laying out a sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOptions {
    /// Keep positions on a 2px grid and name sprites `@2x`
    pub retina: bool,
    /// Padding around each slice; 0 unless debugging
    pub padding: u32,
    /// Extra cross-axis pixels tolerated before a wasted-area advisory
    pub waste_threshold: u32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self { retina: false, padding: 0, waste_threshold: 10 }
    }
}

impl LayoutOptions {
    /// Options with debug padding switched on or off.
    pub fn with_debug_padding(mut self, enabled: bool) -> Self {
        self.padding = if enabled { DEBUG_PADDING } else { 0 };
        self
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}

fn round_up_even(n: u64) -> u64 {
    n + n % 2
}

struct Measured<'a> {
    slice: &'a Arc<ResolvedSlice>,
    tile_width: u32,
    tile_height: u32,
}

/// Lay out one group of slices.
///
/// Returns the positioned sprite and, when LCM sizing inflated the cross axis
/// past `waste_threshold`, an advisory describing the waste.
pub fn layout_group(
    group: &SpriteGroup,
    options: &LayoutOptions,
) -> Result<(Sprite, Option<Advisory>), SpriteError> {
    let horizontal = group.orientation == Orientation::Horizontal;
    let padding = u64::from(options.padding);
    let oversized = || SpriteError::Oversized { sprite: group.name.clone() };

    let mut measured = Vec::with_capacity(group.slices.len());
    for slice in &group.slices {
        let (tile_width, tile_height) = slice.pixel_size().ok_or_else(|| SpriteError::Unrenderable {
            sprite: group.name.clone(),
            slice: slice.name().to_string(),
        })?;
        measured.push(Measured { slice, tile_width, tile_height });
    }

    // Cross axis
    let mut size: u64 = 1;
    let mut smallest: Option<u64> = None;
    for m in &measured {
        let cross = u64::from(if horizontal { m.tile_height } else { m.tile_width });
        if m.slice.request.repeat.is_repeating() {
            smallest = Some(smallest.map_or(cross, |s| s.min(cross)));
            size = lcm(size, cross.max(1));
        } else {
            let padded = cross + padding * 2;
            size = size.max(if options.retina { round_up_even(padded) } else { padded });
        }
        if size > MAX_SPRITE_SIZE {
            return Err(oversized());
        }
    }

    // Layout axis
    let mut pos: u64 = 0;
    let mut placed = Vec::with_capacity(measured.len());
    for m in &measured {
        let request = &m.slice.request;
        let proportion = i64::from(m.slice.proportion);
        let (min_offset, max_offset) = if horizontal {
            (request.offsets.min_x, request.offsets.max_x)
        } else {
            (request.offsets.min_y, request.offsets.max_y)
        };

        let mut length = u64::from(if horizontal { m.tile_width } else { m.tile_height });
        if min_offset < 0 {
            length += (-i64::from(min_offset) * proportion) as u64;
        }
        if max_offset > 0 {
            pos += (i64::from(max_offset) * proportion) as u64;
            if pos > MAX_SPRITE_SIZE {
                return Err(oversized());
            }
            if options.retina {
                pos = round_up_even(pos);
            }
        }

        let (mut x, mut y) = if horizontal { (pos, 0) } else { (0, pos) };
        if matches!(request.repeat, Repeat::NoRepeat | Repeat::RepeatY) {
            x += padding;
        }
        if matches!(request.repeat, Repeat::NoRepeat | Repeat::RepeatX) {
            y += padding;
        }

        let mut advance = length + if request.repeat == Repeat::Both { 0 } else { padding * 2 };
        if options.retina {
            advance = round_up_even(advance);
        }
        pos += advance;
        if pos > MAX_SPRITE_SIZE {
            return Err(oversized());
        }

        placed.push((m, x as u32, y as u32));
    }

    let size = size as u32;
    let pos = pos as u32;
    let (width, height) = if horizontal { (pos, size) } else { (size, pos) };

    let slices = placed
        .into_iter()
        .map(|(m, x, y)| {
            let repeat = m.slice.request.repeat;
            PositionedSlice {
                name: m.slice.name().to_string(),
                slice: Arc::clone(m.slice),
                repeat,
                x,
                y,
                width: if repeat == Repeat::RepeatX { width } else { m.tile_width },
                height: if repeat == Repeat::RepeatY { height } else { m.tile_height },
                tile_width: m.tile_width,
                tile_height: m.tile_height,
            }
        })
        .collect();

    let advisory = smallest.and_then(|smallest| {
        let extra = u64::from(size) - smallest;
        (extra > u64::from(options.waste_threshold)).then(|| Advisory::WastedArea {
            sprite: group.name.clone(),
            size,
            smallest: smallest as u32,
            wasted_pixels: u64::from(pos) * extra,
        })
    });

    Ok((Sprite { name: group.name.clone(), orientation: group.orientation, width, height, slices }, advisory))
}
