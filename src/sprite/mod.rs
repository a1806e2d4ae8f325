//! Sprite planning and rendering
//!
//! Resolved slices flow through three stages here:
//! [`group`] buckets them by repeat mode and format, [`layout`] positions
//! each bucket's slices and sizes the sheet, and [`compose`] rasterizes a
//! finished [`Sprite`] on demand.

pub mod compose;
pub mod group;
pub mod layout;

pub use compose::{render_sprite, RenderedSprite};
pub use group::{group_slices, sprite_name, SpriteGroup};
pub use layout::{layout_group, LayoutOptions};

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SpriteError;
use crate::models::Repeat;
use crate::report::Advisory;
use crate::slicing::ResolvedSlice;

/// Direction slices are stacked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Top to bottom; the default
    Vertical,
    /// Left to right; used for `repeat-y` sprites
    Horizontal,
}

/// A slice with its place in a sprite, in device pixels.
#[derive(Debug, Clone, Serialize)]
pub struct PositionedSlice {
    pub name: String,
    #[serde(skip)]
    pub slice: Arc<ResolvedSlice>,
    pub repeat: Repeat,
    pub x: u32,
    pub y: u32,
    /// Area the slice covers; stretched to the sprite edge for `repeat-x`/`repeat-y`
    pub width: u32,
    pub height: u32,
    /// Size of one copy of the slice's pixels
    pub tile_width: u32,
    pub tile_height: u32,
}

impl PositionedSlice {
    /// Scale factor of the slice's source.
    pub fn proportion(&self) -> u32 {
        self.slice.proportion
    }
}

/// A laid-out sprite sheet.
#[derive(Debug, Clone, Serialize)]
pub struct Sprite {
    pub name: String,
    pub orientation: Orientation,
    pub width: u32,
    pub height: u32,
    pub slices: Vec<PositionedSlice>,
}

/// Every sprite of a pass, plus a slice-name index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpritePlan {
    pub sprites: Vec<Sprite>,
    #[serde(skip)]
    index: HashMap<String, (usize, usize)>,
}

impl SpritePlan {
    fn new(sprites: Vec<Sprite>) -> Self {
        let mut index = HashMap::new();
        for (sprite_idx, sprite) in sprites.iter().enumerate() {
            for (slice_idx, slice) in sprite.slices.iter().enumerate() {
                index.insert(slice.name.clone(), (sprite_idx, slice_idx));
            }
        }
        Self { sprites, index }
    }

    pub fn sprite(&self, name: &str) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.name == name)
    }

    /// A copy holding only the sprites `keep` accepts.
    pub fn filtered(&self, keep: impl Fn(&Sprite) -> bool) -> SpritePlan {
        Self::new(self.sprites.iter().filter(|s| keep(s)).cloned().collect())
    }

    /// The sprite holding a slice and the slice's placement in it.
    pub fn placement(&self, slice_name: &str) -> Option<(&Sprite, &PositionedSlice)> {
        let &(sprite_idx, slice_idx) = self.index.get(slice_name)?;
        let sprite = &self.sprites[sprite_idx];
        Some((sprite, &sprite.slices[slice_idx]))
    }

    /// Sprite names in plan order.
    pub fn names(&self) -> Vec<String> {
        self.sprites.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

/// Result of planning: the sprites that could be laid out, and what went wrong.
#[derive(Debug, Default)]
pub struct PlanOutcome {
    pub plan: SpritePlan,
    pub errors: Vec<SpriteError>,
    pub advisories: Vec<Advisory>,
}

/// Group and lay out resolved slices, in the order given.
///
/// A sprite that cannot be laid out is left out of the plan and reported in
/// [`PlanOutcome::errors`]; the other sprites are unaffected.
pub fn plan_sprites(slices: &[Arc<ResolvedSlice>], options: &LayoutOptions) -> PlanOutcome {
    let mut outcome = PlanOutcome::default();
    let mut sprites = Vec::new();

    for group in group_slices(slices, options.retina) {
        match layout_group(&group, options) {
            Ok((sprite, advisory)) => {
                log::debug!(
                    "Laid out sprite {} ({}x{}, {} slices)",
                    sprite.name,
                    sprite.width,
                    sprite.height,
                    sprite.slices.len()
                );
                if let Some(advisory) = advisory {
                    log::warn!("{}", advisory);
                    outcome.advisories.push(advisory);
                }
                sprites.push(sprite);
            }
            Err(e) => {
                log::warn!("{}", e);
                outcome.errors.push(e);
            }
        }
    }

    outcome.plan = SpritePlan::new(sprites);
    outcome
}
