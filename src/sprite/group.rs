//! Bucketing resolved slices into sprites.

use std::sync::Arc;

use super::Orientation;
use crate::models::{extension_of, strip_extension, Repeat};
use crate::slicing::ResolvedSlice;

/// Slices bound for one sprite, in the order they were given.
#[derive(Debug, Clone)]
pub struct SpriteGroup {
    pub name: String,
    pub orientation: Orientation,
    pub slices: Vec<Arc<ResolvedSlice>>,
}

/// Name of the sprite a slice belongs to.
///
/// Shared sprites are named by repeat mode and extension (`no-repeat.png`,
/// `repeat-x@2x.png`). `repeat` slices get a sprite of their own named after
/// the source path (`images/bg.png`, `images/bg@2x.png`).
pub fn sprite_name(slice: &ResolvedSlice, retina: bool) -> String {
    let path = &slice.request.path;
    let suffix = if retina { "@2x" } else { "" };
    let stem = match slice.request.repeat {
        Repeat::Both => strip_extension(path),
        mode => mode.as_str(),
    };
    format!("{}{}{}", stem, suffix, extension_of(path))
}

/// Group slices into sprites, keeping first-appearance order for both the
/// sprites and the slices within each.
pub fn group_slices(slices: &[Arc<ResolvedSlice>], retina: bool) -> Vec<SpriteGroup> {
    let mut groups: Vec<SpriteGroup> = Vec::new();

    for slice in slices {
        let name = sprite_name(slice, retina);
        match groups.iter_mut().find(|g| g.name == name) {
            Some(group) => group.slices.push(Arc::clone(slice)),
            None => {
                let orientation = if slice.request.repeat == Repeat::RepeatY {
                    Orientation::Horizontal
                } else {
                    Orientation::Vertical
                };
                groups.push(SpriteGroup { name, orientation, slices: vec![Arc::clone(slice)] });
            }
        }
    }

    groups
}
