//! Sprite-relative rewriting, shared by the sprited and MHTML modes.

use super::{separator, unavailable, IMAGE_TOKEN, OFFSET_TOKEN};
use crate::sprite::SpritePlan;

/// Rewrite both token kinds against a sprite plan.
///
/// `image_url` maps a sprite name to the URL written into `background-image`.
/// Tokens naming a slice absent from the plan become comments.
pub fn rewrite(css: &str, plan: &SpritePlan, image_url: impl Fn(&str) -> String, minify: bool) -> String {
    let sep = separator(minify);

    let css = IMAGE_TOKEN.replace_all(css, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        let Some((sprite, placed)) = plan.placement(name) else {
            return unavailable(name);
        };

        let mut output = format!("background-image: url(\"{}\");", image_url(&sprite.name));
        let proportion = placed.proportion();
        if proportion > 1 {
            output.push_str(&format!(
                "{}background-size: {}px {}px;",
                sep,
                sprite.width / proportion,
                sprite.height / proportion
            ));
        }
        output
    });

    let css = OFFSET_TOKEN.replace_all(&css, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        let Some((_, placed)) = plan.placement(name) else {
            return unavailable(name);
        };
        let (x, y) = parse_offset(caps);
        let proportion = i64::from(placed.proportion());
        let x = (x - i64::from(placed.x)).div_euclid(proportion);
        let y = (y - i64::from(placed.y)).div_euclid(proportion);
        format!("background-position: {}px {}px", x, y)
    });

    css.into_owned()
}

/// Requested coordinates from an offset token; the pattern only admits integers.
pub(crate) fn parse_offset(caps: &regex::Captures<'_>) -> (i64, i64) {
    (caps[2].parse().unwrap_or(0), caps[3].parse().unwrap_or(0))
}
