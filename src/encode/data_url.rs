//! Inline data-URL rewriting.
//!
//! Every slice carries its own image, so offsets pass through untouched.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::HashMap;
use std::sync::Arc;

use super::{separator, unavailable, IMAGE_TOKEN, OFFSET_TOKEN};
use crate::codec::{mime_type, CodecRegistry};
use crate::error::SliceError;
use crate::slicing::ResolvedSlice;

/// `data:` URL for one slice's own bytes.
pub fn data_url(slice: &ResolvedSlice, codecs: &CodecRegistry) -> Result<String, SliceError> {
    let bytes = slice.file_bytes(codecs)?;
    Ok(format!("data:{};base64,{}", mime_type(&slice.source_name), STANDARD.encode(bytes.as_ref())))
}

/// Rewrite both token kinds with inline images.
///
/// `mhtml_file` names the MHTML document the legacy fallback comment points
/// at. Slices whose bytes cannot be produced are reported and replaced by a
/// comment.
pub fn rewrite(
    css: &str,
    slices: &HashMap<String, Arc<ResolvedSlice>>,
    codecs: &CodecRegistry,
    mhtml_file: &str,
    minify: bool,
) -> (String, Vec<SliceError>) {
    let sep = separator(minify);
    let mut errors = Vec::new();

    let css = IMAGE_TOKEN.replace_all(css, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        let Some(slice) = slices.get(name) else {
            return unavailable(name);
        };
        let url = match data_url(slice, codecs) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("{}", e);
                errors.push(e);
                return unavailable(name);
            }
        };

        let mut output = format!("background-image: url(\"{}\");", url);
        if slice.proportion > 1 {
            if let Some((width, height)) = slice.target_size {
                output.push_str(&format!("{}background-size: {}px {}px;", sep, width, height));
            }
        }
        output.push_str(&format!(
            "{}/* mhtml: url(\"mhtml:{}!{}\") */",
            sep,
            mhtml_file,
            slice.request.css_name()
        ));
        output
    });

    let css = OFFSET_TOKEN.replace_all(&css, "background-position: ${2}px ${3}px");

    (css.into_owned(), errors)
}
