//! MHTML bundle: every sprite as one base64 part of a `multipart/related`
//! document, for browsers that cannot use data URLs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::sprite::{RenderedSprite, SpritePlan};

/// Multipart boundary token.
pub const BOUNDARY: &str = "CHANCE__";

/// Rewrite tokens so images resolve to parts of the MHTML document.
pub fn rewrite(css: &str, plan: &SpritePlan, mhtml_file: &str, minify: bool) -> String {
    super::sprited::rewrite(css, plan, |sprite| format!("mhtml:{}!{}", mhtml_file, sprite), minify)
}

/// Assemble the document, one part per sprite in the order given.
pub fn document(sprites: &[RenderedSprite]) -> String {
    let mut output = format!("Content-Type: multipart/related; boundary=\"{}\"\r\n", BOUNDARY);

    for sprite in sprites {
        output.push_str(&format!("\r\n--{}\r\n", BOUNDARY));
        output.push_str(&format!("Content-Location:{}\r\n", sprite.name));
        output.push_str("Content-Transfer-Encoding:base64\r\n\r\n");
        output.push_str(&STANDARD.encode(&sprite.bytes));
        output.push_str("\r\n");
    }

    output.push_str(&format!("--{}--", BOUNDARY));
    output
}

/// Split a document back into `(content location, decoded bytes)` pairs.
pub fn parts(document: &str) -> Vec<(String, Vec<u8>)> {
    let delimiter = format!("\r\n--{}\r\n", BOUNDARY);
    let closing = format!("--{}--", BOUNDARY);

    document
        .split(delimiter.as_str())
        .skip(1)
        .filter_map(|part| {
            let part = part.strip_suffix(closing.as_str()).unwrap_or(part);
            let (headers, body) = part.split_once("\r\n\r\n")?;
            let location = headers
                .lines()
                .find_map(|line| line.strip_prefix("Content-Location:"))?
                .trim()
                .to_string();
            let bytes = STANDARD.decode(body.trim_end()).ok()?;
            Some((location, bytes))
        })
        .collect()
}
