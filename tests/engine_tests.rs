//! End-to-end engine tests: on-disk sources through to rewritten CSS and
//! rendered sprites, for each output mode.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use slicepack::encode::{mhtml, OutputMode};
use slicepack::{Engine, EngineOptions, Repeat, SliceError, SliceRequest};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

fn write_png(dir: &Path, name: &str, width: u32, height: u32, color: Rgba<u8>) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("should create image dir");
    }
    RgbaImage::from_pixel(width, height, color).save(&path).expect("should write png");
    path
}

/// Register and map every file under its name relative to `dir`.
fn engine_for(dir: &Path, names: &[&str], options: EngineOptions) -> Engine {
    let mut engine = Engine::new(options).expect("valid options");
    for name in names {
        let path = dir.join(name);
        engine.add_file(&path).expect("should register file");
        engine.map_file(*name, path).expect("should map file");
    }
    engine
}

fn decode(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes).expect("sprite should decode").to_rgba8()
}

#[test]
fn test_sprited_pass_positions_and_pixels() {
    let temp = TempDir::new().unwrap();
    write_png(temp.path(), "icons/a.png", 16, 16, RED);
    write_png(temp.path(), "icons/b.png", 32, 16, BLUE);

    let mut engine = engine_for(temp.path(), &["icons/a.png", "icons/b.png"], EngineOptions::default());
    engine.set_slices(vec![SliceRequest::new("a", "icons/a.png"), SliceRequest::new("b", "icons/b.png")]);

    let css = ".a { _sc_chance: 'a'; }\n.b { _sc_chance: \"b\"; -chance-offset: \"b\" 0 0; }\n";
    let output = engine.build(css);

    assert!(output.diagnostics.is_clean(), "{}", output.diagnostics.summary());
    assert_eq!(
        output.css,
        ".a { background-image: url(\"no-repeat.png\"); }\n\
         .b { background-image: url(\"no-repeat.png\"); background-position: 0px -16px; }\n"
    );

    assert_eq!(output.sprites.len(), 1);
    let sprite = decode(&output.sprites[0].bytes);
    assert_eq!(sprite.dimensions(), (32, 32));
    assert_eq!(*sprite.get_pixel(0, 0), RED);
    assert_eq!(sprite.get_pixel(20, 0)[3], 0, "right of the narrow slice stays transparent");
    assert_eq!(*sprite.get_pixel(31, 31), BLUE);
    assert!(output.preload.contains("[\"no-repeat.png\"]"));
}

#[test]
fn test_repeat_x_is_stretched_to_sprite_width() {
    let temp = TempDir::new().unwrap();
    write_png(temp.path(), "bar.png", 4, 2, RED);
    write_png(temp.path(), "wide.png", 10, 3, BLUE);

    let mut engine = engine_for(temp.path(), &["bar.png", "wide.png"], EngineOptions::default());
    engine.set_slices(vec![
        SliceRequest::new("bar", "bar.png").with_repeat(Repeat::RepeatX),
        SliceRequest::new("wide", "wide.png").with_repeat(Repeat::RepeatX),
    ]);

    let plan = engine.plan();
    let sprite = plan.sprite("repeat-x.png").expect("repeat-x sprite");
    // LCM of 4 and 10
    assert_eq!((sprite.width, sprite.height), (20, 5));

    let pixels = decode(&engine.sprite_data("repeat-x.png").unwrap());
    for x in 0..20 {
        assert_eq!(*pixels.get_pixel(x, 0), RED, "bar tiles across x={}", x);
        assert_eq!(*pixels.get_pixel(x, 4), BLUE, "wide tiles across x={}", x);
    }
}

#[test]
fn test_repeat_both_gets_its_own_sprite() {
    let temp = TempDir::new().unwrap();
    write_png(temp.path(), "images/bg.png", 8, 8, RED);
    write_png(temp.path(), "images/dot.png", 2, 2, BLUE);

    let mut engine = engine_for(temp.path(), &["images/bg.png", "images/dot.png"], EngineOptions::default());
    engine.set_slices(vec![
        SliceRequest::new("bg", "images/bg.png").with_repeat(Repeat::Both),
        SliceRequest::new("dot", "images/dot.png").with_repeat(Repeat::Both),
    ]);

    assert_eq!(engine.sprite_names(), vec!["images/bg.png", "images/dot.png"]);
}

#[test]
fn test_retina_variant_and_background_size() {
    let temp = TempDir::new().unwrap();
    write_png(temp.path(), "a.png", 10, 10, RED);
    write_png(temp.path(), "a@2x.png", 20, 20, BLUE);

    let options = EngineOptions::default().with_retina(true);
    let mut engine = engine_for(temp.path(), &["a.png", "a@2x.png"], options);
    engine.set_slices(vec![SliceRequest::new("a", "a.png").with_left(2).with_width(4)]);

    let slice = engine.resolved_slice("a").unwrap().unwrap();
    assert_eq!(slice.source_name, "a@2x.png");
    assert_eq!(slice.proportion, 2);
    assert_eq!(slice.pixel_size(), Some((8, 20)));
    assert_eq!(slice.target_size, Some((4, 10)));

    let css = engine.css("_sc_chance: 'a';");
    assert_eq!(css, "background-image: url(\"no-repeat@2x.png\");\nbackground-size: 4px 10px;");
}

#[test]
fn test_data_url_pass_inlines_slice_bytes() {
    let temp = TempDir::new().unwrap();
    let whole = write_png(temp.path(), "whole.png", 3, 3, RED);
    write_png(temp.path(), "sheet.png", 10, 10, BLUE);

    let options = EngineOptions::default().with_mode(OutputMode::DataUrl).with_minify(true);
    let mut engine = engine_for(temp.path(), &["whole.png", "sheet.png"], options);
    engine.set_slices(vec![
        SliceRequest::new("whole", "whole.png").with_css_name("icon-whole"),
        SliceRequest::new("part", "sheet.png").with_top(2).with_height(5),
    ]);

    let output = engine.build("_sc_chance: 'whole'; -chance-offset: \"whole\" 3 -4");
    let expected_url = format!("data:image/png;base64,{}", STANDARD.encode(std::fs::read(&whole).unwrap()));
    assert_eq!(
        output.css,
        format!(
            "background-image: url(\"{}\");/* mhtml: url(\"mhtml:slices-mhtml.txt!icon-whole\") */ \
             background-position: 3px -4px",
            expected_url
        )
    );
    assert!(output.sprites.is_empty());
    assert!(output.mhtml.is_none());

    let css = engine.css("_sc_chance: 'part';");
    let encoded = css
        .strip_prefix("background-image: url(\"data:image/png;base64,")
        .and_then(|rest| rest.split('"').next())
        .expect("data url");
    let cropped = decode(&STANDARD.decode(encoded).unwrap());
    assert_eq!(cropped.dimensions(), (10, 5));
}

#[test]
fn test_mhtml_pass_bundles_sprites() {
    let temp = TempDir::new().unwrap();
    write_png(temp.path(), "a.png", 4, 4, RED);
    write_png(temp.path(), "b.png", 4, 2, BLUE);

    let options = EngineOptions::default().with_mode(OutputMode::Mhtml).with_theme("ace");
    let mut engine = engine_for(temp.path(), &["a.png", "b.png"], options);
    engine.set_slices(vec![
        SliceRequest::new("a", "a.png"),
        SliceRequest::new("b", "b.png").with_repeat(Repeat::RepeatX),
    ]);

    let output = engine.build("_sc_chance: 'b';");
    assert_eq!(output.css, "background-image: url(\"mhtml:slices.ace-mhtml.txt!repeat-x.png\");");
    assert!(output.sprites.is_empty());

    let document = output.mhtml.expect("mhtml document");
    assert!(document.starts_with("Content-Type: multipart/related; boundary=\"CHANCE__\"\r\n"));
    let parts = mhtml::parts(&document);
    let names: Vec<&str> = parts.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["no-repeat.png", "repeat-x.png"]);
    assert_eq!(decode(&parts[1].1).dimensions(), (4, 2));
    for (name, bytes) in &parts {
        assert_eq!(*bytes, engine.sprite_data(name).unwrap(), "part {} carries the rendered sprite", name);
    }
}

#[test]
fn test_failed_slice_becomes_comment_and_diagnostic() {
    let temp = TempDir::new().unwrap();
    write_png(temp.path(), "a.png", 4, 4, RED);

    let mut engine = engine_for(temp.path(), &["a.png"], EngineOptions::default());
    engine.set_slices(vec![
        SliceRequest::new("a", "a.png"),
        SliceRequest::new("huge", "a.png").with_left(2).with_width(8),
        SliceRequest::new("ghost", "ghost.png"),
    ]);

    let output = engine.build("_sc_chance: 'huge'; _sc_chance: 'a';");
    assert!(output.css.starts_with("/* slicepack: slice 'huge' is unavailable */"));
    assert!(output.css.ends_with("background-image: url(\"no-repeat.png\");"));

    let errors = &output.diagnostics.slice_errors;
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], SliceError::InvalidRect { ref slice, .. } if slice == "huge"));
    assert_eq!(errors[1], SliceError::Unresolvable { slice: "ghost".into(), path: "ghost.png".into() });
    assert_eq!(output.sprites.len(), 1);
    assert!(output.diagnostics.summary().starts_with("Build finished with errors"));
}

#[test]
fn test_update_picks_up_changed_file() {
    let temp = TempDir::new().unwrap();
    let path = write_png(temp.path(), "a.png", 4, 4, RED);

    let mut engine = engine_for(temp.path(), &["a.png"], EngineOptions::default());
    engine.set_slices(vec![SliceRequest::new("a", "a.png")]);
    assert_eq!(engine.plan().sprite("no-repeat.png").map(|s| (s.width, s.height)), Some((4, 4)));

    write_png(temp.path(), "a.png", 6, 2, BLUE);
    engine.update_file(&path).unwrap();

    assert_eq!(engine.plan().sprite("no-repeat.png").map(|s| (s.width, s.height)), Some((6, 2)));
    let pixels = decode(&engine.sprite_data("no-repeat.png").unwrap());
    assert_eq!(*pixels.get_pixel(0, 0), BLUE);
}

#[test]
fn test_remove_file_fails_dependent_slices_only() {
    let temp = TempDir::new().unwrap();
    let a = write_png(temp.path(), "a.png", 4, 4, RED);
    write_png(temp.path(), "b.png", 4, 4, BLUE);

    let mut engine = engine_for(temp.path(), &["a.png", "b.png"], EngineOptions::default());
    engine.set_slices(vec![SliceRequest::new("a", "a.png"), SliceRequest::new("b", "b.png")]);
    assert!(engine.diagnostics().is_clean());

    engine.remove_file(&a).unwrap();
    let diagnostics = engine.diagnostics();
    assert_eq!(diagnostics.slices, 1);
    assert_eq!(diagnostics.slice_errors, vec![SliceError::Unresolvable { slice: "a".into(), path: "a.png".into() }]);
}

#[test]
fn test_independent_engines_do_not_share_state() {
    let temp = TempDir::new().unwrap();
    write_png(temp.path(), "a.png", 4, 4, RED);

    let mut first = engine_for(temp.path(), &["a.png"], EngineOptions::default());
    let mut second = Engine::new(EngineOptions::default()).unwrap();
    first.set_slices(vec![SliceRequest::new("a", "a.png")]);
    second.set_slices(vec![SliceRequest::new("a", "a.png")]);

    assert!(first.diagnostics().is_clean());
    assert!(second.diagnostics().has_errors());
}
