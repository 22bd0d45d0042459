//! Integration tests: end-to-end properties of the line-art pipeline.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{ImageEncoder, Rgba, RgbaImage};
use oli_pipeline::{PipelineConfig, RawConfig, detect_mime, process_staged, render, render_json};

fn encode(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
    buf
}

fn gray(v: u8) -> Rgba<u8> {
    Rgba([v, v, v, 255])
}

/// A small "photo": diagonal gradient with a dark disc and a bright bar.
fn scene(width: u32, height: u32) -> Vec<u8> {
    let (cx, cy) = (f64::from(width) * 0.4, f64::from(height) * 0.5);
    let r = f64::from(width.min(height)) * 0.25;
    let img = RgbaImage::from_fn(width, height, |x, y| {
        if (f64::from(x) - cx).hypot(f64::from(y) - cy) < r {
            return Rgba([40, 50, 90, 255]);
        }
        if x > width * 3 / 4 && y % 16 < 5 {
            return Rgba([250, 240, 200, 255]);
        }
        let v = ((x + y) * 200 / (width + height) + 30) as u8;
        Rgba([v, v.saturating_add(10), v, 255])
    });
    encode(&img)
}

fn config(json: &str) -> PipelineConfig {
    PipelineConfig::resolve(&RawConfig::from_json(json).unwrap()).unwrap()
}

fn decode_output(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes).unwrap().to_rgba8()
}

#[test]
fn undecodable_input_is_returned_verbatim() {
    let truncated = {
        let png = scene(32, 32);
        png[..png.len() / 3].to_vec()
    };
    let inputs: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"GIF89a but not really".to_vec(),
        vec![0x89, b'P', b'N', b'G'],
        (0..=255u8).cycle().take(4096).collect(),
        truncated,
    ];
    for input in inputs {
        assert_eq!(render(&input, &PipelineConfig::default()), input);
        assert_eq!(render_json(&input, None).unwrap(), input);
    }
}

#[test]
fn identical_inputs_give_identical_bytes() {
    let sheet = RgbaImage::from_fn(60, 30, |x, y| {
        if y < 15 {
            Rgba([200, 20, 20, if x % 3 == 0 { 0 } else { 255 }])
        } else {
            Rgba([20, 20, 200, 255])
        }
    });
    let grain = RgbaImage::from_fn(8, 8, |x, y| gray(if (x + y) % 3 == 0 { 120 } else { 220 }));
    let cfg = config(r#"{"zoom": 1.3, "cover": true, "quality": "fine", "light": 15}"#)
        .with_watermark_image(encode(&sheet))
        .with_pencil_texture(encode(&grain));

    let input = scene(70, 50);
    let a = render(&input, &cfg);
    let b = render(&input, &cfg);
    assert_eq!(a, b);
    assert_eq!(detect_mime(&a), "image/png");
}

#[test]
fn output_dimensions_follow_zoom_and_cover() {
    let input = scene(100, 60);
    let cases = [
        (r#"{"zoom": 1}"#, (100, 60)),
        (r#"{"zoom": 0.5}"#, (50, 30)),
        (r#"{"zoom": 0.7}"#, (70, 42)),
        (r#"{"zoom": 1.5}"#, (150, 90)),
        (r#"{"zoom": 0.1}"#, (50, 30)),
        (r#"{"zoom": 1, "cover": true}"#, (60, 60)),
        (r#"{"zoom": 2, "cover": true}"#, (120, 120)),
    ];
    for (json, expected) in cases {
        let out = decode_output(&render(&input, &config(json)));
        assert_eq!(out.dimensions(), expected, "config {json}");
    }
}

#[test]
fn raising_light_cut_never_adds_line_pixels() {
    let input = scene(80, 80);
    let mut previous = u64::MAX;
    for light_cut in (0..=255).step_by(17) {
        let cfg = config(&format!(r#"{{"darkCut": 40, "lightCut": {light_cut}}}"#));
        let staged = process_staged(&input, &cfg).unwrap();
        let count = oli_pipeline::lines::count_line_pixels(&staged.lines);
        assert!(count <= previous, "lightCut {light_cut}: {count} > {previous}");
        previous = count;
    }
}

#[test]
fn flat_shading_has_exactly_tone_count_levels() {
    let ramp = encode(&RgbaImage::from_fn(256, 8, |x, _| gray(x as u8)));
    for tone_count in 1..=10usize {
        let cfg = config(&format!(r#"{{"toneCount": {tone_count}, "denoise": false}}"#));
        let staged = process_staged(&ramp, &cfg).unwrap();
        let tone = staged.tone.expect("shading enabled");
        let levels = oli_pipeline::shade::histogram(&tone);
        assert_eq!(levels.len(), tone_count + 1, "toneCount {tone_count}: {levels:?}");
    }
}

#[test]
fn light_is_applied_to_the_analysed_luminance() {
    let halves = encode(&RgbaImage::from_fn(64, 64, |x, _| gray(if x < 32 { 200 } else { 240 })));
    let plain = r#""denoise": false, "kiss": false, "shade": false, "watermark": false"#;

    let normal = process_staged(&halves, &config(&format!("{{{plain}}}"))).unwrap();
    assert!(oli_pipeline::lines::count_line_pixels(&normal.lines) > 0);

    // Darkened to black before analysis: no contrast left, so no lines,
    // and the paper stays white instead of the whole canvas going dark.
    let blacked = decode_output(&render(&halves, &config(&format!(r#"{{"light": -100, {plain}}}"#))));
    assert!(blacked.pixels().all(|p| p.0 == [255, 255, 255, 255]));
}

#[test]
fn light_moves_pixels_between_tone_bands() {
    let flat = encode(&RgbaImage::from_pixel(16, 16, gray(100)));
    let tones = |light: i32| {
        let cfg = config(&format!(
            r#"{{"light": {light}, "denoise": false, "kiss": false, "watermark": false}}"#
        ));
        let staged = process_staged(&flat, &cfg).unwrap();
        oli_pipeline::shade::histogram(&staged.tone.expect("shading enabled"))
    };

    // 100 sits inside [shadeLight, shadeLimit); +50% lifts it to 150, past the limit.
    let base = tones(0);
    assert_eq!(base.len(), 1);
    assert!(base[0].0 < 255, "got {base:?}");
    assert_eq!(tones(50), vec![(255, 256)]);
}

#[test]
fn sketch_mode_has_no_shading() {
    let input = scene(64, 48);
    let with_shade = process_staged(&input, &config(r#"{"quality": "sketch", "shade": true}"#)).unwrap();
    let without = process_staged(&input, &config(r#"{"quality": "sketch", "shade": false}"#)).unwrap();
    assert!(with_shade.tone.is_none());
    assert_eq!(with_shade.png, without.png);
}

#[test]
fn watermark_without_asset_is_a_no_op() {
    let input = scene(64, 48);
    let on = render(&input, &config(r#"{"watermark": true}"#));
    let off = render(&input, &config(r#"{"watermark": false}"#));
    assert_eq!(on, off);

    let broken = config(r#"{"watermark": true}"#).with_watermark_image(b"not a png".to_vec());
    assert_eq!(render(&input, &broken), off);
}

#[test]
fn watermark_asset_changes_the_corner() {
    let input = scene(200, 100);
    let sheet = RgbaImage::from_fn(40, 20, |_, y| {
        if y < 10 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    });
    let plain = decode_output(&render(&input, &config(r#"{"kiss": false}"#)));
    let marked = decode_output(&render(
        &input,
        &config(r#"{"kiss": false}"#).with_watermark_image(encode(&sheet)),
    ));
    let hajimei = decode_output(&render(
        &input,
        &config(r#"{"kiss": false, "hajimei": true}"#).with_watermark_image(encode(&sheet)),
    ));

    // Default mark: red, bottom right. Hajimei mark: blue, bottom left.
    let bottom_right = marked.get_pixel(200 - 6 - 30, 100 - 3 - 8);
    assert!(bottom_right.0[0] > 200 && bottom_right.0[2] < 60, "got {bottom_right:?}");
    let bottom_left = hajimei.get_pixel(4 + 18, 100 - 3 - 9);
    assert!(bottom_left.0[2] > 200 && bottom_left.0[0] < 60, "got {bottom_left:?}");
    assert_eq!(plain.get_pixel(100, 10), marked.get_pixel(100, 10));
}

fn scenario_config() -> PipelineConfig {
    config(
        r#"{"quality": "normal", "denoise": false, "lightCut": 128, "darkCut": 118,
            "shade": false, "kiss": false, "watermark": false}"#,
    )
}

#[test]
fn flat_gray_scenario_stays_blank_at_every_level() {
    let cfg = scenario_config();
    for level in [0u8, 64, 117, 118, 120, 123, 125, 128, 129, 200, 255] {
        let img = RgbaImage::from_pixel(512, 512, gray(level));
        let out = decode_output(&render(&encode(&img), &cfg));
        assert_eq!(out.dimensions(), (512, 512));
        assert!(
            out.pixels().all(|p| *p == gray(255)),
            "flat gray {level} produced ink"
        );
    }
}

#[test]
fn step_scenario_inks_only_at_the_boundary() {
    let img = RgbaImage::from_fn(512, 512, |x, _| gray(if x < 256 { 64 } else { 192 }));
    let cfg = scenario_config();
    let out = decode_output(&render(&encode(&img), &cfg));
    assert_eq!(out.dimensions(), (512, 512));

    let mut inked = 0;
    for (x, y, p) in out.enumerate_pixels() {
        if p.0[0] < 255 {
            inked += 1;
            assert!((250..=256).contains(&x), "ink at ({x}, {y}) away from the step");
        }
    }
    assert!(inked >= 512, "expected a line along the step, got {inked} inked pixels");
}

#[test]
fn invalid_config_is_reported_not_swallowed() {
    let input = scene(16, 16);
    assert!(render_json(&input, Some(r#"{"quality": "ultra"}"#)).is_err());
    assert!(render_json(&input, Some("{")).is_err());
    assert!(render_json(&input, Some(r#"{"zoom": 99, "toneCount": -4}"#)).is_ok());
}
