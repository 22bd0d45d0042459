//! Logo compositing.
//!
//! The watermark asset is a two-row sprite: the upper half holds the
//! default mark and the lower half the `hajimei` mark. Each style has a
//! [`Preset`] that picks its sprite row, its corner, its size relative to
//! the canvas and its opacity. Placement is computed by [`plan`] and the
//! scaled mark is alpha-blended onto the canvas, clipped to its bounds.
//!
//! A missing or undecodable asset disables the stage; it never fails the
//! pipeline.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::decode::decode_dynamic;
use crate::types::{Dimensions, RasterImage};

/// Canvas aspect ratio above which the mark is sized by height.
pub const LANDSCAPE_ASPECT: f64 = 1.1;

/// Horizontal margin as a fraction of the mark height.
pub const MARGIN_X: f64 = 0.2;

/// Vertical margin as a fraction of the mark height.
pub const MARGIN_Y: f64 = 0.16;

/// Which mark to draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WatermarkStyle {
    #[default]
    Default,
    Hajimei,
}

impl WatermarkStyle {
    #[must_use]
    pub const fn from_hajimei(hajimei: bool) -> Self {
        if hajimei { Self::Hajimei } else { Self::Default }
    }

    /// Layout preset for this style.
    #[must_use]
    pub const fn preset(self) -> Preset {
        match self {
            Self::Default => Preset {
                row: SpriteRow::Upper,
                corner: Corner::BottomRight,
                landscape_height: 0.15,
                portrait_width: 0.30,
                opacity: 1.0,
            },
            Self::Hajimei => Preset {
                row: SpriteRow::Lower,
                corner: Corner::BottomLeft,
                landscape_height: 0.18,
                portrait_width: 0.36,
                opacity: 0.9,
            },
        }
    }
}

/// Half of the sprite sheet a style draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteRow {
    Upper,
    Lower,
}

/// Canvas corner the mark is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Corner {
    BottomRight,
    BottomLeft,
}

/// Size, anchor, and opacity of one style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub row: SpriteRow,
    pub corner: Corner,
    /// Mark height relative to canvas height on landscape canvases.
    pub landscape_height: f64,
    /// Mark width relative to canvas width otherwise.
    pub portrait_width: f64,
    pub opacity: f32,
}

/// Where a mark lands on the canvas.
///
/// `x` and `y` may be negative or overhang the canvas; blending clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    pub corner: Corner,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_len(v: f64) -> u32 {
    v.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

#[allow(clippy::cast_possible_truncation)]
fn round_offset(v: f64) -> i64 {
    v.round() as i64
}

/// Compute the placement of a `mark`-sized sprite on `canvas`.
///
/// The mark never exceeds the canvas: an extreme sprite aspect ratio is
/// scaled down on both axes until it fits. Returns `None` when either
/// size is degenerate or the scaled mark would be empty.
#[must_use]
pub fn plan(canvas: Dimensions, mark: Dimensions, preset: Preset) -> Option<Placement> {
    if canvas.pixel_count() == 0 || mark.pixel_count() == 0 {
        return None;
    }
    let (cw, ch) = (f64::from(canvas.width), f64::from(canvas.height));
    let (mw, mh) = (f64::from(mark.width), f64::from(mark.height));

    let (width, height) = if cw / ch > LANDSCAPE_ASPECT {
        let height = ch * preset.landscape_height;
        (height * mw / mh, height)
    } else {
        let width = cw * preset.portrait_width;
        (width, width * mh / mw)
    };
    if width < 0.5 || height < 0.5 {
        return None;
    }
    let fit = (cw / width).min(ch / height).min(1.0);
    let (width, height) = (
        round_len(width * fit).clamp(1, canvas.width),
        round_len(height * fit).clamp(1, canvas.height),
    );

    let margin_x = round_offset(f64::from(height) * MARGIN_X);
    let margin_y = round_offset(f64::from(height) * MARGIN_Y);
    let x = match preset.corner {
        Corner::BottomRight => i64::from(canvas.width) - i64::from(width) - margin_x,
        Corner::BottomLeft => margin_x,
    };
    let y = i64::from(canvas.height) - i64::from(height) - margin_y;

    Some(Placement {
        x,
        y,
        width,
        height,
        corner: preset.corner,
    })
}

/// Cut the sprite row for `row` out of a sprite sheet.
///
/// Sheets shorter than two pixels hold a single mark and are used whole.
#[must_use]
pub fn sprite(sheet: &RgbaImage, row: SpriteRow) -> RgbaImage {
    let (w, h) = sheet.dimensions();
    if h < 2 {
        return sheet.clone();
    }
    let half = h / 2;
    match row {
        SpriteRow::Upper => imageops::crop_imm(sheet, 0, 0, w, half).to_image(),
        SpriteRow::Lower => imageops::crop_imm(sheet, 0, half, w, h - half).to_image(),
    }
}

/// Alpha-blend `mark` onto `canvas` at `(x, y)`, clipped to the canvas.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blend(canvas: &mut RasterImage, mark: &RgbaImage, x: i64, y: i64, opacity: f32) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for (mx, my, src) in mark.enumerate_pixels() {
        let (px, py) = (x + i64::from(mx), y + i64::from(my));
        if px < 0 || py < 0 || px >= cw || py >= ch {
            continue;
        }
        let alpha = f32::from(src.0[3]) / 255.0 * opacity;
        if alpha <= 0.0 {
            continue;
        }
        let dst = canvas.get_pixel_mut(px as u32, py as u32);
        let Rgba([dr, dg, db, da]) = *dst;
        let mix = |s: u8, d: u8| {
            f32::from(s)
                .mul_add(alpha, f32::from(d) * (1.0 - alpha))
                .round()
                .clamp(0.0, 255.0) as u8
        };
        *dst = Rgba([mix(src.0[0], dr), mix(src.0[1], dg), mix(src.0[2], db), da]);
    }
}

/// Composite the `style` mark from `sheet` onto `canvas`.
///
/// Returns the placement used, or `None` if the mark was skipped.
pub fn apply_watermark(
    canvas: &mut RasterImage,
    sheet: &RgbaImage,
    style: WatermarkStyle,
) -> Option<Placement> {
    let preset = style.preset();
    let mark = sprite(sheet, preset.row);
    let placement = plan(Dimensions::of(canvas), Dimensions::of(&mark), preset)?;
    let scaled = imageops::resize(&mark, placement.width, placement.height, FilterType::Triangle);
    blend(canvas, &scaled, placement.x, placement.y, preset.opacity);
    tracing::debug!(
        ?style,
        x = placement.x,
        y = placement.y,
        width = placement.width,
        height = placement.height,
        "applied watermark"
    );
    Some(placement)
}

/// Decode watermark asset bytes into a sprite sheet.
///
/// Failures are logged and answered with `None`.
#[must_use]
pub fn load_sheet(bytes: &[u8]) -> Option<RgbaImage> {
    match decode_dynamic(bytes) {
        Ok(image) => Some(image.to_rgba8()),
        Err(e) => {
            tracing::warn!(error = %e, "watermark asset failed to decode, skipping watermark");
            None
        }
    }
}

/// Run the stage: decode `asset` (if any) and composite the mark.
pub fn watermark_stage(
    canvas: &mut RasterImage,
    asset: Option<&[u8]>,
    style: WatermarkStyle,
) -> Option<Placement> {
    let Some(bytes) = asset else {
        tracing::debug!("no watermark asset configured, skipping watermark");
        return None;
    };
    let sheet = load_sheet(bytes)?;
    apply_watermark(canvas, &sheet, style)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn is_red(p: Rgba<u8>) -> bool {
        p.0[0] >= 250 && p.0[1] <= 5 && p.0[2] <= 5
    }

    /// 40x20 sheet: red upper row, blue lower row.
    fn sheet() -> RgbaImage {
        RgbaImage::from_fn(40, 20, |_, y| if y < 10 { RED } else { BLUE })
    }

    fn encode(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image::ImageEncoder::write_image(
            image::codecs::png::PngEncoder::new(&mut buf),
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn landscape_default_sizes_by_height() {
        let preset = WatermarkStyle::Default.preset();
        let p = plan(dims(400, 200), dims(40, 10), preset).unwrap();
        assert_eq!((p.width, p.height), (120, 30));
        // margins: 0.2 * 30 = 6, 0.16 * 30 = 4.8 -> 5
        assert_eq!((p.x, p.y), (400 - 120 - 6, 200 - 30 - 5));
        assert_eq!(p.corner, Corner::BottomRight);
    }

    #[test]
    fn portrait_default_sizes_by_width() {
        let preset = WatermarkStyle::Default.preset();
        let p = plan(dims(200, 400), dims(40, 10), preset).unwrap();
        assert_eq!((p.width, p.height), (60, 15));
    }

    #[test]
    fn square_counts_as_portrait() {
        let preset = WatermarkStyle::Default.preset();
        let p = plan(dims(100, 100), dims(40, 10), preset).unwrap();
        assert_eq!(p.width, 30);
    }

    #[test]
    fn hajimei_anchors_bottom_left() {
        let preset = WatermarkStyle::Hajimei.preset();
        let p = plan(dims(400, 200), dims(40, 10), preset).unwrap();
        assert_eq!(p.height, 36);
        assert_eq!(p.x, 7);
        assert_eq!(p.corner, Corner::BottomLeft);
    }

    #[test]
    fn degenerate_sizes_skip() {
        let preset = WatermarkStyle::Default.preset();
        assert!(plan(dims(0, 10), dims(4, 4), preset).is_none());
        assert!(plan(dims(10, 10), dims(0, 4), preset).is_none());
        assert!(plan(dims(1, 1), dims(4, 4), preset).is_none());
    }

    #[test]
    fn extreme_sheet_aspect_is_capped_to_canvas() {
        let preset = WatermarkStyle::Default.preset();
        // Upper row of a 16384x2 sheet is 16384x1.
        let p = plan(dims(1000, 500), dims(16384, 1), preset).unwrap();
        assert_eq!((p.width, p.height), (1000, 1));
        assert_eq!((p.x, p.y), (0, 499));

        let tall = plan(dims(500, 1000), dims(2, 8192), WatermarkStyle::Hajimei.preset()).unwrap();
        assert!(tall.width <= 500 && tall.height <= 1000);
    }

    #[test]
    fn wide_sheet_watermark_fits_canvas() {
        let mut canvas = RasterImage::from_pixel(1000, 500, WHITE);
        let bytes = encode(&RgbaImage::from_pixel(16384, 2, RED));
        let placement = watermark_stage(&mut canvas, Some(&bytes), WatermarkStyle::Default).unwrap();
        assert!(placement.width <= 1000 && placement.height <= 500);
        assert!(is_red(*canvas.get_pixel(500, 499)));
        assert_eq!(*canvas.get_pixel(500, 0), WHITE);
    }

    #[test]
    fn sprite_rows_select_halves() {
        let s = sheet();
        let upper = sprite(&s, SpriteRow::Upper);
        let lower = sprite(&s, SpriteRow::Lower);
        assert_eq!(upper.dimensions(), (40, 10));
        assert!(upper.pixels().all(|p| *p == RED));
        assert!(lower.pixels().all(|p| *p == BLUE));
    }

    #[test]
    fn single_row_sheet_is_used_whole() {
        let s = RgbaImage::from_pixel(8, 1, RED);
        assert_eq!(sprite(&s, SpriteRow::Lower), s);
    }

    #[test]
    fn default_style_draws_upper_mark_bottom_right() {
        let mut canvas = RasterImage::from_pixel(400, 200, WHITE);
        let p = apply_watermark(&mut canvas, &sheet(), WatermarkStyle::Default).unwrap();
        let center = canvas.get_pixel(
            u32::try_from(p.x).unwrap() + p.width / 2,
            u32::try_from(p.y).unwrap() + p.height / 2,
        );
        assert!(is_red(*center), "got {center:?}");
        assert_eq!(*canvas.get_pixel(5, 5), WHITE);
    }

    #[test]
    fn hajimei_blends_at_partial_opacity() {
        let mut canvas = RasterImage::from_pixel(400, 200, WHITE);
        let p = apply_watermark(&mut canvas, &sheet(), WatermarkStyle::Hajimei).unwrap();
        let center = canvas.get_pixel(
            u32::try_from(p.x).unwrap() + p.width / 2,
            u32::try_from(p.y).unwrap() + p.height / 2,
        );
        // 0.9 * blue + 0.1 * white
        let [r, g, b, a] = center.0;
        assert!((24..=28).contains(&r) && (24..=28).contains(&g), "got {center:?}");
        assert_eq!((b, a), (255, 255));
    }

    #[test]
    fn transparent_mark_leaves_canvas() {
        let mut canvas = RasterImage::from_pixel(50, 50, WHITE);
        let clear = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 0]));
        blend(&mut canvas, &clear, 5, 5, 1.0);
        assert!(canvas.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn blend_clips_to_canvas() {
        let mut canvas = RasterImage::from_pixel(4, 4, WHITE);
        let mark = RgbaImage::from_pixel(6, 6, RED);
        blend(&mut canvas, &mark, -3, 2, 1.0);
        assert_eq!(*canvas.get_pixel(0, 3), RED);
        assert_eq!(*canvas.get_pixel(3, 3), WHITE);
        assert_eq!(*canvas.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn missing_or_broken_asset_skips() {
        let mut canvas = RasterImage::from_pixel(20, 20, WHITE);
        let before = canvas.clone();
        assert!(watermark_stage(&mut canvas, None, WatermarkStyle::Default).is_none());
        assert!(watermark_stage(&mut canvas, Some(b"junk"), WatermarkStyle::Default).is_none());
        assert_eq!(canvas, before);
    }

    #[test]
    fn stage_decodes_png_asset() {
        let mut canvas = RasterImage::from_pixel(400, 200, WHITE);
        let bytes = encode(&sheet());
        assert!(watermark_stage(&mut canvas, Some(&bytes), WatermarkStyle::Default).is_some());
        assert!(canvas.pixels().any(|p| is_red(*p)));
    }
}
