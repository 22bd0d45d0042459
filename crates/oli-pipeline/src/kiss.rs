//! Kiss gradient.
//!
//! The kiss effect tints the ink with a fixed warm-to-cyan gradient that
//! runs along the canvas diagonal, then lays a faint wash of the same
//! gradient over the whole canvas. It depends only on pixel position, so
//! identical inputs always produce identical colors.

use image::{GrayImage, Rgba};

use crate::types::RasterImage;

/// Gradient stops as `(position, [r, g, b])`, ordered by position.
pub const KISS_STOPS: [(f32, [u8; 3]); 6] = [
    (0.0, [251, 186, 48]),
    (0.4, [252, 114, 53]),
    (0.6, [252, 53, 78]),
    (0.7, [207, 54, 223]),
    (0.8, [55, 181, 217]),
    (1.0, [62, 182, 218]),
];

/// Opacity of the wash laid over the whole canvas.
pub const WASH_OPACITY: f32 = 0.12;

fn lerp(a: u8, b: u8, t: f32) -> f32 {
    f32::from(a) + (f32::from(b) - f32::from(a)) * t
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Gradient color at position `t` in `[0, 1]` (clamped).
#[must_use]
pub fn gradient_color(t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let mut lower = KISS_STOPS[0];
    for upper in KISS_STOPS.iter().skip(1).copied() {
        if t <= upper.0 {
            let span = upper.0 - lower.0;
            let local = if span > 0.0 { (t - lower.0) / span } else { 0.0 };
            return [0usize, 1, 2].map(|c| to_channel(lerp(lower.1[c], upper.1[c], local)));
        }
        lower = upper;
    }
    lower.1
}

/// Gradient position of pixel `(x, y)` on a `width` x `height` canvas.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn diagonal_position(x: u32, y: u32, width: u32, height: u32) -> f32 {
    let extent = u64::from(width) + u64::from(height);
    if extent == 0 {
        return 0.0;
    }
    (u64::from(x) + u64::from(y)) as f32 / extent as f32
}

/// Expand a gray composite into an opaque RGBA canvas.
#[must_use]
pub fn to_rgba(composite: &GrayImage) -> RasterImage {
    RasterImage::from_fn(composite.width(), composite.height(), |x, y| {
        let v = composite.get_pixel(x, y).0[0];
        Rgba([v, v, v, u8::MAX])
    })
}

/// Tint the ink of a gray composite with the kiss gradient.
#[must_use = "returns the colored canvas"]
pub fn apply_kiss(composite: &GrayImage) -> RasterImage {
    let (w, h) = composite.dimensions();
    RasterImage::from_fn(w, h, |x, y| {
        let ink = f32::from(u8::MAX - composite.get_pixel(x, y).0[0]) / 255.0;
        let grad = gradient_color(diagonal_position(x, y, w, h));
        let [r, g, b] = grad.map(|c| {
            let base = 255.0f32.mul_add(1.0 - ink, f32::from(c) * ink);
            to_channel(base.mul_add(1.0 - WASH_OPACITY, f32::from(c) * WASH_OPACITY))
        });
        Rgba([r, g, b, u8::MAX])
    })
}

/// Colorize the composite: kiss gradient when `kiss`, plain gray
/// otherwise.
#[must_use = "returns the colored canvas"]
pub fn colorize(composite: &GrayImage, kiss: bool) -> RasterImage {
    let canvas = if kiss {
        apply_kiss(composite)
    } else {
        to_rgba(composite)
    };
    tracing::debug!(kiss, "colorized canvas");
    canvas
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    #[test]
    fn gradient_hits_stops_exactly() {
        assert_eq!(gradient_color(0.0), [251, 186, 48]);
        assert_eq!(gradient_color(0.4), [252, 114, 53]);
        assert_eq!(gradient_color(1.0), [62, 182, 218]);
        assert_eq!(gradient_color(-3.0), gradient_color(0.0));
        assert_eq!(gradient_color(7.0), gradient_color(1.0));
    }

    #[test]
    fn gradient_interpolates_between_stops() {
        // Halfway between 0.6 and 0.7.
        let [r, g, b] = gradient_color(0.65);
        assert!((229..=230).contains(&r), "r={r}");
        assert!((53..=54).contains(&g), "g={g}");
        assert!((150..=151).contains(&b), "b={b}");
    }

    #[test]
    fn diagonal_runs_corner_to_corner() {
        assert!(diagonal_position(0, 0, 10, 10).abs() < f32::EPSILON);
        let far = diagonal_position(9, 9, 10, 10);
        assert!(far > 0.85 && far < 1.0);
        assert!(diagonal_position(0, 0, 0, 0).abs() < f32::EPSILON);
    }

    #[test]
    fn kiss_leaves_paper_nearly_white() {
        let paper = GrayImage::from_pixel(4, 4, Luma([255]));
        let out = apply_kiss(&paper);
        for p in out.pixels() {
            assert!(p.0.iter().take(3).all(|&c| c >= 200), "got {:?}", p.0);
            assert_eq!(p.0[3], 255);
        }
    }

    #[test]
    fn kiss_tints_ink_with_gradient() {
        let ink = GrayImage::from_pixel(4, 4, Luma([0]));
        let out = apply_kiss(&ink);
        let [r, g, b] = gradient_color(0.0);
        assert_eq!(out.get_pixel(0, 0).0, [r, g, b, 255]);
    }

    #[test]
    fn kiss_is_deterministic() {
        let img = GrayImage::from_fn(32, 16, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        assert_eq!(apply_kiss(&img), apply_kiss(&img));
    }

    #[test]
    fn plain_colorize_keeps_gray() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[0, 128, 255][x as usize]]));
        let out = colorize(&img, false);
        assert_eq!(out.get_pixel(1, 0).0, [128, 128, 128, 255]);
    }

    #[test]
    fn colorize_with_kiss_applies_gradient() {
        let img = GrayImage::from_fn(5, 5, |x, y| Luma([(x * 40 + y) as u8]));
        assert_eq!(colorize(&img, true), apply_kiss(&img));
    }
}
