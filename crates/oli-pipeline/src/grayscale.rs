//! Luminance map.
//!
//! Converts the working canvas into a single-channel luminance image
//! with the standard perceptual weighting `0.299*R + 0.587*G + 0.114*B`.
//! Both the line extraction and the shading stage read this map, after
//! the `light` adjustment has been applied to it.

use image::{GrayImage, Luma};

use crate::types::RasterImage;

/// Perceptual luminance of one RGB triple, floored to `u8`.
///
/// Integer weights (per mille) keep neutral grays exact.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
    y as u8
}

/// Compute the luminance map of an RGBA canvas.
///
/// Alpha is ignored; the decoder has already flattened the canvas onto
/// white.
#[must_use = "returns the luminance map"]
pub fn luminance(image: &RasterImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        Luma([luma(r, g, b)])
    })
}

/// Scale every luminance value by `1 + light / 100`, saturating.
///
/// Runs before denoise and edge analysis, so brightening or darkening
/// changes which tonal differences become lines and which tone band a
/// pixel falls into. `light == 0` returns the map unchanged.
#[must_use = "returns the adjusted luminance map"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn adjust_light(mut luminance: GrayImage, light: i8) -> GrayImage {
    if light == 0 {
        return luminance;
    }
    let factor = 1.0 + f32::from(light) / 100.0;
    for pixel in luminance.pixels_mut() {
        let v = f32::from(pixel.0[0]);
        pixel.0[0] = (v * factor).round().clamp(0.0, 255.0) as u8;
    }
    luminance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_pixels_keep_their_value() {
        for v in [0u8, 1, 64, 118, 128, 200, 254, 255] {
            assert_eq!(luma(v, v, v), v, "gray {v}");
        }
    }

    #[test]
    fn green_is_brightest_channel() {
        let r = luma(255, 0, 0);
        let g = luma(0, 255, 0);
        let b = luma(0, 0, 255);
        assert!(
            g > r && r > b,
            "expected green > red > blue luminance, got R={r} G={g} B={b}",
        );
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = RasterImage::new(17, 31);
        let map = luminance(&img);
        assert_eq!(map.dimensions(), (17, 31));
    }

    #[test]
    fn luminance_reads_each_pixel() {
        let img = RasterImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let map = luminance(&img);
        assert_eq!(map.get_pixel(0, 0).0[0], 0);
        assert_eq!(map.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn light_scales_and_saturates() {
        let map = GrayImage::from_fn(3, 1, |x, _| Luma([[100, 200, 0][x as usize]]));
        let brighter = adjust_light(map.clone(), 50);
        assert_eq!(brighter.get_pixel(0, 0).0[0], 150);
        assert_eq!(brighter.get_pixel(1, 0).0[0], 255);
        assert_eq!(brighter.get_pixel(2, 0).0[0], 0);

        let darker = adjust_light(map.clone(), -40);
        assert_eq!(darker.get_pixel(0, 0).0[0], 60);
        assert_eq!(darker.get_pixel(1, 0).0[0], 120);

        let black = adjust_light(map, -100);
        assert!(black.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn zero_light_is_identity() {
        let map = GrayImage::from_fn(16, 4, |x, y| Luma([(x * 15 + y) as u8]));
        assert_eq!(adjust_light(map.clone(), 0), map);
    }
}
