//! Gaussian smoothing of the luminance map.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. When `denoise` is on,
//! the luminance map is smoothed before edge analysis so sensor and
//! JPEG noise do not break lines into speckles.

use image::GrayImage;

/// Sigma used by the `denoise` option.
pub const DENOISE_SIGMA: f32 = 0.8;

/// Blur sigma of the unsharp mask behind the `sharpen` option.
pub const SHARPEN_SIGMA: f32 = 1.0;

/// Unsharp mask strength: `out = in + amount * (in - blur(in))`.
pub const SHARPEN_AMOUNT: f32 = 1.5;

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Smooth the luminance map when `enabled`, otherwise pass it through.
#[must_use = "returns the (possibly) denoised luminance map"]
pub fn denoise(luminance: GrayImage, enabled: bool) -> GrayImage {
    if enabled {
        gaussian_blur(&luminance, DENOISE_SIGMA)
    } else {
        luminance
    }
}

/// Unsharp-mask an edge intensity map when `enabled`.
///
/// Clamped at zero, so a pixel with no edge response and no stronger
/// neighbor than itself stays at zero.
#[must_use = "returns the (possibly) sharpened map"]
pub fn sharpen(edges: GrayImage, enabled: bool) -> GrayImage {
    if enabled {
        imageproc::filter::sharpen_gaussian(&edges, SHARPEN_SIGMA, SHARPEN_AMOUNT)
    } else {
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a test image with a sharp black-to-white boundary at x=5.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn zero_sigma_returns_identical_image() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_blur(&img, 0.0), img);
        assert_eq!(gaussian_blur(&img, -1.0), img);
    }

    #[test]
    fn disabled_denoise_is_identity() {
        let img = sharp_edge_image();
        assert_eq!(denoise(img.clone(), false), img);
    }

    #[test]
    fn denoise_softens_sharp_edge() {
        let blurred = denoise(sharp_edge_image(), true);
        let left_of_edge = blurred.get_pixel(4, 5).0[0];
        let right_of_edge = blurred.get_pixel(5, 5).0[0];
        assert!(left_of_edge > 0, "got {left_of_edge}");
        assert!(right_of_edge < 255, "got {right_of_edge}");
        assert_eq!(blurred.dimensions(), (10, 10));
    }

    #[test]
    fn uniform_image_stays_near_uniform() {
        let img = GrayImage::from_fn(10, 10, |_, _| image::Luma([128]));
        let blurred = denoise(img, true);
        for pixel in blurred.pixels() {
            let diff = i16::from(pixel.0[0]) - 128;
            assert!(diff.abs() <= 1, "got {}", pixel.0[0]);
        }
    }

    #[test]
    fn disabled_sharpen_is_identity() {
        let img = sharp_edge_image();
        assert_eq!(sharpen(img.clone(), false), img);
    }

    #[test]
    fn sharpen_keeps_blank_maps_blank() {
        let blank = GrayImage::new(12, 12);
        assert_eq!(sharpen(blank.clone(), true), blank);
    }

    #[test]
    fn sharpen_boosts_a_thin_ridge() {
        let ridge = GrayImage::from_fn(15, 15, |x, _| image::Luma([if x == 7 { 100 } else { 0 }]));
        let sharpened = sharpen(ridge, true);
        assert!(sharpened.get_pixel(7, 7).0[0] > 100);
        // Flanks go negative and clamp back to zero.
        assert_eq!(sharpened.get_pixel(6, 7).0[0], 0);
        assert_eq!(sharpened.get_pixel(0, 7).0[0], 0);
    }
}
