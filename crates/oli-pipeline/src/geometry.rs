//! Zoom scaling and cover crop.
//!
//! Scales the decoded canvas uniformly by `zoom`, then (when `cover` is
//! set) crops the longer axis symmetrically to a square. Scaling happens
//! first so zoom is always relative to the original image.
//!
//! Output dimensions are `max(1, floor(dim * zoom))` per axis. The only
//! exception is the [`MAX_CANVAS_PIXELS`] ceiling, which lowers the
//! effective zoom for inputs that would otherwise produce a canvas too
//! large to process.

use image::imageops::{self, FilterType};

use crate::types::{Dimensions, RasterImage};

/// Resampling filter used for zoom. Lanczos3 keeps edges crisp, which
/// matters for the line extraction that follows.
pub const SCALE_FILTER: FilterType = FilterType::Lanczos3;

/// Largest working canvas, in pixels.
pub const MAX_CANVAS_PIXELS: u64 = 50_000_000;

/// Absorbs binary representation error in products like `100 * 0.7`.
const FLOOR_EPSILON: f64 = 1e-9;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_axis(len: u32, factor: f64) -> u32 {
    let scaled = (f64::from(len) * factor + FLOOR_EPSILON).floor();
    (scaled as u32).max(1)
}

/// Compute the scaled canvas size for `zoom`.
///
/// Returns `(dimensions, effective_zoom)`; the effective zoom differs
/// from `zoom` only when the canvas ceiling kicks in.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn scaled_dimensions(source: Dimensions, zoom: f64) -> (Dimensions, f64) {
    let mut factor = zoom;
    let mut scaled = Dimensions {
        width: scale_axis(source.width, factor),
        height: scale_axis(source.height, factor),
    };
    if scaled.pixel_count() > MAX_CANVAS_PIXELS {
        factor *= (MAX_CANVAS_PIXELS as f64 / scaled.pixel_count() as f64).sqrt();
        scaled = Dimensions {
            width: scale_axis(source.width, factor),
            height: scale_axis(source.height, factor),
        };
    }
    (scaled, factor)
}

/// Scale `image` by `zoom`, preserving aspect ratio.
///
/// Returns the input unchanged when the target size equals the source
/// size, so `zoom = 1.0` is an exact identity.
#[must_use = "returns the scaled image"]
pub fn scale(image: RasterImage, zoom: f64) -> RasterImage {
    let source = Dimensions::of(&image);
    let (target, factor) = scaled_dimensions(source, zoom);
    if target == source {
        return image;
    }
    if (factor - zoom).abs() > f64::EPSILON {
        tracing::warn!(
            %source,
            %target,
            requested_zoom = zoom,
            effective_zoom = factor,
            "canvas ceiling reduced zoom"
        );
    }
    imageops::resize(&image, target.width, target.height, SCALE_FILTER)
}

/// Crop the longer axis symmetrically so the canvas becomes square.
#[must_use = "returns the cropped image"]
pub fn cover_crop(image: RasterImage) -> RasterImage {
    let (w, h) = image.dimensions();
    if w == h {
        return image;
    }
    let side = w.min(h);
    let x = (w - side) / 2;
    let y = (h - side) / 2;
    imageops::crop_imm(&image, x, y, side, side).to_image()
}

/// Apply zoom then the optional cover crop.
#[must_use = "returns the transformed canvas"]
pub fn transform(image: RasterImage, zoom: f64, cover: bool) -> RasterImage {
    let scaled = scale(image, zoom);
    let canvas = if cover { cover_crop(scaled) } else { scaled };
    tracing::debug!(
        width = canvas.width(),
        height = canvas.height(),
        zoom,
        cover,
        "transformed canvas"
    );
    canvas
}
