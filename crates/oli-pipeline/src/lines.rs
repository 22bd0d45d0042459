//! Line extraction: edge intensity and band thresholding.
//!
//! Produces the line-art base layer from the luminance map in two steps:
//!
//! 1. [`edge_intensity`] computes a per-pixel ink strength (0 = no line,
//!    255 = strongest line) using the operator selected by the quality
//!    mode (see [`EdgeOperator`]).
//! 2. [`band_threshold`] maps that intensity through the
//!    `[dark_cut, light_cut]` band into the final line mask.
//!
//! The density modes (`fine` through `extraCoarse`) use a local-mean
//! high-pass: a pixel gets ink when it is darker than the box mean of its
//! neighborhood, so lines sit on the dark side of every tonal boundary.
//! Larger kernels see broader structure; lower gain and a higher floor
//! drop faint texture, which makes the coarse modes sparser and more
//! abstract.

use image::{GrayImage, Luma};

use crate::config::Quality;

/// Parameters of the local-mean high-pass used by the density modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensityKernel {
    /// Box radius; the kernel side is `2 * radius + 1`.
    pub radius: u32,
    /// Multiplier applied to `mean - luminance`.
    pub gain: i32,
    /// Minimum-gradient floor subtracted after the gain.
    pub floor: i32,
}

/// The edge operator behind each quality mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOperator {
    /// Local-mean high-pass with the given kernel.
    LocalMean(DensityKernel),
    /// Directional relief: ink on slopes that face away from a top-left
    /// light.
    Emboss,
    /// Sobel gradient magnitude outlines.
    Sketch,
}

/// Emboss relief gain applied to the summed Sobel responses.
const EMBOSS_DIVISOR: i32 = 2;

/// Sketch gain applied to the Sobel magnitude.
const SKETCH_DIVISOR: u16 = 2;

impl EdgeOperator {
    /// Select the operator for a quality mode.
    #[must_use]
    pub const fn for_quality(quality: Quality) -> Self {
        const fn kernel(radius: u32, gain: i32, floor: i32) -> EdgeOperator {
            EdgeOperator::LocalMean(DensityKernel {
                radius,
                gain,
                floor,
            })
        }
        match quality {
            Quality::Fine => kernel(2, 10, 0),
            Quality::Normal => kernel(3, 8, 0),
            Quality::Coarse => kernel(4, 7, 12),
            Quality::SuperCoarse => kernel(5, 6, 24),
            Quality::ExtraCoarse => kernel(6, 5, 36),
            Quality::Emboss => Self::Emboss,
            Quality::Sketch => Self::Sketch,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn clamp_ink(value: i32) -> u8 {
    if value <= 0 {
        0
    } else if value >= 255 {
        255
    } else {
        value as u8
    }
}

/// Compute per-pixel edge intensity for `quality`.
///
/// Flat regions always yield zero; intensity grows with local contrast.
#[must_use = "returns the edge intensity map"]
pub fn edge_intensity(luminance: &GrayImage, quality: Quality) -> GrayImage {
    let (w, h) = luminance.dimensions();
    match EdgeOperator::for_quality(quality) {
        EdgeOperator::LocalMean(kernel) => {
            let mean = imageproc::filter::box_filter(luminance, kernel.radius, kernel.radius);
            GrayImage::from_fn(w, h, |x, y| {
                let local = i32::from(mean.get_pixel(x, y).0[0]);
                let own = i32::from(luminance.get_pixel(x, y).0[0]);
                Luma([clamp_ink((local - own) * kernel.gain - kernel.floor)])
            })
        }
        EdgeOperator::Emboss => {
            let gx = imageproc::gradients::horizontal_sobel(luminance);
            let gy = imageproc::gradients::vertical_sobel(luminance);
            GrayImage::from_fn(w, h, |x, y| {
                let slope = i32::from(gx.get_pixel(x, y).0[0]) + i32::from(gy.get_pixel(x, y).0[0]);
                Luma([clamp_ink(-slope / EMBOSS_DIVISOR)])
            })
        }
        EdgeOperator::Sketch => {
            let magnitude = imageproc::gradients::sobel_gradients(luminance);
            GrayImage::from_fn(w, h, |x, y| {
                let m = magnitude.get_pixel(x, y).0[0] / SKETCH_DIVISOR;
                Luma([u8::try_from(m).unwrap_or(u8::MAX)])
            })
        }
    }
}

/// Map edge intensity through the `[dark_cut, light_cut]` band.
///
/// - `e <= dark_cut`: background (0).
/// - `e >= light_cut`: full line strength (255).
/// - in between: linear ramp.
///
/// When `light_cut <= dark_cut` the band collapses into a hard threshold
/// at `dark_cut`. A pixel carries ink iff `e > dark_cut`, and its strength
/// never increases as `light_cut` rises.
#[must_use = "returns the line mask"]
#[allow(clippy::cast_possible_truncation)]
pub fn band_threshold(edges: &GrayImage, dark_cut: u8, light_cut: u8) -> GrayImage {
    let dark = u32::from(dark_cut);
    let light = u32::from(light_cut);
    let mut lut = [0u8; 256];
    for (e, slot) in (0u32..).zip(lut.iter_mut()) {
        *slot = if e <= dark {
            0
        } else if e >= light {
            255
        } else {
            let span = light - dark;
            (((e - dark) * 255 + span / 2) / span) as u8
        };
    }
    GrayImage::from_fn(edges.width(), edges.height(), |x, y| {
        Luma([lut[usize::from(edges.get_pixel(x, y).0[0])]])
    })
}

/// Run the whole stage: edge intensity, optional unsharp mask, then
/// band thresholding.
///
/// Returns `(edges, mask)` where `edges` is the intensity the threshold
/// saw (sharpened when `sharpen` is set).
#[must_use]
pub fn extract_lines(
    luminance: &GrayImage,
    quality: Quality,
    dark_cut: u8,
    light_cut: u8,
    sharpen: bool,
) -> (GrayImage, GrayImage) {
    let edges = crate::blur::sharpen(edge_intensity(luminance, quality), sharpen);
    let mask = band_threshold(&edges, dark_cut, light_cut);
    tracing::debug!(
        %quality,
        sharpen,
        dark_cut,
        light_cut,
        line_pixels = count_line_pixels(&mask),
        "extracted lines"
    );
    (edges, mask)
}

/// Number of pixels carrying any ink.
#[must_use]
pub fn count_line_pixels(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] > 0)).sum()
}

/// Summed ink strength over the whole mask.
#[must_use]
pub fn total_ink(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0])).sum()
}
