//! Posterized tone layer.
//!
//! Quantizes the luminance map into `tone_count` flat gray bands between
//! `shade_light` and `shade_limit`. Pixels at or above `shade_limit` stay
//! paper white; pixels at or below `shade_light` fall into the darkest
//! band. An optional pencil texture modulates each band with tiled grain
//! so flat tones read as hatching.
//!
//! The tone layer sits under the line mask: see [`composite`].

use image::{GrayImage, Luma};

use crate::decode::decode_dynamic;

/// Paper white: the tone of pixels outside every band.
pub const PAPER: u8 = 255;

/// Gray of the darkest band.
pub const DARKEST_TONE: u8 = 96;

/// Gray of the lightest band.
pub const LIGHTEST_TONE: u8 = 224;

/// Band geometry for [`tone_layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadeParams {
    /// Luminance at or above which no tone is laid.
    pub limit: u8,
    /// Luminance at or below which the darkest band is laid.
    pub light: u8,
    /// Number of bands, at least 1.
    pub tone_count: u8,
}

/// Band index for luminance `value`, or `None` for paper white.
///
/// Band 0 is the darkest. When `limit <= light` the range collapses and
/// everything below `limit` lands in band 0.
#[must_use]
pub fn band_index(value: u8, params: ShadeParams) -> Option<u8> {
    let ShadeParams {
        limit,
        light,
        tone_count,
    } = params;
    if value >= limit {
        return None;
    }
    if value <= light || limit <= light {
        return Some(0);
    }
    let count = u32::from(tone_count.max(1));
    let offset = u32::from(value - light);
    let span = u32::from(limit - light);
    let band = (offset * count / span).min(count - 1);
    u8::try_from(band).ok()
}

/// Gray value of each band, darkest first.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn tone_palette(tone_count: u8) -> Vec<u8> {
    let count = u32::from(tone_count.max(1));
    let steps = (count - 1).max(1);
    let range = u32::from(LIGHTEST_TONE - DARKEST_TONE);
    (0..count)
        .map(|i| (u32::from(DARKEST_TONE) + range * i / steps) as u8)
        .collect()
}

/// Tiled grain used to emulate pencil hatching.
#[derive(Debug, Clone)]
pub struct PencilTexture {
    grain: GrayImage,
    mean_darkness: f32,
}

impl PencilTexture {
    /// Build a texture from a grayscale grain image.
    ///
    /// Returns `None` for an empty or entirely white grain, which could
    /// not modulate anything.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(grain: GrayImage) -> Option<Self> {
        let count = u64::from(grain.width()) * u64::from(grain.height());
        if count == 0 {
            return None;
        }
        let darkness: u64 = grain.pixels().map(|p| u64::from(PAPER - p.0[0])).sum();
        let mean_darkness = darkness as f32 / count as f32;
        if mean_darkness < 1.0 {
            return None;
        }
        Some(Self {
            grain,
            mean_darkness,
        })
    }

    /// Decode texture bytes (any format the decoder accepts).
    ///
    /// Undecodable or blank textures yield `None` with a warning; the
    /// caller falls back to flat tones.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match decode_dynamic(bytes) {
            Ok(image) => {
                let texture = Self::new(image.to_luma8());
                if texture.is_none() {
                    tracing::warn!("pencil texture is blank, using flat tones");
                }
                texture
            }
            Err(e) => {
                tracing::warn!(error = %e, "pencil texture failed to decode, using flat tones");
                None
            }
        }
    }

    /// Modulate `tone` at canvas position `(x, y)`.
    ///
    /// The grain's darkness relative to its own mean scales the band's
    /// darkness, so a band keeps its average gray.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn modulate(&self, tone: u8, x: u32, y: u32) -> u8 {
        let grain = self
            .grain
            .get_pixel(x % self.grain.width(), y % self.grain.height())
            .0[0];
        let weight = f32::from(PAPER - grain) / self.mean_darkness;
        let darkness = f32::from(PAPER - tone) * weight;
        (f32::from(PAPER) - darkness).round().clamp(0.0, 255.0) as u8
    }
}

/// Build the tone layer for a luminance map.
///
/// Pixels outside every band are [`PAPER`].
#[must_use = "returns the tone layer"]
pub fn tone_layer(
    luminance: &GrayImage,
    params: ShadeParams,
    texture: Option<&PencilTexture>,
) -> GrayImage {
    let palette = tone_palette(params.tone_count);
    let layer = GrayImage::from_fn(luminance.width(), luminance.height(), |x, y| {
        let value = luminance.get_pixel(x, y).0[0];
        let tone = band_index(value, params).map_or(PAPER, |band| palette[usize::from(band)]);
        match texture {
            Some(t) if tone != PAPER => Luma([t.modulate(tone, x, y)]),
            _ => Luma([tone]),
        }
    });
    tracing::debug!(
        limit = params.limit,
        light = params.light,
        tone_count = params.tone_count,
        textured = texture.is_some(),
        "built tone layer"
    );
    layer
}

/// Lay the line mask over a tone layer: `out = base * (1 - ink)`.
///
/// Without a tone layer the base is paper white, which gives plain
/// inverted line art.
#[must_use = "returns the composite"]
#[allow(clippy::cast_possible_truncation)]
pub fn composite(lines: &GrayImage, tone: Option<&GrayImage>) -> GrayImage {
    GrayImage::from_fn(lines.width(), lines.height(), |x, y| {
        let ink = u32::from(lines.get_pixel(x, y).0[0]);
        let base = tone.map_or(u32::from(PAPER), |t| u32::from(t.get_pixel(x, y).0[0]));
        Luma([((base * (255 - ink) + 127) / 255) as u8])
    })
}

/// Distinct intensities in a layer with their pixel counts, ascending.
#[must_use]
pub fn histogram(layer: &GrayImage) -> Vec<(u8, u64)> {
    let mut counts = [0u64; 256];
    for p in layer.pixels() {
        counts[usize::from(p.0[0])] += 1;
    }
    (0u8..=255)
        .zip(counts)
        .filter(|&(_, n)| n > 0)
        .collect()
}
