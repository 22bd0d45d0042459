//! Image decoding.
//!
//! Accepts raw image bytes in any format the enabled `image` codecs
//! understand (PNG, JPEG, BMP, WebP, GIF), guessing the container from
//! its content. This is the first step in the pipeline: raw bytes in,
//! opaque [`RasterImage`] out.
//!
//! Decoding runs under [`image::Limits`] so an oversized or hostile
//! attachment fails with a decode error instead of exhausting memory.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageReader, Limits, Rgba};

use crate::types::{DecodeFailure, PipelineError, RasterImage};

/// Largest accepted width or height, in pixels.
pub const MAX_DIMENSION: u32 = 16_384;

/// Upper bound on decoder allocations (1 GiB).
pub const MAX_ALLOC_BYTES: u64 = 1 << 30;

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DIMENSION);
    limits.max_image_height = Some(MAX_DIMENSION);
    limits.max_alloc = Some(MAX_ALLOC_BYTES);
    limits
}

/// Decode raw bytes into a [`DynamicImage`] under the decoder limits.
///
/// Shared by the source decoder and the asset loaders (watermark, pencil
/// texture), which treat failure as "asset absent".
///
/// # Errors
///
/// Returns [`DecodeFailure::Empty`] for empty input and
/// [`DecodeFailure::Image`] when the format is unrecognized, the data is
/// corrupt, or the image exceeds the limits.
pub fn decode_dynamic(bytes: &[u8]) -> Result<DynamicImage, DecodeFailure> {
    if bytes.is_empty() {
        return Err(DecodeFailure::Empty);
    }

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::from)?;
    reader.limits(decode_limits());
    Ok(reader.decode()?)
}

/// Decode raw image bytes into an opaque RGBA canvas.
///
/// Transparent and translucent pixels are flattened onto white paper so
/// that transparency never reads as dark ink downstream.
///
/// # Errors
///
/// Returns [`PipelineError::Decode`] if the bytes are empty, not a
/// recognized image, corrupt, or over the size limits.
pub fn decode(bytes: &[u8]) -> Result<RasterImage, PipelineError> {
    let image = decode_dynamic(bytes)?;
    let mut rgba = image.to_rgba8();
    flatten_onto_paper(&mut rgba);
    tracing::debug!(
        input_bytes = bytes.len(),
        width = rgba.width(),
        height = rgba.height(),
        "decoded source image"
    );
    Ok(rgba)
}

/// Composite every pixel over opaque white in place.
#[allow(clippy::cast_possible_truncation)]
pub fn flatten_onto_paper(image: &mut RasterImage) {
    for pixel in image.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        if a == u8::MAX {
            continue;
        }
        let alpha = u32::from(a);
        let over = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        *pixel = Rgba([over(r), over(g), over(b), u8::MAX]);
    }
}

/// Map the guessed container format of `bytes` to a MIME type.
///
/// Unknown or unrecognizable data maps to `application/octet-stream`.
#[must_use]
pub fn detect_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Ico) => "image/x-icon",
        Ok(ImageFormat::Tiff) => "image/tiff",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Avif) => "image/avif",
        _ => "application/octet-stream",
    }
}
