//! PNG serialization of the final canvas.

use image::ImageEncoder as _;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};

use crate::types::{Dimensions, EncodeFailure, PipelineError, RasterImage};

/// Encode an RGBA canvas as PNG (fast compression, adaptive filtering).
///
/// # Errors
///
/// Returns [`PipelineError::Encode`] when the pixel buffer length does
/// not match `width * height * 4`, or when the PNG encoder fails.
pub fn encode_png(canvas: &RasterImage) -> Result<Vec<u8>, PipelineError> {
    let dimensions = Dimensions::of(canvas);
    let expected = usize::try_from(dimensions.pixel_count())
        .ok()
        .and_then(|n| n.checked_mul(4))
        .unwrap_or(usize::MAX);
    let actual = canvas.as_raw().len();
    if actual != expected {
        tracing::error!(%dimensions, expected, actual, "pixel buffer length mismatch");
        return Err(EncodeFailure::BufferMismatch {
            dimensions,
            expected,
            actual,
        }
        .into());
    }

    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::Adaptive)
        .write_image(
            canvas.as_raw(),
            dimensions.width,
            dimensions.height,
            image::ExtendedColorType::Rgba8,
        )
        .map_err(EncodeFailure::from)?;
    tracing::debug!(%dimensions, output_bytes = out.len(), "encoded png");
    Ok(out)
}
