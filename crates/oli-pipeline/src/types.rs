//! Shared types for the oli line-art pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// single-channel intermediates (luminance, line mask, tone layer)
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// decoded and composited canvases without depending on `image` directly.
pub use image::RgbaImage;

/// The pipeline's working pixel buffer: owned, 4 channels, 8 bits each.
///
/// `image::RgbaImage` already guarantees
/// `buffer.len() >= width * height * 4`; the encoder re-checks the exact
/// length before serializing.
pub type RasterImage = RgbaImage;

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pipeline stage names, carried by every [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// Configuration resolution.
    Config,
    /// Image decoding.
    Decode,
    /// Zoom and cover crop.
    Geometry,
    /// Luminance and edge analysis.
    Lines,
    /// Posterized tone layer.
    Shade,
    /// Color gradient wash and final brightness.
    Kiss,
    /// Logo compositing.
    Watermark,
    /// PNG serialization.
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Config => "config",
            Self::Decode => "decode",
            Self::Geometry => "geometry",
            Self::Lines => "lines",
            Self::Shade => "shade",
            Self::Kiss => "kiss",
            Self::Watermark => "watermark",
            Self::Encode => "encode",
        })
    }
}

/// Why the decoder rejected a byte buffer.
#[derive(Debug, thiserror::Error)]
pub enum DecodeFailure {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    Empty,

    /// The bytes are not a recognized image container, are corrupt, or
    /// exceed the decoder limits.
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Why the encoder refused to serialize a buffer.
#[derive(Debug, thiserror::Error)]
pub enum EncodeFailure {
    /// The pixel buffer length does not match `width * height * 4`.
    #[error("pixel buffer holds {actual} bytes, expected {expected} for {dimensions}")]
    BufferMismatch {
        /// Canvas dimensions the buffer claims.
        dimensions: Dimensions,
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        actual: usize,
    },

    /// The PNG encoder itself failed.
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Errors that can occur during pipeline processing.
///
/// Every variant records the [`Stage`] that produced it. Only
/// [`PipelineError::Config`] is surfaced to callers of
/// [`render_with`](crate::render_with); decode and encode failures are
/// absorbed by the fallback-to-original policy in [`render`](crate::render).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The configuration map is structurally invalid.
    #[error("{stage}: invalid configuration: {reason}")]
    Config {
        /// Stage that rejected the configuration.
        stage: Stage,
        /// Human-readable description of the problem.
        reason: String,
    },

    /// The input bytes could not be decoded into an image.
    #[error("{stage}: failed to decode image: {source}")]
    Decode {
        /// Stage that attempted the decode.
        stage: Stage,
        /// Underlying cause.
        #[source]
        source: DecodeFailure,
    },

    /// The final buffer could not be serialized.
    #[error("{stage}: failed to encode image: {source}")]
    Encode {
        /// Stage that attempted the encode.
        stage: Stage,
        /// Underlying cause.
        #[source]
        source: EncodeFailure,
    },
}

impl PipelineError {
    /// Build a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            stage: Stage::Config,
            reason: reason.into(),
        }
    }

    /// The stage that produced this error.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Config { stage, .. } | Self::Decode { stage, .. } | Self::Encode { stage, .. } => {
                *stage
            }
        }
    }

    /// Whether the orchestrator should answer this error with the
    /// original input bytes.
    #[must_use]
    pub const fn falls_back(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Encode { .. })
    }
}

impl From<DecodeFailure> for PipelineError {
    fn from(source: DecodeFailure) -> Self {
        Self::Decode {
            stage: Stage::Decode,
            source,
        }
    }
}

impl From<EncodeFailure> for PipelineError {
    fn from(source: EncodeFailure) -> Self {
        Self::Encode {
            stage: Stage::Encode,
            source,
        }
    }
}

/// Result of running the pipeline with every intermediate preserved.
///
/// Each field captures the output of one logical stage, so callers can
/// inspect or preview any step of the chain.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Decoded source image, flattened onto white.
    pub original: RgbaImage,
    /// Canvas after zoom and optional cover crop.
    pub canvas: RgbaImage,
    /// Luminance map (denoised when enabled).
    pub luminance: GrayImage,
    /// Raw per-pixel edge intensity before band thresholding.
    pub edges: GrayImage,
    /// Line mask after band thresholding (255 = full ink).
    pub lines: GrayImage,
    /// Posterized tone layer (`Some` only when shading ran).
    pub tone: Option<GrayImage>,
    /// Line + tone composite before colorization.
    pub composite: GrayImage,
    /// Colorized canvas (kiss + light) before watermarking.
    pub colored: RgbaImage,
    /// Final canvas handed to the encoder.
    pub output: RgbaImage,
    /// Encoded PNG bytes of `output`.
    pub png: Vec<u8>,
}

impl StagedResult {
    /// Dimensions of the processed canvas.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.output)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn dimensions_display() {
        let d = Dimensions {
            width: 640,
            height: 480,
        };
        assert_eq!(d.to_string(), "640x480");
        assert_eq!(d.pixel_count(), 307_200);
    }

    #[test]
    fn dimensions_of_buffer() {
        let img = GrayImage::new(17, 31);
        assert_eq!(
            Dimensions::of(&img),
            Dimensions {
                width: 17,
                height: 31
            }
        );
    }

    #[test]
    fn stage_names_are_lowercase() {
        assert_eq!(Stage::Decode.to_string(), "decode");
        assert_eq!(Stage::Watermark.to_string(), "watermark");
    }

    #[test]
    fn config_error_display_names_stage() {
        let err = PipelineError::config("unknown quality `ultra`");
        assert_eq!(
            err.to_string(),
            "config: invalid configuration: unknown quality `ultra`",
        );
        assert_eq!(err.stage(), Stage::Config);
        assert!(!err.falls_back());
    }

    #[test]
    fn decode_error_carries_source() {
        let err = PipelineError::from(DecodeFailure::Empty);
        assert_eq!(err.stage(), Stage::Decode);
        assert!(err.falls_back());
        assert_eq!(
            err.to_string(),
            "decode: failed to decode image: input image data is empty",
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn encode_error_display() {
        let err = PipelineError::from(EncodeFailure::BufferMismatch {
            dimensions: Dimensions {
                width: 2,
                height: 2,
            },
            expected: 16,
            actual: 12,
        });
        assert_eq!(err.stage(), Stage::Encode);
        assert!(err.falls_back());
        assert!(err.to_string().contains("expected 16 for 2x2"));
    }
}
