//! oli-pipeline: Pure line-art image pipeline (sans-IO).
//!
//! Turns a raster photograph into a stylized illustration through:
//! decode -> zoom/cover -> luminance + brightness -> line extraction
//! -> optional shading -> optional kiss gradient -> optional watermark
//! -> PNG.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! byte slices and returns bytes. All filesystem interaction lives in
//! `oli-cli`.
//!
//! Three entry points cover different callers:
//!
//! - [`process`] runs the pipeline and surfaces every error.
//! - [`process_staged`] does the same but keeps every intermediate.
//! - [`render`] / [`render_with`] / [`render_json`] never fail on bad
//!   pixels: when the input cannot be decoded or the result cannot be
//!   encoded they hand back the original bytes unchanged.

pub mod blur;
pub mod config;
pub mod decode;
pub mod diagnostics;
pub mod encode;
pub mod geometry;
pub mod grayscale;
pub mod kiss;
pub mod lines;
pub mod pipeline;
pub mod shade;
pub mod types;
pub mod watermark;

pub use config::{PipelineConfig, Quality, RawConfig};
pub use decode::detect_mime;
pub use pipeline::Pipeline;
pub use types::{
    DecodeFailure, Dimensions, EncodeFailure, GrayImage, PipelineError, RasterImage, RgbaImage,
    Stage, StagedResult,
};
pub use watermark::WatermarkStyle;

/// Run the full pipeline and return PNG bytes.
///
/// # Pipeline steps
///
/// 1. Decode and flatten onto white
/// 2. Zoom, then optional cover crop
/// 3. Luminance map, `light` adjustment, optional denoise
/// 4. Edge intensity and band threshold
/// 5. Optional tone layer, lines composited over it
/// 6. Optional kiss gradient
/// 7. Optional watermark
/// 8. PNG encode
///
/// # Errors
///
/// Returns [`PipelineError::Decode`] if the input is empty or not a
/// decodable image, and [`PipelineError::Encode`] if serialization fails.
pub fn process(image_bytes: &[u8], config: &PipelineConfig) -> Result<Vec<u8>, PipelineError> {
    // 1. Decode.
    let original = decode::decode(image_bytes)?;

    // 2. Zoom and cover crop.
    let canvas = geometry::transform(original, config.zoom(), config.cover());

    // 3. Luminance, brightness (and denoise).
    let luminance = blur::denoise(
        grayscale::adjust_light(grayscale::luminance(&canvas), config.light()),
        config.denoise(),
    );
    drop(canvas);

    // 4. Line extraction.
    let (_, lines) = lines::extract_lines(
        &luminance,
        config.quality(),
        config.dark_cut(),
        config.light_cut(),
        config.sharpen(),
    );

    // 5. Shading.
    let tone = config.shading_enabled().then(|| {
        let texture = config
            .pencil_texture()
            .and_then(shade::PencilTexture::from_bytes);
        shade::tone_layer(
            &luminance,
            pipeline::shade_params(config),
            texture.as_ref(),
        )
    });
    let composite = shade::composite(&lines, tone.as_ref());

    // 6. Kiss.
    let mut output = kiss::colorize(&composite, config.kiss());

    // 7. Watermark.
    if config.watermark() {
        watermark::watermark_stage(
            &mut output,
            config.watermark_image(),
            WatermarkStyle::from_hajimei(config.hajimei()),
        );
    }

    // 8. Encode.
    encode::encode_png(&output)
}

/// Run the full pipeline, keeping every intermediate.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .transform()
        .extract_lines()
        .shade()
        .colorize()
        .watermark()
        .encode()?
        .into_result())
}

/// Run the pipeline, answering any decode or encode failure with the
/// original bytes.
///
/// The result is always either a PNG of the processed image or an exact
/// copy of `image_bytes`.
#[must_use]
pub fn render(image_bytes: &[u8], config: &PipelineConfig) -> Vec<u8> {
    match process(image_bytes, config) {
        Ok(png) => png,
        Err(e) => {
            match &e {
                PipelineError::Encode { .. } => {
                    tracing::error!(error = %e, "encoder rejected final canvas, returning original");
                }
                _ => tracing::warn!(error = %e, "returning original image"),
            }
            image_bytes.to_vec()
        }
    }
}

/// Resolve a sparse configuration map, then [`render`].
///
/// # Errors
///
/// Returns [`PipelineError::Config`] if the map is structurally invalid.
/// Configuration is validated before any pixel work.
pub fn render_with(image_bytes: &[u8], raw: &RawConfig) -> Result<Vec<u8>, PipelineError> {
    let config = PipelineConfig::resolve(raw)?;
    Ok(render(image_bytes, &config))
}

/// Parse a JSON configuration document (or none), then [`render`].
///
/// # Errors
///
/// Returns [`PipelineError::Config`] for malformed JSON or an invalid
/// configuration.
pub fn render_json(image_bytes: &[u8], json: Option<&str>) -> Result<Vec<u8>, PipelineError> {
    let config = PipelineConfig::from_json(json)?;
    Ok(render(image_bytes, &config))
}
