//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the entire pipeline in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use oli_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let config = PipelineConfig::default();
//! let pipeline = Pipeline::new(png, config)
//!     .decode()?
//!     .transform()
//!     .extract_lines()
//!     .shade()
//!     .colorize()
//!     .watermark()
//!     .encode()?;
//!
//! let staged = pipeline.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying all previously computed
//! intermediates. The caller can inspect the current stage's output via
//! accessor methods at any point.
//!
//! # Memory
//!
//! Every stage retains the full raster stack computed so far. For a
//! 1000×1000 source this is roughly 20 MB pinned until
//! [`Encoded::into_result`] consumes the final stage. Callers that only
//! need the PNG bytes should prefer [`crate::process`].

use crate::config::PipelineConfig;
use crate::diagnostics::{StageMetrics, ToneLevel};
use crate::lines::count_line_pixels;
use crate::shade::{PencilTexture, ShadeParams};
use crate::types::{Dimensions, GrayImage, PipelineError, RgbaImage, StagedResult};
use crate::watermark::{Placement, WatermarkStyle};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Decode`] if the bytes are empty, not a
    /// recognized image, corrupt, or over the decoder limits.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let original = crate::decode::decode(&self.source)?;
        Ok(Decoded {
            config: self.config,
            source_len: self.source.len(),
            original,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding, with the source flattened onto white.
#[must_use = "pipeline stages are consumed by advancing — call .transform() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    source_len: usize,
    original: RgbaImage,
}

impl Decoded {
    /// Metrics describing the work done to reach this stage.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        let dimensions = Dimensions::of(&self.original);
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width: dimensions.width,
            height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
        }
    }

    /// The decoded RGBA image.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Apply zoom and the optional cover crop.
    pub fn transform(self) -> Transformed {
        let canvas = crate::geometry::transform(
            self.original.clone(),
            self.config.zoom(),
            self.config.cover(),
        );
        Transformed {
            config: self.config,
            source_len: self.source_len,
            original: self.original,
            canvas,
        }
    }
}

// ───────────────────────── Stage 2: Transformed ──────────────────────

/// Pipeline state after zoom and cover crop.
#[must_use = "pipeline stages are consumed by advancing — call .extract_lines() to continue"]
pub struct Transformed {
    config: PipelineConfig,
    source_len: usize,
    original: RgbaImage,
    canvas: RgbaImage,
}

impl Transformed {
    /// Metrics describing the work done to reach this stage.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Geometry {
            source_width: self.original.width(),
            source_height: self.original.height(),
            width: self.canvas.width(),
            height: self.canvas.height(),
            zoom: self.config.zoom(),
            cover: self.config.cover(),
        }
    }

    /// The working canvas.
    #[must_use]
    pub const fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Build the luminance map, apply `light`, and extract the line
    /// mask.
    pub fn extract_lines(self) -> LinesExtracted {
        let luminance = crate::blur::denoise(
            crate::grayscale::adjust_light(
                crate::grayscale::luminance(&self.canvas),
                self.config.light(),
            ),
            self.config.denoise(),
        );
        let (edges, lines) = crate::lines::extract_lines(
            &luminance,
            self.config.quality(),
            self.config.dark_cut(),
            self.config.light_cut(),
            self.config.sharpen(),
        );
        LinesExtracted {
            config: self.config,
            source_len: self.source_len,
            original: self.original,
            canvas: self.canvas,
            luminance,
            edges,
            lines,
        }
    }
}

// ───────────────────────── Stage 3: LinesExtracted ───────────────────

/// Pipeline state after line extraction.
#[must_use = "pipeline stages are consumed by advancing — call .shade() to continue"]
pub struct LinesExtracted {
    config: PipelineConfig,
    source_len: usize,
    original: RgbaImage,
    canvas: RgbaImage,
    luminance: GrayImage,
    edges: GrayImage,
    lines: GrayImage,
}

impl LinesExtracted {
    /// Metrics describing the work done to reach this stage.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Lines {
            quality: self.config.quality().to_string(),
            denoise: self.config.denoise(),
            light: self.config.light(),
            sharpen: self.config.sharpen(),
            dark_cut: self.config.dark_cut(),
            light_cut: self.config.light_cut(),
            line_pixel_count: count_line_pixels(&self.lines),
            total_pixel_count: Dimensions::of(&self.lines).pixel_count(),
        }
    }

    /// The luminance map after `light` and (optional) denoise.
    #[must_use]
    pub const fn luminance(&self) -> &GrayImage {
        &self.luminance
    }

    /// Raw edge intensity before thresholding.
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.edges
    }

    /// The line mask (255 = full ink).
    #[must_use]
    pub const fn lines(&self) -> &GrayImage {
        &self.lines
    }

    /// Build the tone layer (when enabled) and lay the lines over it.
    pub fn shade(self) -> Shaded {
        let tone = if self.config.shading_enabled() {
            let texture = self
                .config
                .pencil_texture()
                .and_then(PencilTexture::from_bytes);
            Some(crate::shade::tone_layer(
                &self.luminance,
                shade_params(&self.config),
                texture.as_ref(),
            ))
        } else {
            None
        };
        let composite = crate::shade::composite(&self.lines, tone.as_ref());
        Shaded {
            config: self.config,
            source_len: self.source_len,
            original: self.original,
            canvas: self.canvas,
            luminance: self.luminance,
            edges: self.edges,
            lines: self.lines,
            tone,
            composite,
        }
    }
}

pub(crate) const fn shade_params(config: &PipelineConfig) -> ShadeParams {
    ShadeParams {
        limit: config.shade_limit(),
        light: config.shade_light(),
        tone_count: config.tone_count(),
    }
}

// ───────────────────────── Stage 4: Shaded ───────────────────────────

/// Pipeline state after shading and line compositing.
#[must_use = "pipeline stages are consumed by advancing — call .colorize() to continue"]
pub struct Shaded {
    config: PipelineConfig,
    source_len: usize,
    original: RgbaImage,
    canvas: RgbaImage,
    luminance: GrayImage,
    edges: GrayImage,
    lines: GrayImage,
    tone: Option<GrayImage>,
    composite: GrayImage,
}

impl Shaded {
    /// The tone layer, or `None` if shading was skipped.
    #[must_use]
    pub const fn tone(&self) -> Option<&GrayImage> {
        self.tone.as_ref()
    }

    /// Lines laid over the tone layer.
    #[must_use]
    pub const fn composite(&self) -> &GrayImage {
        &self.composite
    }

    /// Apply the kiss gradient (when enabled).
    pub fn colorize(self) -> Colored {
        let colored = crate::kiss::colorize(&self.composite, self.config.kiss());
        Colored {
            config: self.config,
            source_len: self.source_len,
            original: self.original,
            canvas: self.canvas,
            luminance: self.luminance,
            edges: self.edges,
            lines: self.lines,
            tone: self.tone,
            composite: self.composite,
            colored,
        }
    }
}

// ───────────────────────── Stage 5: Colored ──────────────────────────

/// Pipeline state after colorization.
#[must_use = "pipeline stages are consumed by advancing — call .watermark() to continue"]
pub struct Colored {
    config: PipelineConfig,
    source_len: usize,
    original: RgbaImage,
    canvas: RgbaImage,
    luminance: GrayImage,
    edges: GrayImage,
    lines: GrayImage,
    tone: Option<GrayImage>,
    composite: GrayImage,
    colored: RgbaImage,
}

impl Colored {
    /// Metrics describing the work done to reach this stage.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Kiss {
            kiss: self.config.kiss(),
        }
    }

    /// The colorized canvas.
    #[must_use]
    pub const fn colored(&self) -> &RgbaImage {
        &self.colored
    }

    /// Composite the watermark (when enabled and an asset is present).
    pub fn watermark(self) -> Watermarked {
        let mut output = self.colored.clone();
        let placement = if self.config.watermark() {
            crate::watermark::watermark_stage(
                &mut output,
                self.config.watermark_image(),
                WatermarkStyle::from_hajimei(self.config.hajimei()),
            )
        } else {
            None
        };
        Watermarked {
            config: self.config,
            source_len: self.source_len,
            original: self.original,
            canvas: self.canvas,
            luminance: self.luminance,
            edges: self.edges,
            lines: self.lines,
            tone: self.tone,
            composite: self.composite,
            colored: self.colored,
            output,
            placement,
        }
    }
}

// ───────────────────────── Stage 6: Watermarked ──────────────────────

/// Pipeline state after watermarking: the final canvas.
#[must_use = "pipeline stages are consumed by advancing — call .encode() to continue"]
pub struct Watermarked {
    config: PipelineConfig,
    source_len: usize,
    original: RgbaImage,
    canvas: RgbaImage,
    luminance: GrayImage,
    edges: GrayImage,
    lines: GrayImage,
    tone: Option<GrayImage>,
    composite: GrayImage,
    colored: RgbaImage,
    output: RgbaImage,
    placement: Option<Placement>,
}

impl Watermarked {
    /// The final canvas.
    #[must_use]
    pub const fn marked(&self) -> &RgbaImage {
        &self.output
    }

    /// Where the mark landed, if one was drawn.
    #[must_use]
    pub const fn placement(&self) -> Option<Placement> {
        self.placement
    }

    /// Serialize the final canvas as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Encode`] if the PNG encoder fails.
    pub fn encode(self) -> Result<Encoded, PipelineError> {
        let png = crate::encode::encode_png(&self.output)?;
        Ok(Encoded {
            source_len: self.source_len,
            original: self.original,
            canvas: self.canvas,
            luminance: self.luminance,
            edges: self.edges,
            lines: self.lines,
            tone: self.tone,
            composite: self.composite,
            colored: self.colored,
            output: self.output,
            png,
        })
    }
}

// ───────────────────────── Stage 7: Encoded ──────────────────────────

/// Pipeline state after encoding: the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`] containing all intermediates.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Encoded {
    source_len: usize,
    original: RgbaImage,
    canvas: RgbaImage,
    luminance: GrayImage,
    edges: GrayImage,
    lines: GrayImage,
    tone: Option<GrayImage>,
    composite: GrayImage,
    colored: RgbaImage,
    output: RgbaImage,
    png: Vec<u8>,
}

impl Encoded {
    /// Metrics describing the work done to reach this stage.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Encode {
            input_bytes: self.source_len,
            output_bytes: self.png.len(),
        }
    }

    /// The encoded PNG bytes.
    #[must_use]
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Dimensions of the processed canvas.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.output)
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            original: self.original,
            canvas: self.canvas,
            luminance: self.luminance,
            edges: self.edges,
            lines: self.lines,
            tone: self.tone,
            composite: self.composite,
            colored: self.colored,
            output: self.output,
            png: self.png,
        }
    }
}

// ──────────────────── PipelineStage trait + state enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 8;

/// The output produced by a single pipeline stage.
///
/// Each variant borrows the data that the corresponding stage computed.
#[must_use]
pub enum StageOutput<'a> {
    /// Source image bytes (not yet decoded).
    Source { bytes: &'a [u8] },
    /// Decoded RGBA image.
    Decoded { original: &'a RgbaImage },
    /// Canvas after zoom and cover crop.
    Transformed { canvas: &'a RgbaImage },
    /// Luminance, edge intensity, and line mask.
    LinesExtracted {
        luminance: &'a GrayImage,
        edges: &'a GrayImage,
        lines: &'a GrayImage,
    },
    /// Tone layer (if shading ran) and the line composite.
    Shaded {
        tone: Option<&'a GrayImage>,
        composite: &'a GrayImage,
    },
    /// Colorized canvas.
    Colored { colored: &'a RgbaImage },
    /// Final canvas and the watermark placement.
    Watermarked {
        output: &'a RgbaImage,
        placement: Option<Placement>,
    },
    /// Encoded PNG bytes.
    Encoded { png: &'a [u8] },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Each stage struct implements it, and [`PipelineState`] delegates to
/// whichever variant it holds.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"lines"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `7` for
    /// Encoded).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for [`Pending`] and for optional stages that were
    /// skipped by the configuration.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(state))` on success, `Ok(None)` if already at
    /// the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Decode`] or [`PipelineError::Encode`]
    /// when the corresponding transition fails.
    fn next(self) -> Result<Option<PipelineState>, PipelineError>;

    /// Run all remaining stages and return the final [`StagedResult`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            bytes: &self.source,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<PipelineState>, PipelineError> {
        Ok(Some(PipelineState::Decoded(self.decode()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.decode()?.complete()
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Decoded {
            original: &self.original,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<PipelineState>, PipelineError> {
        Ok(Some(PipelineState::Transformed(self.transform())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.transform().complete()
    }
}

impl PipelineStage for Transformed {
    const NAME: &str = "geometry";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Transformed {
            canvas: &self.canvas,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<PipelineState>, PipelineError> {
        Ok(Some(PipelineState::LinesExtracted(self.extract_lines())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.extract_lines().complete()
    }
}

impl PipelineStage for LinesExtracted {
    const NAME: &str = "lines";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::LinesExtracted {
            luminance: &self.luminance,
            edges: &self.edges,
            lines: &self.lines,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<PipelineState>, PipelineError> {
        Ok(Some(PipelineState::Shaded(self.shade())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.shade().complete()
    }
}

impl PipelineStage for Shaded {
    const NAME: &str = "shade";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Shaded {
            tone: self.tone.as_ref(),
            composite: &self.composite,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        let tone = self.tone.as_ref()?;
        Some(StageMetrics::Shade {
            tone_count: self.config.tone_count(),
            shade_limit: self.config.shade_limit(),
            shade_light: self.config.shade_light(),
            textured: self.config.pencil_texture().is_some(),
            levels: crate::shade::histogram(tone)
                .into_iter()
                .map(|(value, count)| ToneLevel { value, count })
                .collect(),
        })
    }

    fn next(self) -> Result<Option<PipelineState>, PipelineError> {
        Ok(Some(PipelineState::Colored(self.colorize())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.colorize().complete()
    }
}

impl PipelineStage for Colored {
    const NAME: &str = "kiss";
    const INDEX: usize = 5;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Colored {
            colored: &self.colored,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<PipelineState>, PipelineError> {
        Ok(Some(PipelineState::Watermarked(self.watermark())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.watermark().complete()
    }
}

impl PipelineStage for Watermarked {
    const NAME: &str = "watermark";
    const INDEX: usize = 6;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Watermarked {
            output: &self.output,
            placement: self.placement,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        self.config.watermark().then(|| StageMetrics::Watermark {
            style: WatermarkStyle::from_hajimei(self.config.hajimei()),
            placement: self.placement,
        })
    }

    fn next(self) -> Result<Option<PipelineState>, PipelineError> {
        Ok(Some(PipelineState::Encoded(self.encode()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.encode()?.complete()
    }
}

impl PipelineStage for Encoded {
    const NAME: &str = "encode";
    const INDEX: usize = 7;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Encoded { png: &self.png }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<PipelineState>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// ```rust
/// # use oli_pipeline::{Pipeline, PipelineConfig, PipelineError};
/// # use oli_pipeline::pipeline::{Advance, PipelineState};
/// # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
/// let mut state: PipelineState = Pipeline::new(png, PipelineConfig::default()).into();
/// loop {
///     match state.advance()? {
///         Advance::Next(next) => state = next,
///         Advance::Complete(done) => { state = done; break; }
///     }
/// }
/// let result = state.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum PipelineState {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Decoded`].
    Decoded(Decoded),
    /// See [`Transformed`].
    Transformed(Transformed),
    /// See [`LinesExtracted`].
    LinesExtracted(LinesExtracted),
    /// See [`Shaded`].
    Shaded(Shaded),
    /// See [`Colored`].
    Colored(Colored),
    /// See [`Watermarked`].
    Watermarked(Watermarked),
    /// See [`Encoded`].
    Encoded(Encoded),
}

/// Compile-time guard: adding a [`PipelineState`] variant makes this
/// match non-exhaustive, a reminder to bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &PipelineState) {
    match s {
        PipelineState::Pending(_)
        | PipelineState::Decoded(_)
        | PipelineState::Transformed(_)
        | PipelineState::LinesExtracted(_)
        | PipelineState::Shaded(_)
        | PipelineState::Colored(_)
        | PipelineState::Watermarked(_)
        | PipelineState::Encoded(_) => {}
    }
}

/// Result of [`PipelineState::advance`]: either the next state or the
/// final state returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next state.
    Next(PipelineState),
    /// The pipeline was already at the final stage.
    Complete(PipelineState),
}

/// Delegate a method call to whichever variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Decoded(s) => s.$method($($arg),*),
            Self::Transformed(s) => s.$method($($arg),*),
            Self::LinesExtracted(s) => s.$method($($arg),*),
            Self::Shaded(s) => s.$method($($arg),*),
            Self::Colored(s) => s.$method($($arg),*),
            Self::Watermarked(s) => s.$method($($arg),*),
            Self::Encoded(s) => s.$method($($arg),*),
        }
    };
}

impl PipelineState {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output the current stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Encoded(_))
    }

    /// Advance to the next stage; `Ok(None)` once the final stage has
    /// been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if already
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-final stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// `PipelineStage`'s associated constants are not callable as methods, so
// the delegate macro goes through this helper.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

macro_rules! impl_from_stage {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for PipelineState {
                fn from(s: $variant) -> Self {
                    Self::$variant(s)
                }
            }
        )*
    };
}

impl_from_stage!(
    Pending,
    Decoded,
    Transformed,
    LinesExtracted,
    Shaded,
    Colored,
    Watermarked,
    Encoded,
);

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental image processing pipeline.
///
/// Created via [`Pipeline::new`], which stores the source image and
/// config without doing any processing. Each stage method consumes the
/// current state and returns the next, so skipping a stage or running
/// stages out of order is a compile-time error.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }
}
