//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! [`process_staged_with_diagnostics`] drives the typed [`Pipeline`]
//! through every stage, timing each one with a caller-supplied
//! [`Clock`] and collecting the stage's [`StageMetrics`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{PipelineError, StagedResult};
use crate::watermark::{Placement, WatermarkStyle};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
///
/// Abstracted so native callers can use `std::time::Instant`, wasm
/// callers `web_time::Instant`, and tests a fixed clock.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Capture the current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`], which is
/// `std::time::Instant` on native targets and `performance.now()` on
/// wasm.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Instant = web_time::Instant;

    fn now(&self) -> Self::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Diagnostics collected from a single pipeline run.
///
/// Stages that the configuration can skip (shade, watermark) have
/// `Option` fields that are `None` when the stage did not run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    pub decode: StageDiagnostics,
    pub geometry: StageDiagnostics,
    pub lines: StageDiagnostics,
    /// `None` when `shade` is off or `quality` is `sketch`.
    pub shade: Option<StageDiagnostics>,
    pub kiss: StageDiagnostics,
    /// `None` when `watermark` is off.
    pub watermark: Option<StageDiagnostics>,
    pub encode: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    pub metrics: StageMetrics,
}

/// One intensity in the tone layer and how many pixels carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneLevel {
    pub value: u8,
    pub count: u64,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        width: u32,
        height: u32,
        pixel_count: u64,
    },
    /// Zoom and cover crop.
    Geometry {
        source_width: u32,
        source_height: u32,
        width: u32,
        height: u32,
        zoom: f64,
        cover: bool,
    },
    /// Line extraction.
    Lines {
        quality: String,
        denoise: bool,
        /// Brightness applied to the luminance map, in percent.
        light: i8,
        sharpen: bool,
        dark_cut: u8,
        light_cut: u8,
        /// Pixels carrying any ink.
        line_pixel_count: u64,
        /// Total pixel count for computing line density.
        total_pixel_count: u64,
    },
    /// Tone layer.
    Shade {
        tone_count: u8,
        shade_limit: u8,
        shade_light: u8,
        /// Whether a pencil texture was configured.
        textured: bool,
        /// Histogram of the tone layer, ascending by value.
        levels: Vec<ToneLevel>,
    },
    /// Colorization.
    Kiss { kiss: bool },
    /// Watermark compositing.
    Watermark {
        style: WatermarkStyle,
        /// `None` when no mark was drawn (missing or undecodable asset).
        placement: Option<Placement>,
    },
    /// PNG encoding. `input_bytes` is the size of the source upload.
    Encode {
        input_bytes: usize,
        output_bytes: usize,
    },
}

/// High-level summary for the entire run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub source_width: u32,
    pub source_height: u32,
    pub width: u32,
    pub height: u32,
    pub line_pixel_count: u64,
    pub output_bytes: usize,
}

/// Run the pipeline, timing every stage with `clock`.
///
/// # Errors
///
/// Returns [`PipelineError::Decode`] or [`PipelineError::Encode`] when
/// the corresponding stage fails. No fallback is applied here; see
/// [`crate::render`].
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let pending = Pipeline::new(image_bytes.to_vec(), config.clone());

    let t = clock.now();
    let decoded = pending.decode()?;
    let decode = timed(clock, &t, decoded.stage_metrics());

    let t = clock.now();
    let transformed = decoded.transform();
    let geometry = timed(clock, &t, transformed.stage_metrics());

    let t = clock.now();
    let lines_extracted = transformed.extract_lines();
    let lines = timed(clock, &t, lines_extracted.stage_metrics());

    let t = clock.now();
    let shaded = lines_extracted.shade();
    let shade_duration = clock.elapsed(&t);
    let shade = shaded.metrics().map(|metrics| StageDiagnostics {
        duration: shade_duration,
        metrics,
    });

    let t = clock.now();
    let colored = shaded.colorize();
    let kiss = timed(clock, &t, colored.stage_metrics());

    let t = clock.now();
    let watermarked = colored.watermark();
    let watermark_duration = clock.elapsed(&t);
    let watermark = watermarked.metrics().map(|metrics| StageDiagnostics {
        duration: watermark_duration,
        metrics,
    });

    let t = clock.now();
    let encoded = watermarked.encode()?;
    let encode = timed(clock, &t, encoded.stage_metrics());

    let staged = encoded.into_result();
    let total_duration = clock.elapsed(&start);

    let line_pixel_count = match &lines.metrics {
        StageMetrics::Lines {
            line_pixel_count, ..
        } => *line_pixel_count,
        _ => 0,
    };
    let summary = PipelineSummary {
        source_width: staged.original.width(),
        source_height: staged.original.height(),
        width: staged.output.width(),
        height: staged.output.height(),
        line_pixel_count,
        output_bytes: staged.png.len(),
    };

    Ok((
        staged,
        PipelineDiagnostics {
            decode,
            geometry,
            lines,
            shade,
            kiss,
            watermark,
            encode,
            total_duration,
            summary,
        },
    ))
}

fn timed<C: Clock>(clock: &C, since: &C::Instant, metrics: StageMetrics) -> StageDiagnostics {
    StageDiagnostics {
        duration: clock.elapsed(since),
        metrics,
    }
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} -> {}x{}",
            self.summary.source_width,
            self.summary.source_height,
            self.summary.width,
            self.summary.height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages = vec![
            ("Decode", &self.decode),
            ("Geometry", &self.geometry),
            ("Lines", &self.lines),
        ];
        if let Some(ref shade) = self.shade {
            stages.push(("Shade", shade));
        }
        stages.push(("Kiss", &self.kiss));
        if let Some(ref watermark) = self.watermark {
            stages.push(("Watermark", watermark));
        }
        stages.push(("Encode", &self.encode));

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Line pixels: {}  |  Output: {} bytes",
            self.summary.line_pixel_count, self.summary.output_bytes,
        ));

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Geometry {
            source_width,
            source_height,
            width,
            height,
            zoom,
            cover,
        } => {
            let crop = if *cover { " cover" } else { "" };
            format!("{source_width}x{source_height} -> {width}x{height} (zoom={zoom:.2}{crop})")
        }
        StageMetrics::Lines {
            quality,
            denoise,
            light,
            sharpen,
            dark_cut,
            light_cut,
            line_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *line_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            let denoise = if *denoise { " denoise" } else { "" };
            let sharpen = if *sharpen { " sharpen" } else { "" };
            format!(
                "{quality}{denoise}{sharpen} light={light:+}% cut={dark_cut}..{light_cut} \
                 lines={line_pixel_count} ({density:.1}%)",
            )
        }
        StageMetrics::Shade {
            tone_count,
            shade_limit,
            shade_light,
            textured,
            levels,
        } => {
            let texture = if *textured { " textured" } else { "" };
            format!(
                "{tone_count} tones over {shade_light}..{shade_limit}{texture}, {} levels",
                levels.len(),
            )
        }
        StageMetrics::Kiss { kiss } => format!("kiss={kiss}"),
        StageMetrics::Watermark { style, placement } => match placement {
            Some(p) => format!("{style:?} {}x{} at ({}, {})", p.width, p.height, p.x, p.y),
            None => format!("{style:?} skipped (no asset)"),
        },
        StageMetrics::Encode {
            input_bytes,
            output_bytes,
        } => format!("{input_bytes} -> {output_bytes} bytes"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::config::RawConfig;

    /// Clock that advances one millisecond on every reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get() + 1;
            self.0.set(t);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            let v = ((x + y) * 255 / (width + height)) as u8;
            image::Rgba([v, v, v, 255])
        });
        let mut buf = Vec::new();
        image::ImageEncoder::write_image(
            image::codecs::png::PngEncoder::new(&mut buf),
            img.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn collects_every_enabled_stage() {
        let clock = TickClock(Cell::new(0));
        let source = gradient_png(32, 24);
        let (staged, diag) =
            process_staged_with_diagnostics(&source, &PipelineConfig::default(), &clock).unwrap();
        assert_eq!(
            diag.encode.metrics,
            StageMetrics::Encode {
                input_bytes: source.len(),
                output_bytes: staged.png.len(),
            }
        );
        assert!(diag.shade.is_some());
        assert!(diag.watermark.is_some());
        assert_eq!(diag.summary.width, 32);
        assert_eq!(diag.summary.output_bytes, staged.png.len());
        assert!(diag.total_duration >= diag.decode.duration + diag.encode.duration);
        assert!(diag.decode.duration > Duration::ZERO);
    }

    #[test]
    fn skipped_stages_are_none() {
        let raw = RawConfig::from_json(r#"{"quality": "sketch", "watermark": false}"#).unwrap();
        let config = PipelineConfig::resolve(&raw).unwrap();
        let (_, diag) =
            process_staged_with_diagnostics(&gradient_png(16, 16), &config, &SystemClock).unwrap();
        assert!(diag.shade.is_none());
        assert!(diag.watermark.is_none());
    }

    #[test]
    fn decode_failure_propagates() {
        let result = process_staged_with_diagnostics(b"nope", &PipelineConfig::default(), &SystemClock);
        assert!(matches!(result, Err(PipelineError::Decode { .. })));
    }

    #[test]
    fn diagnostics_round_trip_through_json() {
        let (_, diag) = process_staged_with_diagnostics(
            &gradient_png(16, 16),
            &PipelineConfig::default(),
            &SystemClock,
        )
        .unwrap();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.lines.metrics, diag.lines.metrics);
        assert_eq!(back.summary.output_bytes, diag.summary.output_bytes);
    }

    #[test]
    fn report_lists_stages() {
        let (_, diag) = process_staged_with_diagnostics(
            &gradient_png(16, 16),
            &PipelineConfig::default(),
            &SystemClock,
        )
        .unwrap();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Lines"));
        assert!(report.contains("Shade"));
        assert!(report.contains("skipped (no asset)"));
    }
}
