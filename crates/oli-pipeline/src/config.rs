//! Configuration resolution.
//!
//! Callers hand the pipeline a sparse [`RawConfig`] (usually parsed from
//! JSON). [`PipelineConfig::resolve`] fills in every default and clamps
//! every numeric field into its domain, so the rest of the pipeline only
//! ever sees valid values. The only hard failures are structural: an
//! unknown `quality` name or a malformed JSON document.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Line-extraction mode.
///
/// The five density modes share one algorithm with growing kernels;
/// `Emboss` and `Sketch` are separate variants (see [`crate::lines`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Quality {
    /// Small kernel, high sensitivity: dense thin lines.
    Fine,
    /// Reference density.
    #[default]
    Normal,
    /// Larger kernel, sparser lines.
    Coarse,
    /// Larger still.
    SuperCoarse,
    /// Largest kernel, most abstracted lines.
    ExtraCoarse,
    /// Directional relief instead of outlines.
    Emboss,
    /// Pure outlines; disables shading.
    Sketch,
}

impl Quality {
    /// Every mode, in wire order.
    pub const ALL: [Self; 7] = [
        Self::Fine,
        Self::Normal,
        Self::Coarse,
        Self::SuperCoarse,
        Self::ExtraCoarse,
        Self::Emboss,
        Self::Sketch,
    ];

    /// The name used in configuration maps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fine => "fine",
            Self::Normal => "normal",
            Self::Coarse => "coarse",
            Self::SuperCoarse => "superCoarse",
            Self::ExtraCoarse => "extraCoarse",
            Self::Emboss => "emboss",
            Self::Sketch => "sketch",
        }
    }

    /// Whether this mode allows the shading stage to run.
    #[must_use]
    pub const fn allows_shading(self) -> bool {
        !matches!(self, Self::Sketch)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| {
                PipelineError::config(format!(
                    "unknown quality `{s}` (expected one of fine, normal, coarse, \
                     superCoarse, extraCoarse, emboss, sketch)"
                ))
            })
    }
}

/// Sparse, unvalidated configuration map.
///
/// Every field is optional. Field names are camelCase (`lightCut`);
/// the snake_case spelling (`light_cut`) is accepted as an alias. When a
/// JSON document passed to [`RawConfig::from_json`] carries both
/// spellings, the camelCase value wins. Unknown keys are ignored.
/// Numeric fields are `f64` so out-of-range values survive parsing and
/// get clamped by [`PipelineConfig::resolve`].
///
/// Asset fields hold base64 text without a `data:` prefix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawConfig {
    pub zoom: Option<f64>,
    pub cover: Option<bool>,
    pub quality: Option<String>,
    pub denoise: Option<bool>,
    pub sharpen: Option<bool>,
    #[serde(alias = "light_cut")]
    pub light_cut: Option<f64>,
    #[serde(alias = "dark_cut")]
    pub dark_cut: Option<f64>,
    pub shade: Option<bool>,
    #[serde(alias = "shade_limit")]
    pub shade_limit: Option<f64>,
    #[serde(alias = "shade_light")]
    pub shade_light: Option<f64>,
    #[serde(alias = "tone_count")]
    pub tone_count: Option<f64>,
    pub light: Option<f64>,
    pub kiss: Option<bool>,
    pub watermark: Option<bool>,
    pub hajimei: Option<bool>,
    #[serde(alias = "watermark_image", skip_serializing_if = "Option::is_none")]
    pub watermark_image: Option<String>,
    #[serde(alias = "pencil_texture", skip_serializing_if = "Option::is_none")]
    pub pencil_texture: Option<String>,
}

/// `(camelCase, snake_case)` spellings of every aliased field.
const SNAKE_ALIASES: [(&str, &str); 7] = [
    ("lightCut", "light_cut"),
    ("darkCut", "dark_cut"),
    ("shadeLimit", "shade_limit"),
    ("shadeLight", "shade_light"),
    ("toneCount", "tone_count"),
    ("watermarkImage", "watermark_image"),
    ("pencilTexture", "pencil_texture"),
];

impl RawConfig {
    /// Parse a JSON configuration document.
    ///
    /// An empty or whitespace-only string yields an all-default map. A
    /// snake_case key is dropped when its camelCase twin is present.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the document is not valid
    /// JSON or a field has the wrong type.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| PipelineError::config(e.to_string()))?;
        if let Some(map) = value.as_object_mut() {
            for (camel, snake) in SNAKE_ALIASES {
                if map.contains_key(camel) && map.remove(snake).is_some() {
                    tracing::debug!(camel, snake, "both spellings given, keeping camelCase");
                }
            }
        }
        serde_json::from_value(value).map_err(|e| PipelineError::config(e.to_string()))
    }
}

/// Fully resolved, immutable pipeline configuration.
///
/// Built once per invocation by [`PipelineConfig::resolve`]; every
/// numeric field is inside its documented domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    zoom: f64,
    cover: bool,
    quality: Quality,
    denoise: bool,
    sharpen: bool,
    light_cut: u8,
    dark_cut: u8,
    shade: bool,
    shade_limit: u8,
    shade_light: u8,
    tone_count: u8,
    light: i8,
    kiss: bool,
    watermark: bool,
    hajimei: bool,
    #[serde(skip)]
    watermark_image: Option<Vec<u8>>,
    #[serde(skip)]
    pencil_texture: Option<Vec<u8>>,
}

impl PipelineConfig {
    pub const DEFAULT_ZOOM: f64 = 1.0;
    pub const MIN_ZOOM: f64 = 0.5;
    pub const MAX_ZOOM: f64 = 4.0;
    pub const DEFAULT_COVER: bool = false;
    pub const DEFAULT_QUALITY: Quality = Quality::Normal;
    pub const DEFAULT_DENOISE: bool = true;
    pub const DEFAULT_SHARPEN: bool = false;
    pub const DEFAULT_LIGHT_CUT: u8 = 128;
    pub const DEFAULT_DARK_CUT: u8 = 118;
    pub const DEFAULT_SHADE: bool = true;
    pub const DEFAULT_SHADE_LIMIT: u8 = 108;
    pub const DEFAULT_SHADE_LIGHT: u8 = 80;
    pub const DEFAULT_TONE_COUNT: u8 = 3;
    pub const MIN_TONE_COUNT: u8 = 1;
    pub const MAX_TONE_COUNT: u8 = 10;
    pub const DEFAULT_LIGHT: i8 = 0;
    pub const MIN_LIGHT: i8 = -100;
    pub const MAX_LIGHT: i8 = 100;
    pub const DEFAULT_KISS: bool = true;
    pub const DEFAULT_WATERMARK: bool = true;
    pub const DEFAULT_HAJIMEI: bool = false;

    /// Resolve a sparse map into a complete configuration.
    ///
    /// Missing fields take their `DEFAULT_*` value. Numeric fields are
    /// rounded (integers) and clamped to their domains; non-finite
    /// numbers fall back to the default. Asset strings that are not
    /// valid base64 are dropped with a warning, since a missing asset
    /// only disables its stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if `quality` is not one of the
    /// seven mode names.
    pub fn resolve(raw: &RawConfig) -> Result<Self, PipelineError> {
        let quality = raw
            .quality
            .as_deref()
            .map_or(Ok(Self::DEFAULT_QUALITY), str::parse)?;

        Ok(Self {
            zoom: clamp_f64(raw.zoom, Self::DEFAULT_ZOOM, Self::MIN_ZOOM, Self::MAX_ZOOM),
            cover: raw.cover.unwrap_or(Self::DEFAULT_COVER),
            quality,
            denoise: raw.denoise.unwrap_or(Self::DEFAULT_DENOISE),
            sharpen: raw.sharpen.unwrap_or(Self::DEFAULT_SHARPEN),
            light_cut: clamp_u8(raw.light_cut, Self::DEFAULT_LIGHT_CUT, 0, u8::MAX),
            dark_cut: clamp_u8(raw.dark_cut, Self::DEFAULT_DARK_CUT, 0, u8::MAX),
            shade: raw.shade.unwrap_or(Self::DEFAULT_SHADE),
            shade_limit: clamp_u8(raw.shade_limit, Self::DEFAULT_SHADE_LIMIT, 0, u8::MAX),
            shade_light: clamp_u8(raw.shade_light, Self::DEFAULT_SHADE_LIGHT, 0, u8::MAX),
            tone_count: clamp_u8(
                raw.tone_count,
                Self::DEFAULT_TONE_COUNT,
                Self::MIN_TONE_COUNT,
                Self::MAX_TONE_COUNT,
            ),
            light: clamp_i8(raw.light, Self::DEFAULT_LIGHT, Self::MIN_LIGHT, Self::MAX_LIGHT),
            kiss: raw.kiss.unwrap_or(Self::DEFAULT_KISS),
            watermark: raw.watermark.unwrap_or(Self::DEFAULT_WATERMARK),
            hajimei: raw.hajimei.unwrap_or(Self::DEFAULT_HAJIMEI),
            watermark_image: decode_asset("watermarkImage", raw.watermark_image.as_deref()),
            pencil_texture: decode_asset("pencilTexture", raw.pencil_texture.as_deref()),
        })
    }

    /// Parse and resolve a JSON document in one step.
    ///
    /// `None` or an empty string yields [`PipelineConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] for malformed JSON, wrongly
    /// typed fields, or an unknown `quality`.
    pub fn from_json(json: Option<&str>) -> Result<Self, PipelineError> {
        json.map_or_else(|| Ok(RawConfig::default()), RawConfig::from_json)
            .and_then(|raw| Self::resolve(&raw))
    }

    /// Attach encoded watermark asset bytes (PNG or JPEG).
    #[must_use]
    pub fn with_watermark_image(mut self, bytes: Vec<u8>) -> Self {
        self.watermark_image = Some(bytes);
        self
    }

    /// Attach encoded pencil-texture bytes.
    #[must_use]
    pub fn with_pencil_texture(mut self, bytes: Vec<u8>) -> Self {
        self.pencil_texture = Some(bytes);
        self
    }

    #[must_use]
    pub const fn zoom(&self) -> f64 {
        self.zoom
    }

    #[must_use]
    pub const fn cover(&self) -> bool {
        self.cover
    }

    #[must_use]
    pub const fn quality(&self) -> Quality {
        self.quality
    }

    #[must_use]
    pub const fn denoise(&self) -> bool {
        self.denoise
    }

    /// Whether the edge map is unsharp-masked before thresholding.
    #[must_use]
    pub const fn sharpen(&self) -> bool {
        self.sharpen
    }

    #[must_use]
    pub const fn light_cut(&self) -> u8 {
        self.light_cut
    }

    #[must_use]
    pub const fn dark_cut(&self) -> u8 {
        self.dark_cut
    }

    #[must_use]
    pub const fn shade(&self) -> bool {
        self.shade
    }

    #[must_use]
    pub const fn shade_limit(&self) -> u8 {
        self.shade_limit
    }

    #[must_use]
    pub const fn shade_light(&self) -> u8 {
        self.shade_light
    }

    #[must_use]
    pub const fn tone_count(&self) -> u8 {
        self.tone_count
    }

    /// Brightness adjustment in percent.
    #[must_use]
    pub const fn light(&self) -> i8 {
        self.light
    }

    #[must_use]
    pub const fn kiss(&self) -> bool {
        self.kiss
    }

    #[must_use]
    pub const fn watermark(&self) -> bool {
        self.watermark
    }

    #[must_use]
    pub const fn hajimei(&self) -> bool {
        self.hajimei
    }

    #[must_use]
    pub fn watermark_image(&self) -> Option<&[u8]> {
        self.watermark_image.as_deref()
    }

    #[must_use]
    pub fn pencil_texture(&self) -> Option<&[u8]> {
        self.pencil_texture.as_deref()
    }

    /// Whether the shading stage will run: `shade` is on and the
    /// quality mode permits tone.
    #[must_use]
    pub const fn shading_enabled(&self) -> bool {
        self.shade && self.quality.allows_shading()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            zoom: Self::DEFAULT_ZOOM,
            cover: Self::DEFAULT_COVER,
            quality: Self::DEFAULT_QUALITY,
            denoise: Self::DEFAULT_DENOISE,
            sharpen: Self::DEFAULT_SHARPEN,
            light_cut: Self::DEFAULT_LIGHT_CUT,
            dark_cut: Self::DEFAULT_DARK_CUT,
            shade: Self::DEFAULT_SHADE,
            shade_limit: Self::DEFAULT_SHADE_LIMIT,
            shade_light: Self::DEFAULT_SHADE_LIGHT,
            tone_count: Self::DEFAULT_TONE_COUNT,
            light: Self::DEFAULT_LIGHT,
            kiss: Self::DEFAULT_KISS,
            watermark: Self::DEFAULT_WATERMARK,
            hajimei: Self::DEFAULT_HAJIMEI,
            watermark_image: None,
            pencil_texture: None,
        }
    }
}

fn clamp_f64(value: Option<f64>, default: f64, min: f64, max: f64) -> f64 {
    value.filter(|v| v.is_finite()).map_or(default, |v| v.clamp(min, max))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_u8(value: Option<f64>, default: u8, min: u8, max: u8) -> u8 {
    value.filter(|v| v.is_finite()).map_or(default, |v| {
        v.round().clamp(f64::from(min), f64::from(max)) as u8
    })
}

#[allow(clippy::cast_possible_truncation)]
fn clamp_i8(value: Option<f64>, default: i8, min: i8, max: i8) -> i8 {
    value.filter(|v| v.is_finite()).map_or(default, |v| {
        v.round().clamp(f64::from(min), f64::from(max)) as i8
    })
}

fn decode_asset(field: &str, encoded: Option<&str>) -> Option<Vec<u8>> {
    let encoded = encoded?.trim();
    if encoded.is_empty() {
        return None;
    }
    match base64::engine::general_purpose::STANDARD.decode(encoded) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(field, error = %e, "ignoring asset that is not valid base64");
            None
        }
    }
}
