//! oli: command-line front end for the line-art pipeline.
//!
//! Renders one or more photographs into line-art PNGs. Every pipeline
//! parameter has a flag; `--config-json` takes a whole configuration
//! document instead. Inputs that cannot be decoded are copied through
//! unchanged, mirroring the library's fallback contract.
//!
//! # Usage
//!
//! ```text
//! oli [OPTIONS] <INPUT>...
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use clap::builder::PossibleValuesParser;
use oli_pipeline::diagnostics::{SystemClock, process_staged_with_diagnostics};
use oli_pipeline::{PipelineConfig, Quality, RawConfig, detect_mime};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

/// Turn photographs into stylized line-art illustrations.
///
/// Flags that are not given fall back to the pipeline defaults.
#[derive(Parser)]
#[command(name = "oli", version)]
struct Cli {
    /// Input images (PNG, JPEG, BMP, WebP, GIF).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output path. Only valid with a single input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for outputs (default: next to each input).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Scale factor applied before line extraction (0.5-4.0).
    #[arg(long)]
    zoom: Option<f64>,

    /// Center-crop to a square.
    #[arg(long)]
    cover: bool,

    /// Line extraction mode.
    #[arg(long, value_parser = PossibleValuesParser::new(Quality::ALL.map(Quality::as_str)))]
    quality: Option<String>,

    /// Skip the denoise blur before line extraction.
    #[arg(long)]
    no_denoise: bool,

    /// Unsharp-mask the edge map before thresholding.
    #[arg(long)]
    sharpen: bool,

    /// Edge intensity at or above which a pixel is fully inked (0-255).
    #[arg(long)]
    light_cut: Option<f64>,

    /// Edge intensity at or below which a pixel stays paper (0-255).
    #[arg(long)]
    dark_cut: Option<f64>,

    /// Disable the tone layer.
    #[arg(long)]
    no_shade: bool,

    /// Luminance at or above which no tone is laid down (0-255).
    #[arg(long)]
    shade_limit: Option<f64>,

    /// Luminance at or below which the darkest tone is used (0-255).
    #[arg(long)]
    shade_light: Option<f64>,

    /// Number of tone bands (1-10).
    #[arg(long)]
    tone_count: Option<f64>,

    /// Brightness adjustment in percent (-100 to 100), applied before line
    /// analysis.
    #[arg(long, allow_hyphen_values = true)]
    light: Option<f64>,

    /// Disable the kiss color gradient.
    #[arg(long)]
    no_kiss: bool,

    /// Disable the watermark.
    #[arg(long)]
    no_watermark: bool,

    /// Use the hajimei watermark preset.
    #[arg(long)]
    hajimei: bool,

    /// Watermark sprite sheet (two rows, PNG or JPEG).
    #[arg(long)]
    watermark_image: Option<PathBuf>,

    /// Pencil grain texture for the tone layer.
    #[arg(long)]
    pencil_texture: Option<PathBuf>,

    /// Full configuration as JSON (overrides all parameter flags above).
    #[arg(long)]
    config_json: Option<String>,

    /// Print the per-stage diagnostics report for each input.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of the text report.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Build the sparse configuration map from the parameter flags.
///
/// Boolean switches only produce a value when given, so an unset switch
/// keeps the pipeline default.
fn raw_from_flags(cli: &Cli) -> RawConfig {
    RawConfig {
        zoom: cli.zoom,
        cover: cli.cover.then_some(true),
        quality: cli.quality.clone(),
        denoise: cli.no_denoise.then_some(false),
        sharpen: cli.sharpen.then_some(true),
        light_cut: cli.light_cut,
        dark_cut: cli.dark_cut,
        shade: cli.no_shade.then_some(false),
        shade_limit: cli.shade_limit,
        shade_light: cli.shade_light,
        tone_count: cli.tone_count,
        light: cli.light,
        kiss: cli.no_kiss.then_some(false),
        watermark: cli.no_watermark.then_some(false),
        hajimei: cli.hajimei.then_some(true),
        ..RawConfig::default()
    }
}

/// Resolve the [`PipelineConfig`] from CLI arguments and attach assets.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Asset paths apply either way
/// and replace any base64 assets embedded in the JSON.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let mut config = match cli.config_json {
        Some(ref json) => PipelineConfig::from_json(Some(json.as_str()))
            .map_err(|e| format!("Error parsing --config-json: {e}"))?,
        None => PipelineConfig::resolve(&raw_from_flags(cli))
            .map_err(|e| format!("Invalid configuration: {e}"))?,
    };

    if let Some(ref path) = cli.watermark_image {
        let bytes = std::fs::read(path)
            .map_err(|e| format!("Error reading watermark image {}: {e}", path.display()))?;
        config = config.with_watermark_image(bytes);
    }
    if let Some(ref path) = cli.pencil_texture {
        let bytes = std::fs::read(path)
            .map_err(|e| format!("Error reading pencil texture {}: {e}", path.display()))?;
        config = config.with_pencil_texture(bytes);
    }
    Ok(config)
}

/// File extension for bytes of the given MIME type.
fn extension_for(mime: &str, input: &Path) -> String {
    match mime {
        "image/png" => "png".to_owned(),
        "image/jpeg" => "jpg".to_owned(),
        "image/gif" => "gif".to_owned(),
        "image/bmp" => "bmp".to_owned(),
        "image/webp" => "webp".to_owned(),
        _ => input
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_owned(),
    }
}

/// Output file stems for every input, in input order.
///
/// The first input with a given stem and target directory gets
/// `<stem>_oli`; later ones get `<stem>_oli_2`, `<stem>_oli_3` and so on,
/// so `a/x.png b/x.png --out-dir out` writes two files.
fn output_stems(cli: &Cli) -> Vec<String> {
    let mut seen: HashMap<(PathBuf, String), usize> = HashMap::new();
    cli.inputs
        .iter()
        .map(|input| {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image")
                .to_owned();
            let dir = cli.out_dir.clone().unwrap_or_else(|| {
                input.parent().map(Path::to_path_buf).unwrap_or_default()
            });
            let count = seen.entry((dir, stem.clone())).or_insert(0);
            *count += 1;
            if *count == 1 {
                format!("{stem}_oli")
            } else {
                tracing::debug!(input = %input.display(), n = *count, "output name collides, numbering");
                format!("{stem}_oli_{count}")
            }
        })
        .collect()
}

/// Where to write the result for `input`.
///
/// `--output` wins; otherwise `<stem>.<ext>` in `--out-dir` or next to
/// the input, with `stem` from [`output_stems`]. The extension follows
/// the bytes actually written, so a passed-through JPEG keeps a JPEG
/// extension.
fn output_path(cli: &Cli, input: &Path, stem: &str, mime: &str) -> PathBuf {
    if let Some(ref output) = cli.output {
        return output.clone();
    }
    let name = format!("{stem}.{}", extension_for(mime, input));
    match cli.out_dir {
        Some(ref dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

/// Result of processing one input, reported after all inputs finish.
struct Outcome {
    input: PathBuf,
    written: Option<(PathBuf, usize)>,
    fell_back: bool,
    report: Option<String>,
    error: Option<String>,
}

impl Outcome {
    const fn failed(input: PathBuf, error: String) -> Self {
        Self {
            input,
            written: None,
            fell_back: false,
            report: None,
            error: Some(error),
        }
    }
}

/// Run the pipeline on one input and write the result.
fn run_one(cli: &Cli, config: &PipelineConfig, input: &Path, stem: &str) -> Outcome {
    let bytes = match std::fs::read(input) {
        Ok(bytes) => bytes,
        Err(e) => {
            return Outcome::failed(
                input.to_path_buf(),
                format!("Error reading {}: {e}", input.display()),
            );
        }
    };
    tracing::info!(
        input = %input.display(),
        mime = detect_mime(&bytes),
        bytes = bytes.len(),
        "processing",
    );

    let mut report = None;
    let output = if cli.diagnostics || cli.json {
        match process_staged_with_diagnostics(&bytes, config, &SystemClock) {
            Ok((staged, diagnostics)) => {
                report = Some(if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => json,
                        Err(e) => {
                            return Outcome::failed(
                                input.to_path_buf(),
                                format!("Error serializing diagnostics: {e}"),
                            );
                        }
                    }
                } else {
                    diagnostics.report()
                });
                staged.png
            }
            Err(e) if e.falls_back() => {
                tracing::warn!(input = %input.display(), error = %e, "returning original image");
                bytes.clone()
            }
            Err(e) => {
                return Outcome::failed(input.to_path_buf(), format!("Pipeline error: {e}"));
            }
        }
    } else {
        oli_pipeline::render(&bytes, config)
    };

    let fell_back = output == bytes;
    let mime = detect_mime(&output);
    let path = output_path(cli, input, stem, mime);
    if let Err(e) = std::fs::write(&path, &output) {
        return Outcome::failed(
            input.to_path_buf(),
            format!("Error writing {}: {e}", path.display()),
        );
    }

    Outcome {
        input: input.to_path_buf(),
        written: Some((path, output.len())),
        fell_back,
        report,
        error: None,
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.output.is_some() && cli.inputs.len() > 1 {
        eprintln!("--output takes a single input; use --out-dir for several");
        return ExitCode::FAILURE;
    }
    if let Some(ref dir) = cli.out_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("Error creating {}: {e}", dir.display());
        return ExitCode::FAILURE;
    }

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let stems = output_stems(&cli);
    let outcomes: Vec<Outcome> = cli
        .inputs
        .par_iter()
        .zip(stems.par_iter())
        .map(|(input, stem)| run_one(&cli, &config, input, stem))
        .collect();

    let mut status = ExitCode::SUCCESS;
    for outcome in outcomes {
        if let Some(report) = outcome.report {
            println!("{report}");
        }
        if let Some(error) = outcome.error {
            eprintln!("{error}");
            status = ExitCode::FAILURE;
            continue;
        }
        if let Some((path, len)) = outcome.written {
            let note = if outcome.fell_back {
                " (not decodable, original copied)"
            } else {
                ""
            };
            eprintln!(
                "{} -> {} ({len} bytes){note}",
                outcome.input.display(),
                path.display(),
            );
        }
    }
    status
}
