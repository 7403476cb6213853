//! upsize: enlarge an image to an arbitrary target size via a remote
//! fixed-factor upscaling service.
//!
//! The target can be given in pixels or in centimetres (converted
//! through the output DPI, print-shop style). The tool plans the
//! number of remote passes, runs them sequentially, then resizes to
//! the exact target and stamps the DPI into the final JPEG.
//!
//! # Usage
//!
//! ```text
//! upsize photo.png --width-px 3800 --height-px 3800
//! upsize photo.png --width-cm 26.99 --height-cm 38.99 --dpi 300
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use upsize_core::{
    Dimensions, FileIdentityMap, ProgressObserver, UpscaleConfig, UpscalePlan, upscale_to_target,
};
use upsize_net::HttpUpscaleService;

/// Centimetres per inch, for print-size target entry.
const CM_PER_INCH: f64 = 2.54;

/// Enlarge an image to a target size via a remote upscaling service.
///
/// Give the target either in pixels (--width-px/--height-px) or as a
/// print size in centimetres (--width-cm/--height-cm), which is
/// converted to pixels through --dpi.
#[derive(Parser)]
#[command(name = "upsize", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Target width in pixels.
    #[arg(long, conflicts_with_all = ["width_cm", "height_cm"], requires = "height_px")]
    width_px: Option<u32>,

    /// Target height in pixels.
    #[arg(long, requires = "width_px")]
    height_px: Option<u32>,

    /// Target width in centimetres (converted via --dpi).
    #[arg(long, requires = "height_cm")]
    width_cm: Option<f64>,

    /// Target height in centimetres (converted via --dpi).
    #[arg(long, requires = "width_cm")]
    height_cm: Option<f64>,

    /// DPI stamped into the final JPEG (and used for cm conversion).
    #[arg(long, default_value_t = 300, value_parser = clap::builder::RangedU64ValueParser::<u16>::new().range(1..))]
    dpi: u16,

    /// Per-call magnification factor of the remote service.
    #[arg(long, default_value_t = UpscaleConfig::DEFAULT_PER_CALL_FACTOR, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(2..))]
    scale: u32,

    /// Seconds between job-listing polls.
    #[arg(long, default_value_t = UpscaleConfig::DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval: u64,

    /// Listing polls attempted before a pass times out.
    #[arg(long, default_value_t = UpscaleConfig::DEFAULT_MAX_POLL_ATTEMPTS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_attempts: u32,

    /// Ask the remote service for face enhancement.
    #[arg(long)]
    face_enhance: bool,

    /// JPEG quality of the final artifact.
    #[arg(long, default_value_t = UpscaleConfig::DEFAULT_JPEG_QUALITY, value_parser = clap::builder::RangedU64ValueParser::<u8>::new().range(1..=100))]
    quality: u8,

    /// Resampling filter for the final resize.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    filter: Filter,

    /// Directory for intermediates and the final artifact.
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// Base URL of the upscaling service.
    #[arg(long, default_value = upsize_net::DEFAULT_BASE_URL)]
    base_url: String,

    /// Logical image name used for client-identity assignment and
    /// output naming. Defaults to the input file name.
    #[arg(long)]
    name: Option<String>,

    /// Full run config as a JSON string.
    ///
    /// When provided, the individual config flags (--scale,
    /// --poll-interval, --max-attempts, --face-enhance, --quality,
    /// --filter, --work-dir) are ignored. The JSON must be a valid
    /// `UpscaleConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Resampling filter selection for the final resize.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Maps a core [`upsize_core::ResizeFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_core(f: upsize_core::ResizeFilter) -> Filter {
    match f {
        upsize_core::ResizeFilter::Nearest => Filter::Nearest,
        upsize_core::ResizeFilter::Triangle => Filter::Triangle,
        upsize_core::ResizeFilter::CatmullRom => Filter::CatmullRom,
        upsize_core::ResizeFilter::Gaussian => Filter::Gaussian,
        upsize_core::ResizeFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// The CLI default filter, derived from the core default so the two
/// cannot silently diverge.
const CLI_DEFAULT_FILTER: Filter = filter_from_core(UpscaleConfig::DEFAULT_RESIZE_FILTER);

const fn filter_to_core(f: Filter) -> upsize_core::ResizeFilter {
    match f {
        Filter::Nearest => upsize_core::ResizeFilter::Nearest,
        Filter::Triangle => upsize_core::ResizeFilter::Triangle,
        Filter::CatmullRom => upsize_core::ResizeFilter::CatmullRom,
        Filter::Gaussian => upsize_core::ResizeFilter::Gaussian,
        Filter::Lanczos3 => upsize_core::ResizeFilter::Lanczos3,
    }
}

/// Build an [`UpscaleConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<UpscaleConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(UpscaleConfig {
        per_call_factor: cli.scale,
        poll_interval: Duration::from_secs(cli.poll_interval),
        max_poll_attempts: cli.max_attempts,
        face_enhance: cli.face_enhance,
        resize_filter: filter_to_core(cli.filter),
        jpeg_quality: cli.quality,
        work_dir: cli.work_dir.clone(),
    })
}

/// Convert a centimetre print dimension to pixels at the given DPI.
///
/// Truncates toward zero, matching the print-size arithmetic the
/// reference deployment's users expect.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cm_to_px(cm: f64, dpi: u16) -> u32 {
    (cm / CM_PER_INCH * f64::from(dpi)) as u32
}

/// Resolve the target dimensions from whichever flag pair was given.
fn resolve_target(cli: &Cli) -> Result<Dimensions, String> {
    match (cli.width_px, cli.height_px, cli.width_cm, cli.height_cm) {
        (Some(w), Some(h), None, None) => Ok(Dimensions::new(w, h)),
        (None, None, Some(w), Some(h)) => {
            let target = Dimensions::new(cm_to_px(w, cli.dpi), cm_to_px(h, cli.dpi));
            if target.width == 0 || target.height == 0 {
                return Err(format!(
                    "Target {w}cm x {h}cm at {} DPI rounds to zero pixels",
                    cli.dpi,
                ));
            }
            Ok(target)
        }
        _ => Err("Give the target as --width-px/--height-px or --width-cm/--height-cm".to_owned()),
    }
}

/// Prints plan and pass events to stderr as the run advances.
struct StderrProgress;

impl ProgressObserver for StderrProgress {
    fn plan_ready(&self, plan: &UpscalePlan) {
        eprintln!(
            "Source {}x{}, target {}x{}: scale factor {:.2}, {} remote pass(es) needed",
            plan.source.width,
            plan.source.height,
            plan.target.width,
            plan.target.height,
            plan.scale_factor,
            plan.step_count,
        );
    }

    fn pass_completed(&self, pass: u32, total: u32) {
        eprintln!("Pass {pass}/{total} complete");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let target = match resolve_target(&cli) {
        Ok(t) => t,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_name = cli.name.clone().unwrap_or_else(|| {
        cli.image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_owned()
    });

    eprintln!(
        "Image: {} (target {}x{} @ {} DPI)",
        cli.image_path.display(),
        target.width,
        target.height,
        cli.dpi,
    );

    let identities = FileIdentityMap::shared();
    let service = HttpUpscaleService::with_base_url(&cli.base_url);

    match upscale_to_target(
        &cli.image_path,
        image_name,
        target,
        cli.dpi,
        config,
        &identities,
        &service,
        &StderrProgress,
    )
    .await
    {
        Ok(artifact) => {
            println!("{}", artifact.path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Upscale failed: {e}");
            ExitCode::FAILURE
        }
    }
}
