//! Shared types for the upsize orchestration core.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions from a width/height pair.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The upscaling plan derived once per run, immutable after computation.
///
/// `step_count` is the smallest number of sequential fixed-factor
/// magnification calls that covers `scale_factor`. A `step_count` of
/// zero means the source already meets or exceeds the target scale and
/// only the final resize is needed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpscalePlan {
    /// Source image dimensions in pixels.
    pub source: Dimensions,
    /// Target dimensions in pixels.
    pub target: Dimensions,
    /// `max(target.width / source.width, target.height / source.height)`.
    pub scale_factor: f64,
    /// Number of sequential remote magnification passes required.
    pub step_count: u32,
}

/// One successfully completed remote magnification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassResult {
    /// One-based index of this pass within the run.
    pub pass_index: u32,
    /// The image fed into this pass.
    pub input: PathBuf,
    /// The downloaded result, which becomes the next pass's input.
    pub output: PathBuf,
}

/// Terminal output of a successful run: the final image resized to
/// exact target dimensions and stamped with the configured DPI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalArtifact {
    /// Where the final JPEG was written.
    pub path: PathBuf,
    /// Exact pixel dimensions of the final image.
    pub dimensions: Dimensions,
    /// Dots-per-inch density stamped into the file's metadata.
    pub dpi: u16,
}

/// Errors that can occur during an upscale run.
///
/// Every variant is fatal to the current run; nothing is retried
/// automatically. The caller may re-invoke the orchestrator, supplying
/// the last successfully produced intermediate as the new input to
/// resume from there.
#[derive(Debug, thiserror::Error)]
pub enum UpscaleError {
    /// The poll budget expired with no completed remote job.
    #[error("no completed job appeared after {attempts} polls")]
    Timeout {
        /// How many listing polls were performed before giving up.
        attempts: u32,
    },

    /// The remote service returned a non-success response or malformed
    /// completed-item data.
    #[error("upstream service error: {0}")]
    Upstream(String),

    /// Local read/write failure for input, intermediate, or final files.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode or re-encode an input or intermediate image.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Plan inputs were invalid (zero source dimension, factor <= 1).
    #[error("invalid upscale plan: {0}")]
    InvalidPlan(String),

    /// Our own JPEG encode produced a stream the DPI stamper cannot
    /// recognize.
    #[error("malformed JPEG stream: {0}")]
    InvalidJpeg(&'static str),
}
