//! Run configuration for the upscale orchestrator.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resize::ResizeFilter;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Configuration for one upscale run.
///
/// All parameters default to the reference deployment's values: a 4x
/// per-call factor, polled every 10 seconds for at most 60 attempts
/// (a 10-minute ceiling per pass).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpscaleConfig {
    /// Fixed magnification factor the remote service applies per call.
    pub per_call_factor: u32,

    /// Time to wait between job-listing polls.
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// Listing polls attempted before a pass fails with a timeout.
    pub max_poll_attempts: u32,

    /// Whether to ask the remote service for face enhancement.
    pub face_enhance: bool,

    /// Resampling filter for the final resize to target dimensions.
    pub resize_filter: ResizeFilter,

    /// JPEG quality (1-100) for the final encoded artifact.
    pub jpeg_quality: u8,

    /// Directory where per-pass intermediates and the final artifact
    /// are written.
    pub work_dir: PathBuf,
}

impl UpscaleConfig {
    /// Default remote per-call magnification factor.
    pub const DEFAULT_PER_CALL_FACTOR: u32 = 4;

    /// Default seconds between job-listing polls.
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

    /// Default number of listing polls before a pass times out.
    pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;

    /// Default JPEG quality for the final artifact.
    pub const DEFAULT_JPEG_QUALITY: u8 = 90;

    /// Default resampling filter for the final resize.
    pub const DEFAULT_RESIZE_FILTER: ResizeFilter = ResizeFilter::Lanczos3;
}

impl Default for UpscaleConfig {
    fn default() -> Self {
        Self {
            per_call_factor: Self::DEFAULT_PER_CALL_FACTOR,
            poll_interval: Duration::from_secs(Self::DEFAULT_POLL_INTERVAL_SECS),
            max_poll_attempts: Self::DEFAULT_MAX_POLL_ATTEMPTS,
            face_enhance: false,
            resize_filter: Self::DEFAULT_RESIZE_FILTER,
            jpeg_quality: Self::DEFAULT_JPEG_QUALITY,
            work_dir: PathBuf::from("."),
        }
    }
}
