//! Step planning: how many fixed-factor passes reach the target size.
//!
//! The remote service magnifies by a fixed factor per call, so reaching
//! an arbitrary target requires `ceil(log_factor(scale))` sequential
//! calls, where `scale` is the larger of the width and height ratios.

use crate::types::{Dimensions, UpscaleError, UpscalePlan};

/// Compute the upscale plan for a source/target pair.
///
/// The scale factor is `max(target.width / source.width,
/// target.height / source.height)`. `step_count` is the smallest
/// `k >= 0` such that `per_call_factor^k >= scale_factor`; it is
/// computed by repeated multiplication rather than a floating-point
/// logarithm, which can land just above an integer at exact powers of
/// the factor and over-count by one.
///
/// A scale factor of 1.0 or less yields `step_count = 0`: the source
/// already meets or exceeds the target scale and only the final resize
/// is needed.
///
/// # Errors
///
/// Returns [`UpscaleError::InvalidPlan`] if any dimension is zero or
/// `per_call_factor <= 1`.
pub fn plan(
    source: Dimensions,
    target: Dimensions,
    per_call_factor: u32,
) -> Result<UpscalePlan, UpscaleError> {
    if source.width == 0 || source.height == 0 {
        return Err(UpscaleError::InvalidPlan(format!(
            "source dimensions must be non-zero, got {}x{}",
            source.width, source.height,
        )));
    }
    if target.width == 0 || target.height == 0 {
        return Err(UpscaleError::InvalidPlan(format!(
            "target dimensions must be non-zero, got {}x{}",
            target.width, target.height,
        )));
    }
    if per_call_factor <= 1 {
        return Err(UpscaleError::InvalidPlan(format!(
            "per-call factor must be greater than 1, got {per_call_factor}",
        )));
    }

    let width_scale = f64::from(target.width) / f64::from(source.width);
    let height_scale = f64::from(target.height) / f64::from(source.height);
    let scale_factor = width_scale.max(height_scale);

    let factor = f64::from(per_call_factor);
    let mut step_count = 0;
    let mut covered = 1.0;
    while covered < scale_factor {
        covered *= factor;
        step_count += 1;
    }

    Ok(UpscalePlan {
        source,
        target,
        scale_factor,
        step_count,
    })
}
