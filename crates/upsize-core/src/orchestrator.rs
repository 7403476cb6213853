//! The upscale run as an explicit state machine.
//!
//! A run advances through consuming stages:
//!
//! ```text
//! Init -> Identified -> Planned -> Upscaled -> Finished
//! ```
//!
//! Each stage method consumes `self` and returns the next state (or
//! `Result` for fallible transitions), making it a compile-time error
//! to skip a stage or run them out of order. Any `Err` is the terminal
//! failed state: the run stops immediately, nothing is retried, and no
//! partial artifact is produced.
//!
//! [`upscale_to_target`] chains all stages for callers that do not need
//! to inspect intermediate state:
//!
//! ```rust,no_run
//! # use upsize_core::{upscale_to_target, Dimensions, MemoryIdentityMap, NoProgress, UpscaleConfig};
//! # async fn run(service: &impl upsize_core::UpscaleService) -> Result<(), upsize_core::UpscaleError> {
//! let artifact = upscale_to_target(
//!     "input_cat.png",
//!     "cat.png",
//!     Dimensions::new(3800, 3800),
//!     300,
//!     UpscaleConfig::default(),
//!     &MemoryIdentityMap::new(),
//!     service,
//!     &NoProgress,
//! )
//! .await?;
//! println!("{}", artifact.path.display());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::UpscaleConfig;
use crate::executor::PassRunner;
use crate::identity::IdentityMap;
use crate::progress::ProgressObserver;
use crate::resize::{encode_jpeg, resize_to_target, stamp_jpeg_dpi};
use crate::service::UpscaleService;
use crate::types::{Dimensions, FinalArtifact, PassResult, UpscaleError, UpscalePlan};

/// Entry point for building an upscale run.
pub struct Orchestrator;

impl Orchestrator {
    /// Record the run's inputs without doing any work.
    ///
    /// Call [`Init::identify`] to begin.
    #[allow(clippy::new_ret_no_self)]
    #[must_use]
    pub const fn new(
        input: PathBuf,
        image_name: String,
        target: Dimensions,
        dpi: u16,
        config: UpscaleConfig,
    ) -> Init {
        Init {
            input,
            image_name,
            target,
            dpi,
            config,
        }
    }
}

// ───────────────────────── Stage 0: Init ─────────────────────────────

/// Run state before any work has happened.
#[must_use = "stages are consumed by advancing: call .identify() to continue"]
pub struct Init {
    input: PathBuf,
    image_name: String,
    target: Dimensions,
    dpi: u16,
    config: UpscaleConfig,
}

impl Init {
    /// Obtain the stable client identifier for this image name and
    /// advance to [`Identified`].
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::Io`] if the identity store cannot
    /// generate or persist an identifier.
    pub fn identify<M: IdentityMap + ?Sized>(
        self,
        identities: &M,
    ) -> Result<Identified, UpscaleError> {
        let client_id = identities.get_or_create(&self.image_name)?;
        info!(image = %self.image_name, %client_id, "client identity assigned");
        Ok(Identified {
            input: self.input,
            image_name: self.image_name,
            target: self.target,
            dpi: self.dpi,
            config: self.config,
            client_id,
        })
    }
}

// ───────────────────────── Stage 1: Identified ───────────────────────

/// Run state once the client identity is known.
#[must_use = "stages are consumed by advancing: call .plan() to continue"]
pub struct Identified {
    input: PathBuf,
    image_name: String,
    target: Dimensions,
    dpi: u16,
    config: UpscaleConfig,
    client_id: String,
}

impl Identified {
    /// The client identifier this run will submit under.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Read the source dimensions, compute the plan, and advance to
    /// [`Planned`]. Emits the observer's plan event.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::Io`] if the input file cannot be read,
    /// [`UpscaleError::Image`] if its format is unrecognized, and
    /// [`UpscaleError::InvalidPlan`] for degenerate dimensions.
    pub fn plan<P: ProgressObserver + ?Sized>(
        self,
        progress: &P,
    ) -> Result<Planned, UpscaleError> {
        let (width, height) = image::image_dimensions(&self.input).map_err(|e| match e {
            image::ImageError::IoError(io) => UpscaleError::Io(io),
            other => UpscaleError::Image(other),
        })?;
        let source = Dimensions::new(width, height);
        let plan = crate::plan::plan(source, self.target, self.config.per_call_factor)?;
        info!(
            source_width = source.width,
            source_height = source.height,
            scale_factor = plan.scale_factor,
            step_count = plan.step_count,
            "plan computed",
        );
        progress.plan_ready(&plan);
        Ok(Planned {
            input: self.input,
            image_name: self.image_name,
            dpi: self.dpi,
            config: self.config,
            client_id: self.client_id,
            plan,
        })
    }
}

// ───────────────────────── Stage 2: Planned ──────────────────────────

/// Run state with the plan computed, before any remote work.
#[must_use = "stages are consumed by advancing: call .upscale() to continue"]
pub struct Planned {
    input: PathBuf,
    image_name: String,
    dpi: u16,
    config: UpscaleConfig,
    client_id: String,
    plan: UpscalePlan,
}

impl Planned {
    /// The computed plan.
    #[must_use]
    pub const fn plan(&self) -> &UpscalePlan {
        &self.plan
    }

    /// Run every magnification pass strictly in sequence, each pass
    /// consuming the previous pass's output, and advance to
    /// [`Upscaled`]. With a step count of zero this performs no remote
    /// work at all.
    ///
    /// # Errors
    ///
    /// Returns the first pass's [`UpscaleError::Timeout`],
    /// [`UpscaleError::Upstream`], or [`UpscaleError::Io`] unchanged;
    /// later passes never start after a failure.
    pub async fn upscale<S, P>(self, service: &S, progress: &P) -> Result<Upscaled, UpscaleError>
    where
        S: UpscaleService + ?Sized,
        P: ProgressObserver + ?Sized,
    {
        let runner = PassRunner::new(service, &self.config, &self.client_id, &self.image_name);
        let total = self.plan.step_count;
        let mut passes = Vec::new();
        let mut current = self.input.clone();
        for pass in 1..=total {
            let result = runner.run(pass, &current).await?;
            current = result.output.clone();
            passes.push(result);
            progress.pass_completed(pass, total);
        }
        Ok(Upscaled {
            image_name: self.image_name,
            dpi: self.dpi,
            config: self.config,
            plan: self.plan,
            passes,
            current,
        })
    }
}

// ───────────────────────── Stage 3: Upscaled ─────────────────────────

/// Run state after all remote passes have completed.
#[must_use = "stages are consumed by advancing: call .resize() to continue"]
pub struct Upscaled {
    image_name: String,
    dpi: u16,
    config: UpscaleConfig,
    plan: UpscalePlan,
    passes: Vec<PassResult>,
    current: PathBuf,
}

impl Upscaled {
    /// The completed passes, in order. Empty when the plan needed none.
    #[must_use]
    pub fn passes(&self) -> &[PassResult] {
        &self.passes
    }

    /// Resample the last image to exact target dimensions, stamp the
    /// DPI, write the final JPEG, and advance to [`Finished`].
    ///
    /// The artifact is written as `final_<stem>_<dpi>dpi.jpg` in the
    /// work directory.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::Io`] for file failures,
    /// [`UpscaleError::Image`] for decode/encode failures, and
    /// [`UpscaleError::InvalidJpeg`] if the encoded stream cannot be
    /// stamped.
    pub fn resize(self) -> Result<Finished, UpscaleError> {
        let bytes = std::fs::read(&self.current)?;
        let image = image::load_from_memory(&bytes)?;
        let resized = resize_to_target(&image, self.plan.target, self.config.resize_filter);
        let jpeg = encode_jpeg(&resized, self.config.jpeg_quality)?;
        let stamped = stamp_jpeg_dpi(jpeg, self.dpi)?;

        let stem = Path::new(&self.image_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(self.image_name.as_str());
        let path = self
            .config
            .work_dir
            .join(format!("final_{stem}_{}dpi.jpg", self.dpi));
        std::fs::write(&path, &stamped)?;
        info!(
            path = %path.display(),
            width = self.plan.target.width,
            height = self.plan.target.height,
            dpi = self.dpi,
            "final artifact written",
        );

        Ok(Finished {
            artifact: FinalArtifact {
                path,
                dimensions: self.plan.target,
                dpi: self.dpi,
            },
            passes: self.passes,
        })
    }
}

// ───────────────────────── Stage 4: Finished ─────────────────────────

/// Terminal state of a successful run.
#[must_use = "call .into_artifact() to extract the FinalArtifact"]
pub struct Finished {
    artifact: FinalArtifact,
    passes: Vec<PassResult>,
}

impl Finished {
    /// The final artifact.
    #[must_use]
    pub const fn artifact(&self) -> &FinalArtifact {
        &self.artifact
    }

    /// The completed passes, in order.
    #[must_use]
    pub fn passes(&self) -> &[PassResult] {
        &self.passes
    }

    /// Consume the run and return the final artifact.
    #[must_use]
    pub fn into_artifact(self) -> FinalArtifact {
        self.artifact
    }
}

/// Run a complete upscale: identity, plan, every pass, final resize.
///
/// This is the single entry point UI shells call; the typestate API
/// above is for callers that want to inspect intermediate state.
///
/// # Errors
///
/// Returns the first error of any stage; see the stage methods for the
/// error kinds each can produce.
pub async fn upscale_to_target<M, S, P>(
    input: impl Into<PathBuf>,
    image_name: impl Into<String>,
    target: Dimensions,
    dpi: u16,
    config: UpscaleConfig,
    identities: &M,
    service: &S,
    progress: &P,
) -> Result<FinalArtifact, UpscaleError>
where
    M: IdentityMap + ?Sized,
    S: UpscaleService + ?Sized,
    P: ProgressObserver + ?Sized,
{
    let finished = Orchestrator::new(input.into(), image_name.into(), target, dpi, config)
        .identify(identities)?
        .plan(progress)?
        .upscale(service, progress)
        .await?
        .resize()?;
    Ok(finished.into_artifact())
}
