//! upsize-core: multi-pass upscale orchestration.
//!
//! Drives a remote fixed-factor image-upscaling service to reach an
//! arbitrary target pixel size:
//!
//! 1. Assign (or recall) a stable client identifier for the image
//! 2. Plan how many fixed-factor passes the target requires
//! 3. For each pass: submit, poll the job listing, download the result
//! 4. Resample the last result to exact target dimensions and stamp
//!    the requested DPI into the final JPEG
//!
//! This crate owns all control flow and failure handling but speaks to
//! the remote service only through the [`UpscaleService`] trait;
//! `upsize-net` provides the HTTP implementation.

pub mod config;
pub mod executor;
pub mod identity;
pub mod orchestrator;
pub mod plan;
pub mod progress;
pub mod resize;
pub mod service;
pub mod types;

pub use config::UpscaleConfig;
pub use executor::PassRunner;
pub use identity::{FileIdentityMap, IdentityMap, MemoryIdentityMap};
pub use orchestrator::{Orchestrator, upscale_to_target};
pub use progress::{NoProgress, ProgressObserver};
pub use resize::ResizeFilter;
pub use service::{CompletedJob, JobListing, UpscaleService};
pub use types::{Dimensions, FinalArtifact, PassResult, UpscaleError, UpscalePlan};
