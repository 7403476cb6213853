//! Contract the orchestrator requires from the remote upscaling service.
//!
//! The service is addressed through three operations: a fire-and-forget
//! job submission, a per-client job listing, and a result download.
//! `upsize-net` provides the HTTP implementation; tests drive the
//! orchestrator with in-memory doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::UpscaleError;

/// One completed entry in a client's job listing.
///
/// The listing endpoint has returned completed items in two shapes over
/// time: a bare result-URL string, and a record with a `url` field.
/// Both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletedJob {
    /// A bare result URL.
    Url(String),
    /// A structured record carrying the result URL.
    Record {
        /// Where the magnified image can be downloaded.
        url: String,
    },
}

impl CompletedJob {
    /// The result URL, regardless of wire shape.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) | Self::Record { url } => url,
        }
    }
}

/// A client's job listing as reported by the remote service.
///
/// Ordering reflects submission/completion order, with the most recent
/// completed entry last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    /// Jobs submitted but not yet finished.
    #[serde(default)]
    pub pending: Vec<String>,
    /// Finished jobs with downloadable results.
    #[serde(default)]
    pub completed: Vec<CompletedJob>,
    /// Jobs the service gave up on.
    #[serde(default)]
    pub failed: Vec<String>,
}

/// The remote upscaling service, as the orchestrator sees it.
#[async_trait]
pub trait UpscaleService: Send + Sync {
    /// Start a remote magnification job for `image`, tagged with
    /// `client_id` and the per-call `scale`. Asynchronous on the
    /// remote side; no result handle is returned; completion is
    /// discovered by polling [`list_jobs`](Self::list_jobs).
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::Upstream`] if the submission is not
    /// accepted.
    async fn submit(
        &self,
        image: &[u8],
        file_name: &str,
        client_id: &str,
        scale: u32,
        face_enhance: bool,
    ) -> Result<(), UpscaleError>;

    /// Fetch the job listing for `client_id`.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::Upstream`] if the listing request fails
    /// or its payload cannot be interpreted.
    async fn list_jobs(&self, client_id: &str) -> Result<JobListing, UpscaleError>;

    /// Download the bytes at a completed job's result URL.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::Upstream`] for any non-success response.
    async fn download(&self, url: &str) -> Result<Vec<u8>, UpscaleError>;
}
