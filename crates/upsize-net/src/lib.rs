//! HTTP implementation of the remote upscaling service contract.
//!
//! Three endpoints, matching the reference deployment:
//!
//! - `POST {base}/upload`: multipart form (`image` file part plus
//!   `client_id`, `scale`, `face_enhance` text fields) starting a job;
//!   the response carries no job handle.
//! - `GET {base}/list/{client_id}`: JSON job listing with `pending`,
//!   `completed`, and `failed` arrays.
//! - `GET <result url>`: raw image bytes of a completed job.
//!
//! Every transport failure, non-success status, and malformed payload
//! maps to [`UpscaleError::Upstream`]; this crate introduces no error
//! kinds of its own.

use async_trait::async_trait;
use tracing::debug;

use upsize_core::{JobListing, UpscaleError, UpscaleService};

/// Base URL of the reference deployment.
pub const DEFAULT_BASE_URL: &str = "https://api.image-upscaling.net";

/// Remote upscaling service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUpscaleService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUpscaleService {
    /// Client for the reference deployment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Client for a different deployment of the same API.
    ///
    /// A trailing slash on `base_url` is tolerated.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// The configured base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn upload_url(&self) -> String {
        format!("{}/upload", self.base_url)
    }

    fn list_url(&self, client_id: &str) -> String {
        format!("{}/list/{client_id}", self.base_url)
    }
}

impl Default for HttpUpscaleService {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse a reqwest failure into the orchestrator's upstream kind.
fn upstream(error: reqwest::Error) -> UpscaleError {
    UpscaleError::Upstream(error.to_string())
}

#[async_trait]
impl UpscaleService for HttpUpscaleService {
    async fn submit(
        &self,
        image: &[u8],
        file_name: &str,
        client_id: &str,
        scale: u32,
        face_enhance: bool,
    ) -> Result<(), UpscaleError> {
        let form = reqwest::multipart::Form::new()
            .text("client_id", client_id.to_owned())
            .text("scale", scale.to_string())
            .text("face_enhance", face_enhance.to_string())
            .part(
                "image",
                reqwest::multipart::Part::bytes(image.to_vec()).file_name(file_name.to_owned()),
            );
        self.client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(upstream)?
            .error_for_status()
            .map_err(upstream)?;
        debug!(client_id, scale, face_enhance, "job submitted");
        Ok(())
    }

    async fn list_jobs(&self, client_id: &str) -> Result<JobListing, UpscaleError> {
        let listing = self
            .client
            .get(self.list_url(client_id))
            .send()
            .await
            .map_err(upstream)?
            .error_for_status()
            .map_err(upstream)?
            .json::<JobListing>()
            .await
            .map_err(upstream)?;
        debug!(
            client_id,
            pending = listing.pending.len(),
            completed = listing.completed.len(),
            "job listing fetched",
        );
        Ok(listing)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, UpscaleError> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .map_err(upstream)?
            .error_for_status()
            .map_err(upstream)?
            .bytes()
            .await
            .map_err(upstream)?;
        debug!(url, len = bytes.len(), "result downloaded");
        Ok(bytes.to_vec())
    }
}
