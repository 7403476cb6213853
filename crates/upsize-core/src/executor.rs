//! One magnification pass: submit, poll until completion, download.
//!
//! The remote service offers no per-submission handle, so completion is
//! discovered by polling the client's job listing. The first poll that
//! reports any completed entry wins, and the *last* completed entry's
//! URL is taken, with no token correlating it with this
//! submission. A stale completed job left over from an earlier run
//! under the same client identifier would be picked up instead; the
//! single-user, one-job-at-a-time usage model is what keeps this sound.

use std::path::Path;

use tracing::{debug, info};

use crate::config::UpscaleConfig;
use crate::service::UpscaleService;
use crate::types::{PassResult, UpscaleError};

/// Runs magnification passes for one image against one client identity.
///
/// Holds everything that is constant across the passes of a run; call
/// [`run`](Self::run) once per pass, feeding each pass's output as the
/// next pass's input.
pub struct PassRunner<'a, S: UpscaleService + ?Sized> {
    service: &'a S,
    config: &'a UpscaleConfig,
    client_id: &'a str,
    file_name: &'a str,
}

impl<'a, S: UpscaleService + ?Sized> PassRunner<'a, S> {
    /// Create a runner for one image's passes.
    #[must_use]
    pub const fn new(
        service: &'a S,
        config: &'a UpscaleConfig,
        client_id: &'a str,
        file_name: &'a str,
    ) -> Self {
        Self {
            service,
            config,
            client_id,
            file_name,
        }
    }

    /// Execute one full submit → poll → download cycle.
    ///
    /// The result is written to `upscaled_<pass_index>_<file_name>`
    /// inside the configured work directory.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::Timeout`] if no completed job appears
    /// within the poll budget (no download is attempted in that case),
    /// [`UpscaleError::Upstream`] if submission, listing, or download
    /// fails remotely, and [`UpscaleError::Io`] for local file errors.
    pub async fn run(&self, pass_index: u32, input: &Path) -> Result<PassResult, UpscaleError> {
        let image = tokio::fs::read(input).await?;
        self.service
            .submit(
                &image,
                self.file_name,
                self.client_id,
                self.config.per_call_factor,
                self.config.face_enhance,
            )
            .await?;
        info!(
            pass = pass_index,
            scale = self.config.per_call_factor,
            "submitted magnification job",
        );

        let url = self.poll_for_result().await?;
        debug!(pass = pass_index, %url, "result ready");

        let result = self.service.download(&url).await?;
        let output = self
            .config
            .work_dir
            .join(format!("upscaled_{pass_index}_{}", self.file_name));
        tokio::fs::write(&output, &result).await?;
        info!(pass = pass_index, output = %output.display(), "pass complete");

        Ok(PassResult {
            pass_index,
            input: input.to_path_buf(),
            output,
        })
    }

    /// Poll the job listing until a completed entry appears, returning
    /// its result URL.
    async fn poll_for_result(&self) -> Result<String, UpscaleError> {
        for attempt in 1..=self.config.max_poll_attempts {
            let listing = self.service.list_jobs(self.client_id).await?;
            debug!(
                attempt,
                max = self.config.max_poll_attempts,
                completed = listing.completed.len(),
                "polled job listing",
            );
            if let Some(done) = listing.completed.last() {
                return Ok(done.url().to_owned());
            }
            if attempt < self.config.max_poll_attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
        Err(UpscaleError::Timeout {
            attempts: self.config.max_poll_attempts,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::service::{CompletedJob, JobListing};

    /// Service double that pops one scripted listing per poll and
    /// records every call.
    #[derive(Default)]
    struct ScriptedService {
        listings: Mutex<VecDeque<JobListing>>,
        submissions: Mutex<Vec<(String, String, u32, bool)>>,
        downloads: Mutex<Vec<String>>,
        payload: Vec<u8>,
    }

    impl ScriptedService {
        fn with_listings(listings: Vec<JobListing>, payload: Vec<u8>) -> Self {
            Self {
                listings: Mutex::new(listings.into()),
                payload,
                ..Self::default()
            }
        }

        fn remaining_listings(&self) -> usize {
            self.listings.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl UpscaleService for ScriptedService {
        async fn submit(
            &self,
            _image: &[u8],
            file_name: &str,
            client_id: &str,
            scale: u32,
            face_enhance: bool,
        ) -> Result<(), UpscaleError> {
            self.submissions.lock().unwrap().push((
                file_name.to_owned(),
                client_id.to_owned(),
                scale,
                face_enhance,
            ));
            Ok(())
        }

        async fn list_jobs(&self, _client_id: &str) -> Result<JobListing, UpscaleError> {
            Ok(self
                .listings
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }

        async fn download(&self, url: &str) -> Result<Vec<u8>, UpscaleError> {
            self.downloads.lock().unwrap().push(url.to_owned());
            Ok(self.payload.clone())
        }
    }

    fn fast_config(work_dir: &Path, max_poll_attempts: u32) -> UpscaleConfig {
        UpscaleConfig {
            poll_interval: Duration::ZERO,
            max_poll_attempts,
            work_dir: work_dir.to_path_buf(),
            ..UpscaleConfig::default()
        }
    }

    fn completed(url: &str) -> JobListing {
        JobListing {
            completed: vec![CompletedJob::Url(url.to_owned())],
            ..JobListing::default()
        }
    }

    #[tokio::test]
    async fn pass_downloads_result_and_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cat.png");
        tokio::fs::write(&input, b"source bytes").await.unwrap();

        let service = ScriptedService::with_listings(
            vec![completed("https://cdn.example/out.png")],
            b"magnified bytes".to_vec(),
        );
        let config = fast_config(dir.path(), 5);
        let runner = PassRunner::new(&service, &config, "cafe0000cafe0000cafe0000cafe0000", "cat.png");

        let result = runner.run(1, &input).await.unwrap();

        assert_eq!(result.pass_index, 1);
        assert_eq!(result.input, input);
        assert_eq!(result.output, dir.path().join("upscaled_1_cat.png"));
        let written = tokio::fs::read(&result.output).await.unwrap();
        assert_eq!(written, b"magnified bytes");

        let submissions = service.submissions.lock().unwrap();
        assert_eq!(
            submissions.as_slice(),
            &[(
                "cat.png".to_owned(),
                "cafe0000cafe0000cafe0000cafe0000".to_owned(),
                4,
                false,
            )],
        );
        assert_eq!(
            service.downloads.lock().unwrap().as_slice(),
            &["https://cdn.example/out.png".to_owned()],
        );
    }

    #[tokio::test]
    async fn last_completed_entry_wins() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cat.png");
        tokio::fs::write(&input, b"source").await.unwrap();

        let listing = JobListing {
            completed: vec![
                CompletedJob::Url("https://cdn.example/stale.png".to_owned()),
                CompletedJob::Record {
                    url: "https://cdn.example/fresh.png".to_owned(),
                },
            ],
            ..JobListing::default()
        };
        let service = ScriptedService::with_listings(vec![listing], vec![1, 2, 3]);
        let config = fast_config(dir.path(), 5);
        let runner = PassRunner::new(&service, &config, "cafe0000cafe0000cafe0000cafe0000", "cat.png");

        runner.run(1, &input).await.unwrap();

        assert_eq!(
            service.downloads.lock().unwrap().as_slice(),
            &["https://cdn.example/fresh.png".to_owned()],
        );
    }

    #[tokio::test]
    async fn keeps_polling_until_a_completion_appears() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cat.png");
        tokio::fs::write(&input, b"source").await.unwrap();

        let service = ScriptedService::with_listings(
            vec![
                JobListing::default(),
                JobListing::default(),
                completed("https://cdn.example/out.png"),
            ],
            vec![0xFF],
        );
        let config = fast_config(dir.path(), 10);
        let runner = PassRunner::new(&service, &config, "cafe0000cafe0000cafe0000cafe0000", "cat.png");

        let result = runner.run(2, &input).await.unwrap();

        assert_eq!(result.output, dir.path().join("upscaled_2_cat.png"));
        assert_eq!(service.remaining_listings(), 0, "all scripted listings consumed");
    }

    #[tokio::test]
    async fn exhausted_poll_budget_times_out_without_download() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cat.png");
        tokio::fs::write(&input, b"source").await.unwrap();

        // No listing ever reports a completion.
        let service = ScriptedService::with_listings(Vec::new(), Vec::new());
        let config = fast_config(dir.path(), 3);
        let runner = PassRunner::new(&service, &config, "cafe0000cafe0000cafe0000cafe0000", "cat.png");

        let result = runner.run(1, &input).await;

        assert!(matches!(result, Err(UpscaleError::Timeout { attempts: 3 })));
        assert!(service.downloads.lock().unwrap().is_empty());
        assert!(!dir.path().join("upscaled_1_cat.png").exists());
    }

    #[tokio::test]
    async fn missing_input_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = ScriptedService::default();
        let config = fast_config(dir.path(), 3);
        let runner = PassRunner::new(&service, &config, "cafe0000cafe0000cafe0000cafe0000", "cat.png");

        let result = runner.run(1, &dir.path().join("nope.png")).await;

        assert!(matches!(result, Err(UpscaleError::Io(_))));
        assert!(service.submissions.lock().unwrap().is_empty());
    }
}
