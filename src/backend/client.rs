//! HTTP client for the external analysis backend.
//!
//! The backend owns job orchestration. This client only reads from it:
//! job status while a job runs, and the raw results once it completes.

use crate::analysis::RawJobResults;
use crate::models::{JobState, JobStatus};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while talking to the analysis backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Invalid job id: {0:?}")]
    InvalidJobId(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to analysis backend at {0}")]
    Connect(String),

    #[error("Backend request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Backend API error {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Job {job_id} still running after {attempts} status checks")]
    PollLimitExceeded { job_id: String, attempts: u32 },
}

/// Connection and polling settings for the backend.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub poll_interval_seconds: u64,
    pub max_poll_attempts: u32,
    pub show_progress: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
            poll_interval_seconds: 5,
            max_poll_attempts: 120,
            show_progress: true,
        }
    }
}

impl From<&crate::config::BackendConfig> for BackendSettings {
    fn from(config: &crate::config::BackendConfig) -> Self {
        Self {
            base_url: config.url.clone(),
            timeout_seconds: config.timeout_seconds,
            poll_interval_seconds: config.poll_interval_seconds,
            max_poll_attempts: config.max_poll_attempts,
            show_progress: true,
        }
    }
}

/// Read-only client for backend analysis jobs.
pub struct BackendClient {
    settings: BackendSettings,
    http_client: reqwest::Client,
}

impl BackendClient {
    /// Create a client for the configured backend.
    pub fn new(settings: BackendSettings) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(BackendError::Request)?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    /// Build `{base}/jobs/{job_id}/{resource}`.
    fn job_url(&self, job_id: &str, resource: &str) -> Result<String, BackendError> {
        let job_id = job_id.trim();
        if job_id.is_empty() || job_id.contains(['/', '?', '#']) {
            return Err(BackendError::InvalidJobId(job_id.to_string()));
        }

        Ok(format!(
            "{}/jobs/{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            job_id,
            resource
        ))
    }

    /// Fetch the current status of a job.
    pub async fn fetch_status(&self, job_id: &str) -> Result<JobStatus, BackendError> {
        let url = self.job_url(job_id, "status")?;
        self.get_json(&url).await
    }

    /// Fetch the raw results of a completed job.
    pub async fn fetch_results(&self, job_id: &str) -> Result<RawJobResults, BackendError> {
        let url = self.job_url(job_id, "results")?;
        info!("Fetching job results from {}", url);
        self.get_json(&url).await
    }

    /// Poll the job status until it completes, fails, or the attempt limit is hit.
    pub async fn wait_for_completion(&self, job_id: &str) -> Result<JobStatus, BackendError> {
        let spinner = self.spinner();
        let interval = Duration::from_secs(self.settings.poll_interval_seconds);

        for attempt in 1..=self.settings.max_poll_attempts {
            let status = self.fetch_status(job_id).await?;
            debug!(
                "Status check {} for job {:?}: {:?} ({:?})",
                attempt,
                status.job_id.as_deref().unwrap_or(job_id),
                status.state(),
                status.progress
            );

            match status.state() {
                JobState::Completed => {
                    spinner.finish_with_message(format!("Job {} completed", job_id));
                    return Ok(status);
                }
                JobState::Failed => {
                    spinner.abandon_with_message(format!("Job {} failed", job_id));
                    return Err(BackendError::JobFailed {
                        job_id: job_id.to_string(),
                        message: status
                            .message
                            .unwrap_or_else(|| "no details reported".to_string()),
                    });
                }
                JobState::Pending | JobState::Processing => {
                    spinner.set_message(status_line(job_id, &status));
                    tokio::time::sleep(interval).await;
                }
            }
        }

        spinner.abandon();
        Err(BackendError::PollLimitExceeded {
            job_id: job_id.to_string(),
            attempts: self.settings.max_poll_attempts,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, BackendError> {
        let response = self.http_client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.settings.timeout_seconds)
            } else if e.is_connect() {
                BackendError::Connect(self.settings.base_url.clone())
            } else {
                BackendError::Request(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http { status, body });
        }

        response.json().await.map_err(BackendError::Decode)
    }

    fn spinner(&self) -> ProgressBar {
        if !self.settings.show_progress {
            return ProgressBar::hidden();
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }
}

fn status_line(job_id: &str, status: &JobStatus) -> String {
    let mut line = format!("Job {}: {:?}", job_id, status.state());
    if let Some(progress) = status.progress {
        line.push_str(&format!(" ({:.0}%)", progress));
    }
    if let Some(ref message) = status.message {
        line.push_str(&format!(" - {}", message));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> BackendClient {
        BackendClient::new(BackendSettings {
            base_url: base_url.to_string(),
            show_progress: false,
            ..BackendSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_job_url() {
        let client = client("http://localhost:8000/");
        assert_eq!(
            client.job_url("abc-123", "results").unwrap(),
            "http://localhost:8000/jobs/abc-123/results"
        );
        assert_eq!(
            client.job_url(" abc ", "status").unwrap(),
            "http://localhost:8000/jobs/abc/status"
        );
    }

    #[test]
    fn test_job_url_rejects_invalid_ids() {
        let client = client("http://localhost:8000");
        assert!(matches!(
            client.job_url("", "status"),
            Err(BackendError::InvalidJobId(_))
        ));
        assert!(matches!(
            client.job_url("../admin", "status"),
            Err(BackendError::InvalidJobId(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_id_without_request() {
        let client = client("http://localhost:8000");
        let result = client.fetch_results("a/b").await;
        assert!(matches!(result, Err(BackendError::InvalidJobId(_))));
    }

    #[tokio::test]
    async fn test_zero_poll_attempts_exceeds_limit() {
        let client = BackendClient::new(BackendSettings {
            max_poll_attempts: 0,
            show_progress: false,
            ..BackendSettings::default()
        })
        .unwrap();

        let result = client.wait_for_completion("job-1").await;
        assert!(matches!(
            result,
            Err(BackendError::PollLimitExceeded { attempts: 0, .. })
        ));
    }

    #[test]
    fn test_status_line() {
        let status: JobStatus = serde_json::from_str(
            r#"{"job_id": "j1", "status": "processing", "progress": 42.4, "message": "Analyzing"}"#,
        )
        .unwrap();

        assert_eq!(status_line("j1", &status), "Job j1: Processing (42%) - Analyzing");
    }
}
